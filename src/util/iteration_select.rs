use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

/// Reasons a requested set of iterations cannot be produced. These are
/// caller errors; a selection is never silently shortened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("invalid iteration range: end ({end}) must be greater than start ({start})")]
    EmptyRange { start: usize, end: usize },
    #[error(
        "cannot select {num} distinct iterations from [{start}, {end}]; only {available} are available"
    )]
    TooManyIterations {
        start: usize,
        end: usize,
        num: usize,
        available: usize,
    },
    #[error("at least one iteration must be selected")]
    ZeroCount,
    #[error("the iteration step must be greater than 0")]
    ZeroStep,
}

/// How the frames are spread over the requested iteration range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IterationSelection {
    /// `num` evenly spaced iterations
    Linear { num: usize },
    /// `num` iterations spaced evenly in log10
    Log { num: usize },
    /// every `step`-th iteration starting at `start`
    Step { step: usize },
}

impl IterationSelection {
    /// The number of iterations asked for, if the selection is count based.
    pub fn count(&self) -> Option<usize> {
        match self {
            IterationSelection::Linear { num } | IterationSelection::Log { num } => Some(*num),
            IterationSelection::Step { .. } => None,
        }
    }

    /// The same kind of selection, asking for `num` iterations instead.
    /// Step selections are returned unchanged.
    pub fn with_count(self, num: usize) -> Self {
        match self {
            IterationSelection::Linear { .. } => IterationSelection::Linear { num },
            IterationSelection::Log { .. } => IterationSelection::Log { num },
            s @ IterationSelection::Step { .. } => s,
        }
    }
}

fn check_count(start: usize, end: usize, num: usize) -> Result<(), SelectionError> {
    if end <= start {
        return Err(SelectionError::EmptyRange { start, end });
    }
    if num == 0 {
        return Err(SelectionError::ZeroCount);
    }
    let available = (end - start).saturating_add(1);
    if num > available {
        return Err(SelectionError::TooManyIterations {
            start,
            end,
            num,
            available,
        });
    }
    Ok(())
}

/// `num` points spaced uniformly in log10 over `[start + 1, end + 1]`,
/// rounded to the nearest integer and shifted back down by one. The
/// shift keeps log10 defined at 0 and is done in `f64`, so `end` may be
/// `usize::MAX`. The endpoints are always exactly `start` and `end`.
fn log_candidates(start: usize, end: usize, num: usize) -> Vec<usize> {
    if num == 1 {
        return vec![start];
    }
    let lo = (start as f64 + 1.0).log10();
    let hi = (end as f64 + 1.0).log10();
    let delta = (hi - lo) / (num - 1) as f64;
    let mut x: Vec<usize> = (0..num)
        .map(|i| {
            let v = 10_f64.powf(lo + delta * i as f64).round() - 1.0;
            // `as` saturates, so values past the top of the range stay at usize::MAX
            (v.max(0.0) as usize).clamp(start, end)
        })
        .collect();
    // near the top of the index range f64 can't resolve neighboring integers
    x[0] = start;
    x[num - 1] = end;
    x
}

#[inline]
fn has_collision(x: &[usize]) -> bool {
    x.iter().tuple_windows().any(|(a, b)| a == b)
}

/// Select exactly `num` strictly increasing, distinct iterations from
/// the closed range `[start, end]`, spaced approximately uniformly in
/// log10 (dense near `start`, sparse near `end`).
///
/// Rounding log-spaced points to integers collides near the low end of
/// the range. Whenever the candidate set has duplicates, the contiguous
/// run at its low end is committed to the output, and a fresh log-spaced
/// set is generated for the remaining count starting just past the last
/// committed value. Every round commits at least one value, so the loop
/// always terminates.
///
/// Ties are rounded half away from zero (`f64::round`).
pub fn sample_logspace(start: usize, end: usize, num: usize) -> Result<Vec<usize>, SelectionError> {
    check_count(start, end, num)?;

    let mut out = vec![0_usize; num];
    let mut cursor = 0_usize;
    let mut remaining = num;

    let mut lo = start;
    let mut x = log_candidates(lo, end, remaining);
    while has_collision(&x) {
        x.dedup();
        // the first gap wider than 1 marks the end of the dense,
        // colliding run at the bottom of the range.
        let keep = x
            .iter()
            .tuple_windows()
            .position(|(a, b)| b - a > 1)
            .unwrap_or(x.len())
            .max(1);

        out[cursor..cursor + keep].copy_from_slice(&x[..keep]);
        cursor += keep;
        remaining -= keep;

        // a colliding set always has a value above the committed run,
        // so this is at most `end`
        lo = x[keep - 1] + 1;
        x = log_candidates(lo, end, remaining);
    }
    out[cursor..].copy_from_slice(&x);
    Ok(out)
}

/// Select exactly `num` evenly spaced iterations from `[start, end]`,
/// always including both endpoints when `num > 1`.
pub fn sample_linspace(start: usize, end: usize, num: usize) -> Result<Vec<usize>, SelectionError> {
    check_count(start, end, num)?;
    if num == 1 {
        return Ok(vec![start]);
    }
    // the spacing is at least 1 here, so rounding can't collide
    let delta = (end - start) as f64 / (num - 1) as f64;
    Ok((0..num)
        .map(|i| (start + (delta * i as f64).round() as usize).min(end))
        .collect())
}

/// Every `step`-th iteration of `[start, end]`, beginning at `start`.
pub fn sample_step(start: usize, end: usize, step: usize) -> Result<Vec<usize>, SelectionError> {
    if end <= start {
        return Err(SelectionError::EmptyRange { start, end });
    }
    if step == 0 {
        return Err(SelectionError::ZeroStep);
    }
    Ok((start..=end).step_by(step).collect())
}

/// Resolve a [IterationSelection] over `[start, end]`.
pub fn select_iterations(
    selection: IterationSelection,
    start: usize,
    end: usize,
) -> Result<Vec<usize>, SelectionError> {
    match selection {
        IterationSelection::Linear { num } => sample_linspace(start, end, num),
        IterationSelection::Log { num } => sample_logspace(start, end, num),
        IterationSelection::Step { step } => sample_step(start, end, step),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(sel: &[usize], start: usize, end: usize, num: usize) {
        assert_eq!(sel.len(), num, "wrong length for ({start}, {end}, {num})");
        assert!(
            sel.iter().tuple_windows().all(|(a, b)| a < b),
            "not strictly increasing for ({start}, {end}, {num}): {sel:?}"
        );
        assert!(sel.iter().all(|&v| v >= start && v <= end));
    }

    #[test]
    fn logspace_full_range_is_every_integer() {
        let sel = sample_logspace(0, 9, 10).unwrap();
        assert_eq!(sel, (0..=9).collect::<Vec<usize>>());
    }

    #[test]
    fn logspace_single_value_is_start() {
        assert_eq!(sample_logspace(0, 100, 1).unwrap(), vec![0]);
        assert_eq!(sample_logspace(7, 100, 1).unwrap(), vec![7]);
    }

    #[test]
    fn logspace_dense_low_end_is_repaired() {
        // the raw log-spaced candidates collide near 0
        let raw = log_candidates(0, 1000, 20);
        assert!(has_collision(&raw));

        let sel = sample_logspace(0, 1000, 20).unwrap();
        assert_valid(&sel, 0, 1000, 20);
        assert_eq!(sel[0], 0);
        assert_eq!(*sel.last().unwrap(), 1000);
    }

    #[test]
    fn logspace_without_collisions_keeps_endpoints() {
        let sel = sample_logspace(100, 10_000, 5).unwrap();
        assert_eq!(sel, vec![100, 318, 1_004, 3_169, 10_000]);
    }

    #[test]
    fn logspace_is_valid_across_inputs() {
        for start in [0_usize, 1, 3, 17, 250] {
            for width in [1_usize, 2, 5, 9, 33, 120] {
                let end = start + width;
                for num in 1..=(width + 1) {
                    let sel = sample_logspace(start, end, num).unwrap();
                    assert_valid(&sel, start, end, num);
                }
            }
        }
    }

    #[test]
    fn logspace_gaps_grow_geometrically() {
        let sel = sample_logspace(0, 1_000_000, 12).unwrap();
        let gaps: Vec<usize> = sel.iter().tuple_windows().map(|(a, b)| b - a).collect();
        // gaps never shrink, and the late gaps dwarf the early ones
        assert!(gaps.iter().tuple_windows().all(|(a, b)| a <= b));
        assert!(gaps[gaps.len() - 1] > 100 * gaps[1]);
    }

    #[test]
    fn logspace_is_deterministic() {
        let a = sample_logspace(0, 5_000, 64).unwrap();
        let b = sample_logspace(0, 5_000, 64).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn logspace_rejects_bad_arguments() {
        assert_eq!(
            sample_logspace(5, 5, 1),
            Err(SelectionError::EmptyRange { start: 5, end: 5 })
        );
        assert_eq!(
            sample_logspace(10, 2, 1),
            Err(SelectionError::EmptyRange { start: 10, end: 2 })
        );
        assert_eq!(sample_logspace(0, 10, 0), Err(SelectionError::ZeroCount));
        assert_eq!(
            sample_logspace(0, 9, 11),
            Err(SelectionError::TooManyIterations {
                start: 0,
                end: 9,
                num: 11,
                available: 10
            })
        );
    }

    #[test]
    fn logspace_reaches_the_top_of_the_index_range() {
        assert_eq!(sample_logspace(0, usize::MAX, 2).unwrap(), vec![0, usize::MAX]);

        let top: Vec<usize> = (usize::MAX - 9..=usize::MAX).collect();
        assert_eq!(sample_logspace(usize::MAX - 9, usize::MAX, 10).unwrap(), top);

        let sel = sample_logspace(usize::MAX - 1000, usize::MAX, 5).unwrap();
        assert_valid(&sel, usize::MAX - 1000, usize::MAX, 5);

        let sel = sample_logspace(0, usize::MAX, 64).unwrap();
        assert_valid(&sel, 0, usize::MAX, 64);
    }

    #[test]
    fn linspace_hits_both_endpoints() {
        let sel = sample_linspace(0, 999, 4).unwrap();
        assert_eq!(sel, vec![0, 333, 666, 999]);
        let sel = sample_linspace(3, 12, 10).unwrap();
        assert_eq!(sel, (3..=12).collect::<Vec<usize>>());
        for num in 1..=40 {
            let sel = sample_linspace(5, 44, num).unwrap();
            assert_valid(&sel, 5, 44, num);
        }
        assert!(sample_linspace(0, 3, 5).is_err());
    }

    #[test]
    fn step_selection() {
        assert_eq!(sample_step(0, 10, 5).unwrap(), vec![0, 5, 10]);
        assert_eq!(sample_step(2, 10, 4).unwrap(), vec![2, 6, 10]);
        assert_eq!(sample_step(2, 11, 4).unwrap(), vec![2, 6, 10]);
        assert_eq!(sample_step(0, 10, 0), Err(SelectionError::ZeroStep));
    }

    #[test]
    fn selection_counts() {
        let log = IterationSelection::Log { num: 12 };
        assert_eq!(log.count(), Some(12));
        assert_eq!(log.with_count(4), IterationSelection::Log { num: 4 });
        let step = IterationSelection::Step { step: 3 };
        assert_eq!(step.count(), None);
        assert_eq!(step.with_count(4), step);
    }

    #[test]
    fn selection_dispatch() {
        assert_eq!(
            select_iterations(IterationSelection::Step { step: 50 }, 0, 100).unwrap(),
            vec![0, 50, 100]
        );
        assert_eq!(
            select_iterations(IterationSelection::Log { num: 10 }, 0, 9).unwrap(),
            (0..=9).collect::<Vec<usize>>()
        );
        assert_eq!(
            select_iterations(IterationSelection::Linear { num: 2 }, 4, 9).unwrap(),
            vec![4, 9]
        );
    }
}
