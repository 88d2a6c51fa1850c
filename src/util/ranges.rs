use crate::util::chain_types::{AxisRange, ChainStore, ColorScale, Limit, Trace};
use anyhow::bail;
use statrs::statistics::{Data, OrderStatistics};
use tracing::debug;

/// Fraction of the data width added to either side of an axis.
pub const AXIS_PAD: f64 = 0.05;

/// Range of the finite entries of `values` after trimming `quantile`
/// from each tail (no trimming when `quantile` is 0). Returns `None` if
/// there are no finite values.
pub fn trimmed_range(values: Vec<f64>, quantile: f64) -> Option<AxisRange> {
    let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let (lo, hi) = if quantile > 0.0 {
        let mut data = Data::new(finite);
        (data.quantile(quantile), data.quantile(1.0 - quantile))
    } else {
        finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    };
    Some(AxisRange::new(lo, hi))
}

/// Gather the draws of every chain for column `col` over the sample
/// indices in `positions`.
fn gather(store: &ChainStore, col: usize, positions: &[usize]) -> Vec<f64> {
    positions
        .iter()
        .flat_map(|&p| store.draws(p, col).to_vec())
        .collect()
}

/// One padded axis range per parameter in `params`, computed over the
/// draws at all of the sample indices in `positions`.
pub fn parameter_ranges(
    store: &ChainStore,
    params: &[usize],
    positions: &[usize],
    quantile: f64,
) -> Vec<AxisRange> {
    params
        .iter()
        .map(|&col| {
            trimmed_range(gather(store, col, positions), quantile)
                .unwrap_or_else(|| AxisRange::new(0.0, 1.0))
                .padded(AXIS_PAD)
        })
        .collect()
}

/// Replace the ranges of any parameters the user provided explicit
/// limits for. A limit naming a parameter that isn't plotted is an error.
pub fn apply_limits(
    ranges: &mut [AxisRange],
    names: &[String],
    limits: &[Limit],
) -> anyhow::Result<()> {
    for limit in limits {
        match names.iter().position(|n| *n == limit.name) {
            Some(i) => {
                debug!("using user provided limits {} for {}", limit.range, limit.name);
                ranges[i] = limit.range;
            }
            None => bail!(
                "limits were given for {:?}, which is not one of the plotted parameters [{}]",
                limit.name,
                names.join(", ")
            ),
        }
    }
    Ok(())
}

/// The axis ranges used for a run: either shared by every frame, or
/// recomputed from the draws of each frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRanges {
    Fixed(Vec<AxisRange>),
    PerFrame { quantile: f64, limits: Vec<Limit> },
}

impl FrameRanges {
    /// The ranges of the parameters `params` (named `names`) for the frame
    /// drawn from sample index `position`.
    pub fn resolve(
        &self,
        store: &ChainStore,
        params: &[usize],
        names: &[String],
        position: usize,
    ) -> anyhow::Result<Vec<AxisRange>> {
        match self {
            FrameRanges::Fixed(ranges) => Ok(ranges.clone()),
            FrameRanges::PerFrame { quantile, limits } => {
                let mut ranges = parameter_ranges(store, params, &[position], *quantile);
                apply_limits(&mut ranges, names, limits)?;
                Ok(ranges)
            }
        }
    }
}

/// Color limits for column `col`, shared across all frames in `positions`.
pub fn color_scale(
    store: &ChainStore,
    col: usize,
    positions: &[usize],
) -> anyhow::Result<ColorScale> {
    let name = &store.columns[col];
    match trimmed_range(gather(store, col, positions), 0.0) {
        Some(range) => Ok(ColorScale {
            column: name.clone(),
            index: col,
            range,
        }),
        None => bail!("column {:?} has no finite values to color by", name),
    }
}

/// The across-chain mean of column `col` at every stored iteration
/// from `start` to `end` (inclusive sample indices).
pub fn trace(store: &ChainStore, col: usize, start: usize, end: usize) -> anyhow::Result<Trace> {
    let name = &store.columns[col];
    let points: Vec<(u64, f64)> = (start..=end)
        .filter_map(|p| {
            let draws = store.draws(p, col);
            let finite: Vec<f64> = draws.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                None
            } else {
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                Some((store.label(p), mean))
            }
        })
        .collect();

    let range = match trimmed_range(points.iter().map(|(_, m)| *m).collect(), 0.0) {
        Some(r) => r.padded(AXIS_PAD),
        None => bail!("column {:?} has no finite values to trace", name),
    };
    Ok(Trace {
        column: name.clone(),
        points,
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_store() -> ChainStore {
        // 11 iterations x 2 chains; x = iteration + chain, lnl = -iteration
        let mut iters = vec![];
        let mut chains = vec![];
        let mut x = vec![];
        let mut lnl = vec![];
        for i in 0..11_u64 {
            for c in 0..2_u64 {
                iters.push(i);
                chains.push(c);
                x.push((i + c) as f64);
                lnl.push(-(i as f64));
            }
        }
        ChainStore::from_long_columns(
            &iters,
            &chains,
            vec!["x".to_string(), "lnl".to_string()],
            vec![x, lnl],
        )
        .unwrap()
    }

    #[test]
    fn untrimmed_range_is_min_max() {
        let r = trimmed_range(vec![3.0, -1.0, f64::NAN, 7.0], 0.0).unwrap();
        assert_eq!((r.lo, r.hi), (-1.0, 7.0));
        assert!(trimmed_range(vec![f64::NAN], 0.0).is_none());
    }

    #[test]
    fn quantile_trimming_drops_outliers() {
        let mut v: Vec<f64> = (0..=100).map(|x| x as f64).collect();
        v.push(1.0e6);
        let r = trimmed_range(v, 0.05).unwrap();
        assert!(r.lo > 3.0 && r.lo < 7.0, "{r}");
        assert!(r.hi > 94.0 && r.hi < 100.0, "{r}");
    }

    #[test]
    fn fixed_ranges_cover_selected_frames() {
        let store = ramp_store();
        let ranges = parameter_ranges(&store, &[0], &[0, 5], 0.0);
        // draws are {0, 1, 5, 6}
        let expected = AxisRange::new(0.0, 6.0).padded(AXIS_PAD);
        assert_eq!(ranges, vec![expected]);
    }

    #[test]
    fn limits_override_ranges() {
        let mut ranges = vec![AxisRange::new(0.0, 1.0), AxisRange::new(0.0, 1.0)];
        let names = vec!["a".to_string(), "b".to_string()];
        let limits = vec![Limit {
            name: "b".to_string(),
            range: AxisRange::new(-3.0, 3.0),
        }];
        apply_limits(&mut ranges, &names, &limits).unwrap();
        assert_eq!(ranges[1], AxisRange::new(-3.0, 3.0));
        assert_eq!(ranges[0], AxisRange::new(0.0, 1.0));

        let bad = vec![Limit {
            name: "c".to_string(),
            range: AxisRange::new(0.0, 1.0),
        }];
        assert!(apply_limits(&mut ranges, &names, &bad).is_err());
    }

    #[test]
    fn per_frame_ranges_follow_the_frame() {
        let store = ramp_store();
        let names = vec!["x".to_string()];
        let per_frame = FrameRanges::PerFrame {
            quantile: 0.0,
            limits: vec![],
        };
        let early = per_frame.resolve(&store, &[0], &names, 0).unwrap();
        let late = per_frame.resolve(&store, &[0], &names, 10).unwrap();
        assert!(early[0].contains(0.0) && early[0].contains(1.0));
        assert!(!early[0].contains(10.0));
        assert!(late[0].contains(10.0) && late[0].contains(11.0));

        let fixed = FrameRanges::Fixed(vec![AxisRange::new(-1.0, 1.0)]);
        assert_eq!(
            fixed.resolve(&store, &[0], &names, 10).unwrap(),
            vec![AxisRange::new(-1.0, 1.0)]
        );
    }

    #[test]
    fn color_scale_spans_selected_frames() {
        let store = ramp_store();
        let scale = color_scale(&store, 1, &[2, 4, 9]).unwrap();
        assert_eq!(scale.column, "lnl");
        assert_eq!((scale.range.lo, scale.range.hi), (-9.0, -2.0));
    }

    #[test]
    fn trace_is_mean_over_chains() {
        let store = ramp_store();
        let tr = trace(&store, 0, 2, 4).unwrap();
        assert_eq!(tr.points, vec![(2, 2.5), (3, 3.5), (4, 4.5)]);
        assert!(tr.range.contains(2.5) && tr.range.contains(4.5));
    }
}
