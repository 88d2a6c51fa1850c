use crate::util::chain_types::AxisRange;

#[inline]
fn bin_of(v: f64, range: &AxisRange, bins: usize) -> Option<usize> {
    if !range.contains(v) {
        return None;
    }
    let b = ((v - range.lo) / range.width() * bins as f64).floor() as usize;
    // `hi` itself belongs to the last bin
    Some(b.min(bins - 1))
}

/// Counts of `values` falling in each of `bins` equal-width bins over
/// `range`. Values outside of `range` (and non-finite values) are dropped.
pub fn histogram(values: &[f64], range: &AxisRange, bins: usize) -> Vec<usize> {
    let mut counts = vec![0_usize; bins];
    if bins == 0 {
        return counts;
    }
    for b in values.iter().filter_map(|&v| bin_of(v, range, bins)) {
        counts[b] += 1;
    }
    counts
}

/// Lower and upper edges of bin `b` out of `bins` over `range`.
pub fn bin_edges(b: usize, range: &AxisRange, bins: usize) -> (f64, f64) {
    let w = range.width() / bins as f64;
    (range.lo + w * b as f64, range.lo + w * (b + 1) as f64)
}

/// A 2D histogram of the pairs `(xs[i], ys[i])`, indexed as
/// `counts[x_bin][y_bin]`. Pairs falling outside either range are dropped.
pub fn histogram2d(
    xs: &[f64],
    ys: &[f64],
    x_range: &AxisRange,
    y_range: &AxisRange,
    bins: usize,
) -> Vec<Vec<usize>> {
    let mut counts = vec![vec![0_usize; bins]; bins];
    if bins == 0 {
        return counts;
    }
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        if let (Some(bx), Some(by)) = (bin_of(x, x_range, bins), bin_of(y, y_range, bins)) {
            counts[bx][by] += 1;
        }
    }
    counts
}
