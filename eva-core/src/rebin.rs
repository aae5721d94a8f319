//! Rebinning algorithms.
//!
//! All functions are pure. Bin centres are always the midpoint of the
//! underlying histogram edges, `edges[i] + (edges[1] - edges[0]) / 2`, so
//! both run variants hand out the same axis semantics.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::error::{Error, Result};
use crate::spectrum::Histogram2D;

/// Rebins pre-binned data by treating the histogram as a sample of events.
///
/// Each `x0[i]` is counted with weight `y0[i]` and re-histogrammed into
/// `floor(n / bin_size)` bins over `bin_range` (or the span of the populated
/// points). Counts are divided by `bin_size` so the result keeps the input
/// density. If the new bin count exceeds `n` (`bin_size < 1`) the counts are
/// linearly interpolated at the new bin centres instead.
///
/// Non-positive weights contribute nothing, mirroring a repeat-by-count of
/// zero or negative counts. Fractional weights are kept as-is.
///
/// # Errors
/// Returns [`Error::Configuration`] if the arrays differ in length,
/// `bin_size` is not positive, or the resulting bin count is zero.
pub fn prebinned_rebin(
    x0: &[f64],
    y0: &[f64],
    bin_size: f64,
    bin_range: Option<(f64, f64)>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if x0.len() != y0.len() {
        return Err(Error::Configuration(format!(
            "cannot rebin {} positions against {} counts",
            x0.len(),
            y0.len()
        )));
    }
    if !(bin_size.is_finite() && bin_size > 0.0) {
        return Err(Error::Configuration(format!(
            "bin size must be positive, got {bin_size}"
        )));
    }

    let n_init = x0.len();
    let n_bins = (n_init as f64 / bin_size) as usize;
    if n_bins == 0 {
        return Err(Error::Configuration(format!(
            "bin size {bin_size} leaves no bins for {n_init} points"
        )));
    }

    let populated: Vec<(f64, f64)> = x0
        .iter()
        .zip(y0)
        .filter(|(_, w)| **w > 0.0)
        .map(|(&x, &w)| (x, w))
        .collect();
    let range = resolve_range(populated.iter().map(|(x, _)| *x), bin_range)?;
    let edges = bin_edges(n_bins, range);
    let centres = bin_centres(&edges);

    let counts = if n_bins > n_init {
        centres.iter().map(|&c| interp(c, x0, y0)).collect()
    } else {
        fill(populated.into_iter(), n_bins, range)
            .into_iter()
            .map(|c| c / bin_size)
            .collect()
    };

    Ok((centres, counts))
}

/// Histograms raw event values into `bin_count` equal-width bins.
///
/// Uses `bin_range` when given, otherwise the full span of the data.
///
/// # Errors
/// Returns [`Error::Configuration`] if `bin_count` is zero or the range is
/// invalid.
pub fn raw_rebin(
    values: &[f64],
    bin_count: usize,
    bin_range: Option<(f64, f64)>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if bin_count == 0 {
        return Err(Error::Configuration(
            "raw rebin needs at least one bin".to_string(),
        ));
    }
    let range = resolve_range(values.iter().copied(), bin_range)?;
    let edges = bin_edges(bin_count, range);
    let counts = fill(values.iter().map(|&v| (v, 1.0)), bin_count, range);
    Ok((bin_centres(&edges), counts))
}

/// Groups consecutive points in blocks of `bin_factor`, averaging `x` and
/// summing `y`. Trailing points that do not fill a block are dropped.
///
/// # Errors
/// Returns [`Error::Configuration`] if `bin_factor` is zero or the arrays
/// differ in length.
pub fn simple_rebin(x0: &[f64], y0: &[f64], bin_factor: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if bin_factor == 0 {
        return Err(Error::Configuration(
            "bin factor must be at least 1".to_string(),
        ));
    }
    if x0.len() != y0.len() {
        return Err(Error::Configuration(format!(
            "cannot rebin {} positions against {} counts",
            x0.len(),
            y0.len()
        )));
    }

    let x = x0
        .chunks_exact(bin_factor)
        .map(|c| c.iter().sum::<f64>() / bin_factor as f64)
        .collect();
    let y = y0
        .chunks_exact(bin_factor)
        .map(|c| c.iter().sum::<f64>())
        .collect();
    Ok((x, y))
}

/// Resamples to a multiple of `bin_size` points by linear interpolation,
/// then groups them like [`simple_rebin`].
///
/// # Errors
/// Returns [`Error::Configuration`] if fewer than `bin_size` points exist.
pub fn rebin_interpolate(x0: &[f64], y0: &[f64], bin_size: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if bin_size == 0 || x0.len() < bin_size {
        return Err(Error::Configuration(format!(
            "cannot group {} points into bins of {bin_size}",
            x0.len()
        )));
    }
    let n_total = (x0.len() / bin_size) * bin_size;
    let x1 = linspace(x0[0], x0[x0.len() - 1], n_total);
    let y1: Vec<f64> = x1.iter().map(|&x| interp(x, x0, y0)).collect();
    simple_rebin(&x1, &y1, bin_size)
}

/// Builds a 2D histogram of `(xs[i], ys[i])` pairs.
///
/// Rows follow the `x` bins and columns the `y` bins.
///
/// # Errors
/// Returns [`Error::Configuration`] for zero bin counts or invalid ranges.
pub fn histogram_2d(
    xs: &[f64],
    ys: &[f64],
    bins: (usize, usize),
    ranges: ((f64, f64), (f64, f64)),
) -> Result<Histogram2D> {
    if bins.0 == 0 || bins.1 == 0 {
        return Err(Error::Configuration(
            "2D histogram needs at least one bin per axis".to_string(),
        ));
    }
    let x_range = resolve_range(std::iter::empty(), Some(ranges.0))?;
    let y_range = resolve_range(std::iter::empty(), Some(ranges.1))?;

    let mut hist = Histogram2D::zeros(bins.0, bins.1);
    for (&x, &y) in xs.iter().zip(ys) {
        if let (Some(row), Some(col)) = (
            bin_index(x, bins.0, x_range),
            bin_index(y, bins.1, y_range),
        ) {
            hist.counts[row * bins.1 + col] += 1.0;
        }
    }
    Ok(hist)
}

/// Linear interpolation of `fp(xp)` at `x`, clamped to the end values.
///
/// `xp` must be increasing. Returns NaN if `xp` is empty.
#[must_use]
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }

    let i = xp[..n].partition_point(|&v| v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (fp[i - 1], fp[i]);
    if (x1 - x0).abs() < f64::EPSILON {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Evenly spaced values over `[start, stop]`, both ends included.
#[must_use]
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = stop;
            values
        }
    }
}

/// Midpoints of consecutive edges.
fn bin_centres(edges: &[f64]) -> Vec<f64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let half = (edges[1] - edges[0]) / 2.0;
    edges[..edges.len() - 1].iter().map(|e| e + half).collect()
}

fn bin_edges(n_bins: usize, range: (f64, f64)) -> Vec<f64> {
    linspace(range.0, range.1, n_bins + 1)
}

/// Picks the histogram range: the explicit one, else the sample span.
///
/// An empty sample falls back to `(0, 1)`; a degenerate span is widened by
/// half a unit each side.
fn resolve_range<I>(sample: I, explicit: Option<(f64, f64)>) -> Result<(f64, f64)>
where
    I: Iterator<Item = f64>,
{
    let (lo, hi) = match explicit {
        Some(range) => range,
        None => sample.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((0.0, 1.0)),
    };

    if !(lo.is_finite() && hi.is_finite()) || lo > hi {
        return Err(Error::Configuration(format!(
            "invalid binning range ({lo}, {hi})"
        )));
    }
    if (hi - lo).abs() < f64::EPSILON {
        return Ok((lo - 0.5, hi + 0.5));
    }
    Ok((lo, hi))
}

/// Index of the bin holding `v`; the upper edge belongs to the last bin.
fn bin_index(v: f64, n_bins: usize, (lo, hi): (f64, f64)) -> Option<usize> {
    if !(lo..=hi).contains(&v) {
        return None;
    }
    let norm = n_bins as f64 / (hi - lo);
    let idx = ((v - lo) * norm) as usize;
    Some(idx.min(n_bins - 1))
}

fn fill<I>(sample: I, n_bins: usize, range: (f64, f64)) -> Vec<f64>
where
    I: Iterator<Item = (f64, f64)>,
{
    let mut counts = vec![0.0; n_bins];
    for (v, w) in sample {
        if let Some(idx) = bin_index(v, n_bins, range) {
            counts[idx] += w;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_prebinned_density_preserved() {
        let (x, y) = prebinned_rebin(&[0.0, 1.0, 2.0, 3.0], &[10.0; 4], 2.0, None).unwrap();
        assert_eq!(x.len(), 2);
        assert_relative_eq!(x[0], 0.75);
        assert_relative_eq!(x[1], 2.25);
        assert_eq!(y, vec![10.0, 10.0]);
    }

    #[test]
    fn test_prebinned_explicit_range() {
        let x0 = [0.5, 1.5, 2.5, 3.5];
        let y0 = [1.0, 2.0, 3.0, 4.0];
        let (x, y) = prebinned_rebin(&x0, &y0, 2.0, Some((0.0, 4.0))).unwrap();
        assert_eq!(x, vec![1.0, 3.0]);
        assert_relative_eq!(y[0], 1.5);
        assert_relative_eq!(y[1], 3.5);
    }

    #[test]
    fn test_prebinned_upsampling_interpolates() {
        let x0 = [0.0, 1.0, 2.0, 3.0];
        let y0 = [0.0, 10.0, 20.0, 30.0];
        let (x, y) = prebinned_rebin(&x0, &y0, 0.5, Some((0.0, 4.0))).unwrap();
        assert_eq!(x.len(), 8);
        assert_relative_eq!(x[0], 0.25);
        assert_relative_eq!(y[0], 2.5);
        assert_relative_eq!(y[3], 17.5);
        // beyond the last point the interpolation clamps
        assert_relative_eq!(y[7], 30.0);
    }

    #[test]
    fn test_prebinned_rejects_bad_bin_size() {
        assert!(prebinned_rebin(&[1.0], &[1.0], 0.0, None).is_err());
        assert!(prebinned_rebin(&[1.0, 2.0], &[1.0, 1.0], 4.0, None).is_err());
        assert!(prebinned_rebin(&[1.0, 2.0], &[1.0], 1.0, None).is_err());
    }

    #[test]
    fn test_raw_rebin_uniform_events() {
        let n: u32 = 200;
        let values: Vec<f64> = (0..n).map(|i| f64::from(i) * 100.0 / f64::from(n)).collect();
        for bins in [1usize, 10, 50, 200] {
            let (centres, counts) = raw_rebin(&values, bins, Some((0.0, 100.0))).unwrap();
            assert_eq!(centres.len(), bins);
            let width = 100.0 / bins as f64;
            assert_relative_eq!(centres[0], width / 2.0, epsilon = 1e-9);
            for pair in centres.windows(2) {
                assert_relative_eq!(pair[1] - pair[0], width, epsilon = 1e-9);
            }
            assert_relative_eq!(counts.iter().sum::<f64>(), f64::from(n));
        }
    }

    #[test]
    fn test_raw_rebin_excludes_out_of_range() {
        let (_, counts) = raw_rebin(&[-1.0, 0.0, 5.0, 10.0, 11.0], 2, Some((0.0, 10.0))).unwrap();
        // upper edge is inclusive, outliers are dropped
        assert_eq!(counts, vec![1.0, 2.0]);
        assert!(raw_rebin(&[1.0], 0, None).is_err());
    }

    #[test]
    fn test_raw_rebin_degenerate_range() {
        let (centres, counts) = raw_rebin(&[3.0, 3.0], 1, None).unwrap();
        assert_relative_eq!(centres[0], 3.0);
        assert_eq!(counts, vec![2.0]);
    }

    #[test]
    fn test_simple_rebin() {
        let (x, y) = simple_rebin(
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            &[10.0, 20.0, 30.0, 30.0, 20.0, 30.0],
            2,
        )
        .unwrap();
        assert_eq!(x, vec![0.5, 2.5, 4.5]);
        assert_eq!(y, vec![30.0, 60.0, 50.0]);
    }

    #[test]
    fn test_rebin_interpolate_resamples() {
        let x0: Vec<f64> = (0..10).map(f64::from).collect();
        let y0 = [10.0, 20.0, 30.0, 30.0, 20.0, 30.0, 10.0, 0.0, 20.0, 10.0];
        let (x, y) = rebin_interpolate(&x0, &y0, 3).unwrap();
        assert_eq!(x.len(), 3);
        assert_relative_eq!(x[0], 1.125, epsilon = 1e-9);
        assert_relative_eq!(x[1], 4.5, epsilon = 1e-9);
        assert_relative_eq!(x[2], 7.875, epsilon = 1e-9);
        assert_relative_eq!(y[0], 61.25, epsilon = 1e-9);
        assert_relative_eq!(y[1], 68.75, epsilon = 1e-9);
        assert_relative_eq!(y[2], 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_histogram_2d() {
        let hist = histogram_2d(
            &[0.5, 1.5, 1.5, 5.0],
            &[0.5, 0.5, 1.5, 0.5],
            (2, 2),
            ((0.0, 2.0), (0.0, 2.0)),
        )
        .unwrap();
        assert_eq!(hist.get(0, 0), Some(1.0));
        assert_eq!(hist.get(1, 0), Some(1.0));
        assert_eq!(hist.get(1, 1), Some(1.0));
        assert_relative_eq!(hist.total(), 3.0);
    }

    #[test]
    fn test_interp_clamps() {
        let xp = [1.0, 2.0, 3.0];
        let fp = [10.0, 20.0, 40.0];
        assert_relative_eq!(interp(0.0, &xp, &fp), 10.0);
        assert_relative_eq!(interp(2.5, &xp, &fp), 30.0);
        assert_relative_eq!(interp(9.0, &xp, &fp), 40.0);
        assert!(interp(1.0, &[], &[]).is_nan());
    }
}
