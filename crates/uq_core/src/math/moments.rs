//! Sample moment kernels.
//!
//! Free functions over `&[f64]` used by the estimator statistics. Conventions:
//! the standard deviation carries Bessel's correction, skewness and kurtosis
//! standardize population-normalized central moments, and kurtosis is reported
//! raw (a normal sample tends to 3, not 0). Each kernel returns `None` below
//! its minimum sample count instead of producing a spurious number.

/// Tolerance for classifying a column as integer-valued.
const INTEGER_TOLERANCE: f64 = 1e-8;

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample variance about `mean`; `None` for fewer than two values.
pub fn variance(values: &[f64], mean: f64) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    Some(sum_sq / (n - 1) as f64)
}

/// Sample standard deviation (Bessel-corrected); `None` for fewer than two
/// values.
pub fn std_dev(values: &[f64], mean: f64) -> Option<f64> {
    variance(values, mean).map(f64::sqrt)
}

/// Sample skewness `(1/n)·Σ(x−m)³ / s³` with `s` from [`std_dev`].
///
/// `None` for fewer than four values or a non-positive deviation.
pub fn skewness(values: &[f64], mean: f64, std_dev: f64) -> Option<f64> {
    let n = values.len();
    if n < 4 || !(std_dev > 0.0) {
        return None;
    }
    let sum_cubed: f64 = values.iter().map(|v| (v - mean).powi(3)).sum();
    Some(sum_cubed / n as f64 / std_dev.powi(3))
}

/// Raw sample kurtosis `(1/n)·Σ(x−m)⁴ / s⁴` with `s` from [`std_dev`].
///
/// Normal data tends to 3 under this convention (no excess subtraction).
/// `None` for fewer than four values or a non-positive deviation.
pub fn kurtosis(values: &[f64], mean: f64, std_dev: f64) -> Option<f64> {
    let n = values.len();
    if n < 4 || !(std_dev > 0.0) {
        return None;
    }
    let sum_quartic: f64 = values.iter().map(|v| (v - mean).powi(4)).sum();
    Some(sum_quartic / n as f64 / std_dev.powi(4))
}

/// Pearson correlation between two equally long slices.
///
/// `None` on mismatched lengths, fewer than two pairs, or a degenerate
/// (zero-spread) side.
pub fn correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut cross = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mx;
        let dy = y - my;
        cross += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if !(denom > 0.0) {
        return None;
    }
    Some(cross / denom)
}

/// True when every value is within `1e-8` of an integer.
///
/// Reporting hint only: integer-valued response columns are printed without
/// fractional digits downstream.
pub fn is_effectively_integer(values: &[f64]) -> bool {
    values
        .iter()
        .all(|v| (v - v.round()).abs() <= INTEGER_TOLERANCE)
}
