//! Small descriptive statistics shared by the fit backends.

/// Converts a median absolute deviation into a Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.0 / 0.6745;

/// Median of the finite values; `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    median_mut(&mut v)
}

pub(crate) fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Median absolute deviation about the median.
pub fn mad(values: &[f64]) -> Option<f64> {
    let m = median(values)?;
    let mut dev: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - m).abs())
        .collect();
    median_mut(&mut dev)
}

/// Outlier-resistant noise scale: `MAD / 0.6745`.
pub fn robust_sigma(values: &[f64]) -> Option<f64> {
    mad(values).map(|m| m * MAD_TO_SIGMA)
}

/// Weighted mean `Σ w x / Σ w`.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let (mut sw, mut swx) = (0.0, 0.0);
    for (&x, &w) in values.iter().zip(weights) {
        sw += w;
        swx += w * x;
    }
    if sw > 0.0 && swx.is_finite() {
        Some(swx / sw)
    } else {
        None
    }
}

/// Weighted standard deviation about a known mean, with the usual
/// bias correction for "reliability" weights.
pub fn weighted_sd(values: &[f64], weights: &[f64], mean: f64) -> Option<f64> {
    let (mut sw, mut sw2, mut swd) = (0.0, 0.0, 0.0);
    for (&x, &w) in values.iter().zip(weights) {
        sw += w;
        sw2 += w * w;
        swd += w * (x - mean) * (x - mean);
    }
    let denom = sw * sw - sw2;
    if sw <= 0.0 || denom <= 0.0 {
        return None;
    }
    Some((swd * sw / denom).sqrt())
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_odd_even_and_nan() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, 5.0]), Some(5.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn robust_sigma_ignores_single_outlier() {
        let v = [1.0, 1.1, 0.9, 1.05, 0.95, 1.0, 100.0];
        let s = robust_sigma(&v).unwrap();
        assert!(s < 0.2, "robust sigma should ignore the outlier, got {s}");
    }

    #[test]
    fn weighted_mean_and_sd() {
        let x = [1.0, 2.0, 3.0];
        let w = [1.0, 1.0, 1.0];
        let m = weighted_mean(&x, &w).unwrap();
        assert!((m - 2.0).abs() < 1e-12);
        let sd = weighted_sd(&x, &w, m).unwrap();
        assert!((sd - 1.0).abs() < 1e-12);
        assert!(weighted_sd(&[1.0], &[1.0], 1.0).is_none());
    }
}
