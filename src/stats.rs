// src/stats.rs

/// mean + std
pub fn mean_std(data: &[f64]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;

    // Unbiased-ish sample variance with guard for n = 1.
    let denom = (n - 1.0).max(1.0);
    let var = data
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>() / denom;

    (mean, var.sqrt())
}

/// Mean of a slice.
pub fn mean(a: &[f64]) -> f64 {
    if a.is_empty() {
        0.0
    } else {
        a.iter().sum::<f64>() / (a.len() as f64)
    }
}

/// Sample variance of a slice.
pub fn variance(a: &[f64]) -> f64 {
    let (_, s) = mean_std(a);
    s * s
}

/// Linear-interpolation percentile over a pre-sorted slice.
///
/// `pct` is in [0, 100]. A single-element slice returns that element
/// for any percentile, so degenerate ensembles collapse cleanly.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
