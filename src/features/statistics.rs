//! Scalar statistics over feature series.
//!
//! Every function is total: an empty series or a degenerate one (zero
//! variance, zero weights) yields 0.0 rather than NaN.

const MODULATION_EPSILON: f64 = 1e-12;

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (no degrees-of-freedom correction).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    central_moment(values, 2).sqrt()
}

pub(crate) fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub(crate) fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

pub(crate) fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks.
pub(crate) fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Biased sample skewness, m3 / m2^1.5.
pub(crate) fn skewness(values: &[f64]) -> f64 {
    let m2 = central_moment(values, 2);
    if is_degenerate(values, m2) {
        return 0.0;
    }
    central_moment(values, 3) / m2.powf(1.5)
}

/// Biased excess (Fisher) kurtosis, m4 / m2^2 - 3.
pub(crate) fn excess_kurtosis(values: &[f64]) -> f64 {
    let m2 = central_moment(values, 2);
    if is_degenerate(values, m2) {
        return 0.0;
    }
    central_moment(values, 4) / (m2 * m2) - 3.0
}

/// std / mean, used as the pitch modulation index.
pub(crate) fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    std_dev(values) / (mean(values) + MODULATION_EPSILON)
}

fn central_moment(values: &[f64], order: i32) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    values.iter().map(|v| (v - mu).powi(order)).sum::<f64>() / values.len() as f64
}

// Variance at the level of rounding noise makes the standardized moments meaningless.
fn is_degenerate(values: &[f64], m2: f64) -> bool {
    let scale = mean(values).abs().max(1.0);
    m2 <= (1e-10 * scale).powi(2)
}

/// Moments of a discrete distribution: `weights` over `support` points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct WeightedMoments {
    pub mean: f64,
    pub std_dev: f64,
    /// Σ w·z³
    pub skewness: f64,
    /// Σ w·z⁴ (not excess)
    pub kurtosis: f64,
}

/// Moments of `support` weighted by `weights`; the weights are expected to
/// sum to one (an all-zero weight vector gives all-zero moments).
pub(crate) fn weighted_moments(support: &[f64], weights: &[f64]) -> WeightedMoments {
    let mean: f64 = support.iter().zip(weights).map(|(x, w)| x * w).sum();
    let variance: f64 = support
        .iter()
        .zip(weights)
        .map(|(x, w)| w * (x - mean).powi(2))
        .sum();
    let std_dev = variance.max(0.0).sqrt();
    if std_dev <= 0.0 {
        return WeightedMoments {
            mean,
            std_dev,
            ..WeightedMoments::default()
        };
    }
    let standardized = |power: i32| -> f64 {
        support
            .iter()
            .zip(weights)
            .map(|(x, w)| w * ((x - mean) / std_dev).powi(power))
            .sum()
    };
    WeightedMoments {
        mean,
        std_dev,
        skewness: standardized(3),
        kurtosis: standardized(4),
    }
}

/// Index of the first cumulative weight reaching `q`, or 0 if none does.
pub(crate) fn cumulative_index(weights: &[f64], q: f64) -> usize {
    let mut total = 0.0;
    for (idx, w) in weights.iter().enumerate() {
        total += w;
        if total >= q {
            return idx;
        }
    }
    0
}

/// Index of the first maximum, 0 for an empty slice.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}
