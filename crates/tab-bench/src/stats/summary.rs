//! Latency summaries for converged windows.

use serde::{Deserialize, Serialize};

use super::welch::{mean, population_variance};

/// Linearly interpolated percentile of `samples` (`p` in `0.0..=100.0`).
///
/// Returns `None` for an empty slice or an out-of-range `p`.
///
/// ```
/// use tab_bench::stats::percentile;
///
/// assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0, 5.0], 50.0), Some(3.0));
/// ```
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(interpolate(&sorted, p))
}

fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// Distribution summary of tab open latencies, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: usize,
    pub min: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation, consistent with the convergence statistic
    pub std_dev: f64,
}

impl LatencySummary {
    /// Summarize `samples`, or `None` when there are none
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(Self {
            count: sorted.len(),
            min: sorted[0],
            p50: interpolate(&sorted, 50.0),
            p95: interpolate(&sorted, 95.0),
            max: sorted[sorted.len() - 1],
            mean: mean(samples)?,
            std_dev: population_variance(samples)?.sqrt(),
        })
    }
}
