//! Difference-of-means statistic used by the convergence check.
//!
//! The statistic is the absolute mean difference divided by the combined
//! standard error, with **population** variance (divide by `n`):
//!
//! ```text
//! stat(x, y) = |mean(x) - mean(y)| / sqrt(var(x)/len(x) + var(y)/len(y))
//! ```
//!
//! It is compared against a tunable threshold, not converted to a p-value.
//! Treat the threshold as a sensitivity knob rather than a calibrated error
//! rate.

use crate::error::{BenchError, Result};

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population variance (denominator `n`), or `None` for an empty slice.
///
/// # Examples
///
/// ```
/// use tab_bench::stats::population_variance;
///
/// let v = population_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
/// assert_eq!(v, 4.0);
/// ```
pub fn population_variance(samples: &[f64]) -> Option<f64> {
    let m = mean(samples)?;
    let squared: f64 = samples.iter().map(|&x| (x - m).powi(2)).sum();
    Some(squared / samples.len() as f64)
}

/// Standardized mean difference between two sample sets.
///
/// Two constant sets with equal means are a tie and yield `0.0`. Two constant
/// sets with different means yield `f64::INFINITY`, which never passes a
/// finite threshold.
///
/// # Errors
///
/// [`BenchError::DegenerateInput`] if either set is empty or the inputs
/// produce a NaN or infinite mean.
///
/// # Examples
///
/// ```
/// use tab_bench::stats::standardized_difference;
///
/// let x = [10.0, 12.0, 11.0];
/// assert_eq!(standardized_difference(&x, &x).unwrap(), 0.0);
///
/// let stat = standardized_difference(&[100.0, 100.0], &[200.0, 200.0]).unwrap();
/// assert!(stat.is_infinite());
/// ```
pub fn standardized_difference(x: &[f64], y: &[f64]) -> Result<f64> {
    let (mean_x, var_x) = moments(x)?;
    let (mean_y, var_y) = moments(y)?;

    let numerator = (mean_x - mean_y).abs();
    let denominator = (var_x / x.len() as f64 + var_y / y.len() as f64).sqrt();

    if denominator == 0.0 {
        return Ok(if numerator == 0.0 { 0.0 } else { f64::INFINITY });
    }

    let stat = numerator / denominator;
    if stat.is_nan() {
        return Err(BenchError::DegenerateInput(format!(
            "statistic is NaN (means {mean_x} and {mean_y}, variances {var_x} and {var_y})"
        )));
    }
    Ok(stat)
}

fn moments(samples: &[f64]) -> Result<(f64, f64)> {
    let m = mean(samples)
        .ok_or_else(|| BenchError::DegenerateInput("empty sample set".to_string()))?;
    if !m.is_finite() {
        return Err(BenchError::DegenerateInput(format!("non-finite mean {m}")));
    }
    let v = population_variance(samples).unwrap_or(0.0);
    if !v.is_finite() {
        return Err(BenchError::DegenerateInput(format!("non-finite variance {v}")));
    }
    Ok((m, v))
}
