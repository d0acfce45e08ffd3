//! Convergence detection over successive batches
//!
//! After every new batch the engine flattens the three most recent batches
//! (`a` = newest, `b`, `c` = oldest of the three) and computes the
//! standardized mean difference for the pairs `(a, b)`, `(b, c)` and
//! `(c, a)`. The window has converged when all three fall strictly below the
//! threshold; the pooled mean is then the average of the three batch means.
//!
//! The threshold is an ad hoc sensitivity setting. Repeatedly testing until
//! the statistics look small is not a calibrated sequential test, so a
//! `Converged` verdict carries no formal error-rate guarantee.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::stats::{mean, standardized_difference, LatencySummary};
use crate::types::Batch;

/// Number of trailing batches compared on each evaluation
pub const WINDOW: usize = 3;

/// The three pairwise statistics of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseStats {
    /// newest vs second newest
    pub ab: f64,
    /// second newest vs third newest
    pub bc: f64,
    /// third newest vs newest
    pub ca: f64,
}

impl PairwiseStats {
    pub fn all_below(&self, threshold: f64) -> bool {
        self.ab < threshold && self.bc < threshold && self.ca < threshold
    }

    pub fn max(&self) -> f64 {
        self.ab.max(self.bc).max(self.ca)
    }
}

/// Result of evaluating one batch
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceVerdict {
    /// Fewer than three batches recorded so far
    NotEnoughData,
    NotConverged {
        stats: PairwiseStats,
    },
    Converged {
        stats: PairwiseStats,
        pooled_mean: f64,
        /// Means of the newest, second and third newest batches
        batch_means: [f64; WINDOW],
        /// Distribution of the flattened window
        summary: LatencySummary,
    },
}

impl ConvergenceVerdict {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceVerdict::Converged { .. })
    }

    pub fn stats(&self) -> Option<&PairwiseStats> {
        match self {
            ConvergenceVerdict::NotEnoughData => None,
            ConvergenceVerdict::NotConverged { stats } => Some(stats),
            ConvergenceVerdict::Converged { stats, .. } => Some(stats),
        }
    }

    pub fn pooled_mean(&self) -> Option<f64> {
        match self {
            ConvergenceVerdict::Converged { pooled_mean, .. } => Some(*pooled_mean),
            _ => None,
        }
    }
}

/// Owns the append-only batch history of one session
#[derive(Debug, Clone)]
pub struct ConvergenceEngine {
    threshold: f64,
    history: Vec<Batch>,
}

impl ConvergenceEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            history: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Every batch accepted so far, oldest first
    pub fn history(&self) -> &[Batch] {
        &self.history
    }

    /// Record `batch` and judge the newest three-batch window.
    ///
    /// # Errors
    ///
    /// [`BenchError::DegenerateInput`] for a batch without samples or one
    /// whose statistics are not finite. A rejected batch is not recorded.
    ///
    /// # Example
    ///
    /// ```
    /// use tab_bench::engine::{ConvergenceEngine, ConvergenceVerdict};
    /// use tab_bench::types::{Batch, Cycle};
    ///
    /// # fn example() -> tab_bench::error::Result<()> {
    /// let mut engine = ConvergenceEngine::new(1.0);
    /// let batch = || Batch::new(vec![Cycle::from_samples([100.0, 100.0]).unwrap()]);
    ///
    /// assert_eq!(engine.evaluate(batch())?, ConvergenceVerdict::NotEnoughData);
    /// assert_eq!(engine.evaluate(batch())?, ConvergenceVerdict::NotEnoughData);
    /// assert_eq!(engine.evaluate(batch())?.pooled_mean(), Some(100.0));
    /// # Ok(())
    /// # }
    /// ```
    pub fn evaluate(&mut self, batch: Batch) -> Result<ConvergenceVerdict> {
        let flat = batch.flatten();
        if flat.is_empty() {
            return Err(BenchError::DegenerateInput(
                "batch contains no samples".to_string(),
            ));
        }
        if let Some(bad) = flat.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(BenchError::DegenerateInput(format!(
                "batch contains invalid sample {bad}"
            )));
        }
        // Overflowing means would turn every later window into NaN
        match mean(&flat) {
            Some(m) if m.is_finite() => {}
            m => {
                return Err(BenchError::DegenerateInput(format!(
                    "batch mean is not finite ({m:?})"
                )))
            }
        }

        self.history.push(batch);
        if self.history.len() < WINDOW {
            debug!(
                "History has {} batches, need {}",
                self.history.len(),
                WINDOW
            );
            return Ok(ConvergenceVerdict::NotEnoughData);
        }

        let n = self.history.len();
        let x_a = self.history[n - 1].flatten();
        let x_b = self.history[n - 2].flatten();
        let x_c = self.history[n - 3].flatten();

        let stats = PairwiseStats {
            ab: standardized_difference(&x_a, &x_b)?,
            bc: standardized_difference(&x_b, &x_c)?,
            ca: standardized_difference(&x_c, &x_a)?,
        };
        debug!(
            stat_ab = stats.ab,
            stat_bc = stats.bc,
            stat_ca = stats.ca,
            "Pairwise statistics"
        );

        if !stats.all_below(self.threshold) {
            return Ok(ConvergenceVerdict::NotConverged { stats });
        }

        let batch_means = [
            window_mean(&x_a)?,
            window_mean(&x_b)?,
            window_mean(&x_c)?,
        ];
        let pooled_mean = batch_means.iter().sum::<f64>() / WINDOW as f64;

        let window: Vec<f64> = [x_a, x_b, x_c].concat();
        let summary = LatencySummary::from_samples(&window).ok_or_else(|| {
            BenchError::DegenerateInput("converged window is empty".to_string())
        })?;

        info!("Converged: pooled mean {:.3}ms", pooled_mean);
        Ok(ConvergenceVerdict::Converged {
            stats,
            pooled_mean,
            batch_means,
            summary,
        })
    }
}

fn window_mean(samples: &[f64]) -> Result<f64> {
    mean(samples).ok_or_else(|| BenchError::DegenerateInput("empty batch in window".to_string()))
}
