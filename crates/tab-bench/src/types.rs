//! Sample containers
//!
//! A [`Cycle`] is the ordered list of latencies from one run of tab opens and a
//! [`Batch`] is the ordered list of cycles from one round. Both serialize as
//! plain nested arrays so report consumers see `[[f64]]`.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Ordered latency samples in milliseconds, in request order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Cycle(Vec<f64>);

impl TryFrom<Vec<f64>> for Cycle {
    type Error = BenchError;

    fn try_from(samples: Vec<f64>) -> Result<Self> {
        Self::from_samples(samples)
    }
}

impl From<Cycle> for Vec<f64> {
    fn from(cycle: Cycle) -> Self {
        cycle.0
    }
}

impl Cycle {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Build a cycle from raw durations, rejecting any invalid sample
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Result<Self> {
        let mut cycle = Self::default();
        for sample in samples {
            cycle.record(sample)?;
        }
        Ok(cycle)
    }

    /// Append one duration. Negative, NaN and infinite values are rejected.
    pub fn record(&mut self, millis: f64) -> Result<()> {
        if !millis.is_finite() || millis < 0.0 {
            return Err(BenchError::InvalidSample(millis));
        }
        self.0.push(millis);
        Ok(())
    }

    pub fn samples(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered cycles from one round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(Vec<Cycle>);

impl Batch {
    pub fn new(cycles: Vec<Cycle>) -> Self {
        Self(cycles)
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.0
    }

    /// Number of cycles
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of samples across all cycles
    pub fn sample_count(&self) -> usize {
        self.0.iter().map(Cycle::len).sum()
    }

    /// All samples, cycle by cycle, in recorded order
    pub fn flatten(&self) -> Vec<f64> {
        self.0
            .iter()
            .flat_map(|cycle| cycle.samples().iter().copied())
            .collect()
    }
}
