//! Error types for the tab latency benchmark

use std::time::Duration;
use thiserror::Error;

use crate::types::Cycle;

/// Failures reported by a [`SampleSource`](crate::source::SampleSource)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Failed to acquire resource: {0}")]
    Acquisition(String),

    #[error("Resource not ready after {0:?}")]
    Timeout(Duration),

    #[error("Failed to release resource: {0}")]
    Release(String),
}

/// Failures while reading the environment probe
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to read probe source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identifier '{0}' not found")]
    MissingKey(String),

    #[error("Malformed line for '{key}': {line}")]
    Malformed { key: String, line: String },

    #[error("Identifier '{0}' has an empty value")]
    EmptyValue(String),
}

/// Benchmark engine errors
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Invalid sample duration: {0}")]
    InvalidSample(f64),

    #[error("Teardown failed after {attempts} attempts: {last_error}")]
    TeardownExhausted {
        attempts: u32,
        last_error: SourceError,
        /// Samples timed before teardown gave up. They are complete and valid.
        samples: Cycle,
    },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("No convergence after {iterations} iterations ({converged} converged rounds)")]
    NonConvergent { iterations: u64, converged: u32 },

    #[error("Session cancelled after {iterations} iterations")]
    Cancelled { iterations: u64 },

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("Report sink error: {0}")]
    Sink(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BenchError {
    /// Whether the session may record this error and keep sampling
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BenchError::Source(_) | BenchError::InvalidSample(_) | BenchError::DegenerateInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_are_recoverable() {
        let err: BenchError = SourceError::Acquisition("tab crashed".into()).into();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("tab crashed"));

        let err: BenchError = SourceError::Timeout(Duration::from_secs(3)).into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_teardown_exhaustion_is_fatal() {
        let err = BenchError::TeardownExhausted {
            attempts: 5,
            last_error: SourceError::Release("target gone".into()),
            samples: Cycle::default(),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_non_convergent_message() {
        let err = BenchError::NonConvergent {
            iterations: 40,
            converged: 0,
        };
        assert_eq!(
            err.to_string(),
            "No convergence after 40 iterations (0 converged rounds)"
        );
    }
}
