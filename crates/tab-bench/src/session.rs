//! Session orchestration
//!
//! A [`Session`] owns everything one benchmark needs: the runner and its
//! source, a fresh [`ConvergenceEngine`], and the counters. It keeps running
//! batches until the configured number of rounds has converged.
//!
//! ```text
//!   Warmup ──(2 batches recorded)──▶ Sampling ──(converged == target)──▶ done
//!     │                                 │
//!     └─ every batch: evaluate, emit one record (NotEnoughData / NotConverged /
//!        Converged / Failed)
//! ```
//!
//! Every iteration emits exactly one [`SessionRecord`] to the sink before the
//! next batch starts, so the audit trail survives a session that later fails.
//! Cancellation is observed between iterations only; a cycle in flight always
//! completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::SessionConfig;
use crate::engine::{ConvergenceEngine, ConvergenceVerdict, WINDOW};
use crate::error::{BenchError, Result};
use crate::probe::FirmwareIds;
use crate::reporter::ReportSink;
use crate::runner::{CycleRunner, RetryPolicy};
use crate::source::SampleSource;
use crate::stats::LatencySummary;
use crate::types::Batch;

/// Session state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fewer batches recorded than a comparison window needs
    Warmup,
    Sampling,
}

/// Outcome of one iteration as written to the report stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    NotEnoughData,
    NotConverged,
    Converged,
    /// The batch could not be collected or evaluated
    Failed,
}

impl std::fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            VerdictKind::NotEnoughData => "not enough data",
            VerdictKind::NotConverged => "not converged",
            VerdictKind::Converged => "converged",
            VerdictKind::Failed => "failed",
        };
        f.write_str(label)
    }
}

impl From<&ConvergenceVerdict> for VerdictKind {
    fn from(verdict: &ConvergenceVerdict) -> Self {
        match verdict {
            ConvergenceVerdict::NotEnoughData => VerdictKind::NotEnoughData,
            ConvergenceVerdict::NotConverged { .. } => VerdictKind::NotConverged,
            ConvergenceVerdict::Converged { .. } => VerdictKind::Converged,
        }
    }
}

/// One row of the report stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// 1-based iteration number
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub verdict: VerdictKind,
    pub pooled_mean: Option<f64>,
    pub stat_ab: Option<f64>,
    pub stat_bc: Option<f64>,
    pub stat_ca: Option<f64>,
    pub raw_batch: Option<Batch>,
    /// Window distribution, present on converged rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<LatencySummary>,
    /// Failure description, present on failed rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionRecord {
    pub fn from_verdict(sequence_number: u64, verdict: &ConvergenceVerdict, batch: Batch) -> Self {
        let summary = match verdict {
            ConvergenceVerdict::Converged { summary, .. } => Some(summary.clone()),
            _ => None,
        };
        let stats = verdict.stats();
        Self {
            sequence_number,
            timestamp: Utc::now(),
            verdict: verdict.into(),
            pooled_mean: verdict.pooled_mean(),
            stat_ab: stats.map(|s| s.ab),
            stat_bc: stats.map(|s| s.bc),
            stat_ca: stats.map(|s| s.ca),
            raw_batch: Some(batch),
            summary,
            error: None,
        }
    }

    pub fn failed(sequence_number: u64, error: &BenchError) -> Self {
        Self {
            sequence_number,
            timestamp: Utc::now(),
            verdict: VerdictKind::Failed,
            pooled_mean: None,
            stat_ab: None,
            stat_bc: None,
            stat_ca: None,
            raw_batch: None,
            summary: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of a session, complete or cut short
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// RFC 3339 start time
    pub started_at: String,
    pub duration_ms: u64,
    pub config: SessionConfig,
    /// Machine identifiers, when a probe was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<FirmwareIds>,
    pub iterations: u64,
    pub converged_count: u32,
    pub failed_iterations: u64,
    pub records: Vec<SessionRecord>,
    /// Why the session stopped early, absent when the target was reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionReport {
    /// Pooled means of every converged round, in order
    pub fn converged_means(&self) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.pooled_mean).collect()
    }

    /// Pooled mean of the last converged round
    pub fn final_mean(&self) -> Option<f64> {
        self.records.iter().rev().find_map(|r| r.pooled_mean)
    }
}

/// Cooperative cancellation shared with the session, checked between iterations
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters and rows gathered while a session runs
#[derive(Debug, Default)]
struct Progress {
    records: Vec<SessionRecord>,
    iterations: u64,
    converged_count: u32,
    failed_iterations: u64,
}

/// One benchmarking session
pub struct Session<S: SampleSource> {
    config: SessionConfig,
    runner: CycleRunner<S>,
    engine: ConvergenceEngine,
    cancel: CancelFlag,
    environment: Option<FirmwareIds>,
    report: Option<SessionReport>,
}

impl<S: SampleSource> Session<S> {
    /// Create a session with an empty history
    ///
    /// # Errors
    ///
    /// [`BenchError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: SessionConfig, source: S, retry: RetryPolicy) -> Result<Self> {
        config.validate()?;
        if retry.max_attempts == 0 {
            return Err(BenchError::InvalidConfig(
                "retry policy needs at least one attempt".into(),
            ));
        }
        Ok(Self {
            engine: ConvergenceEngine::new(config.threshold),
            runner: CycleRunner::new(source, retry),
            config,
            cancel: CancelFlag::new(),
            environment: None,
            report: None,
        })
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attach probed machine identifiers to the report
    pub fn with_environment(mut self, environment: FirmwareIds) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn phase(&self) -> Phase {
        if self.engine.history().len() < WINDOW - 1 {
            Phase::Warmup
        } else {
            Phase::Sampling
        }
    }

    pub fn engine(&self) -> &ConvergenceEngine {
        &self.engine
    }

    pub fn runner(&self) -> &CycleRunner<S> {
        &self.runner
    }

    /// Report of the last [`Session::run`], including one that ended in an error
    pub fn report(&self) -> Option<&SessionReport> {
        self.report.as_ref()
    }

    /// Run batches until `target_converged_count` rounds converge.
    ///
    /// Each iteration's record is passed to `sink` as soon as it exists. The
    /// sink's `finish` receives the report on every exit path; when the
    /// session ends in an error the report is partial, carries the error
    /// text, and stays available from [`Session::report`].
    ///
    /// # Errors
    ///
    /// - [`BenchError::NonConvergent`] when `max_iterations` is reached first
    /// - [`BenchError::Cancelled`] when the cancel flag is raised
    /// - [`BenchError::TeardownExhausted`] and sink failures end the session
    ///   immediately
    /// - a recoverable error repeated more than `max_consecutive_failures`
    ///   times in a row is returned as is
    #[instrument(skip_all, fields(
        num_cycles = self.config.num_cycles,
        tabs_per_cycle = self.config.tabs_per_cycle,
        threshold = self.config.threshold,
    ))]
    pub async fn run(&mut self, sink: &mut dyn ReportSink) -> Result<SessionReport> {
        let started_at = Utc::now().to_rfc3339();
        let start = Instant::now();

        info!(
            "Starting session: target {} converged rounds",
            self.config.target_converged_count
        );

        let mut progress = Progress::default();
        let outcome = self.drive(sink, &mut progress).await;

        let report = SessionReport {
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            config: self.config.clone(),
            environment: self.environment.clone(),
            iterations: progress.iterations,
            converged_count: progress.converged_count,
            failed_iterations: progress.failed_iterations,
            records: progress.records,
            error: outcome.as_ref().err().map(|e| e.to_string()),
        };
        self.report = Some(report.clone());

        match outcome {
            Ok(()) => {
                sink.finish(&report)?;
                Ok(report)
            }
            Err(e) => {
                if let Err(finish_error) = sink.finish(&report) {
                    warn!("Could not finish partial report: {}", finish_error);
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, sink: &mut dyn ReportSink, progress: &mut Progress) -> Result<()> {
        let mut consecutive_failures: u32 = 0;
        let mut phase = self.phase();

        while progress.converged_count < self.config.target_converged_count {
            if self.cancel.is_cancelled() {
                warn!("Session cancelled after {} iterations", progress.iterations);
                return Err(BenchError::Cancelled {
                    iterations: progress.iterations,
                });
            }
            if let Some(max) = self.config.max_iterations {
                if progress.iterations >= max {
                    warn!("Iteration cap of {} reached without convergence", max);
                    return Err(BenchError::NonConvergent {
                        iterations: progress.iterations,
                        converged: progress.converged_count,
                    });
                }
            }
            progress.iterations += 1;
            let iteration = progress.iterations;

            match self.iterate(iteration).await {
                Ok(record) => {
                    consecutive_failures = 0;
                    if record.verdict == VerdictKind::Converged {
                        progress.converged_count += 1;
                        info!(
                            "Round {}/{} converged",
                            progress.converged_count, self.config.target_converged_count
                        );
                    }
                    emit(sink, progress, record)?;
                }
                Err(e) => {
                    progress.failed_iterations += 1;
                    emit(sink, progress, SessionRecord::failed(iteration, &e))?;

                    if !e.is_recoverable() {
                        error!("Iteration {} aborted the session: {}", iteration, e);
                        return Err(e);
                    }
                    consecutive_failures += 1;
                    warn!("Iteration {} failed: {}", iteration, e);
                    if consecutive_failures > self.config.max_consecutive_failures {
                        error!("{} consecutive failed iterations", consecutive_failures);
                        return Err(e);
                    }
                    continue;
                }
            }

            let next = self.phase();
            if next != phase {
                info!("Warmup complete, sampling");
                phase = next;
            }
        }
        Ok(())
    }

    async fn iterate(&mut self, sequence_number: u64) -> Result<SessionRecord> {
        let batch = self
            .runner
            .run_batch(self.config.num_cycles, self.config.tabs_per_cycle)
            .await?;
        let verdict = self.engine.evaluate(batch.clone())?;
        if let Some(stats) = verdict.stats() {
            info!(
                "Iteration {}: {} (ab={:.3}, bc={:.3}, ca={:.3})",
                sequence_number,
                VerdictKind::from(&verdict),
                stats.ab,
                stats.bc,
                stats.ca
            );
        }
        Ok(SessionRecord::from_verdict(sequence_number, &verdict, batch))
    }
}

fn emit(sink: &mut dyn ReportSink, progress: &mut Progress, record: SessionRecord) -> Result<()> {
    sink.record(&record)?;
    progress.records.push(record);
    Ok(())
}

/// Build a [`Session`] and run it to completion
pub async fn run_session<S: SampleSource>(
    config: SessionConfig,
    source: S,
    retry: RetryPolicy,
    sink: &mut dyn ReportSink,
) -> Result<SessionReport> {
    Session::new(config, source, retry)?.run(sink).await
}
