//! Cycle and batch execution
//!
//! The runner drives a [`SampleSource`] strictly sequentially: one tab is
//! opened and waited on before the next one starts, so samples never compete
//! with each other for the scheduler.
//!
//! ```text
//! cycle:  acquire ─▶ ready ─▶ (t1)  acquire ─▶ ready ─▶ (t2)  ...  release all
//!         └──────── t1 ───────┘     └──────── t2 ───────┘
//! batch:  cycle 1, cycle 2, ..., cycle M
//! ```
//!
//! Tabs stay open until the last sample of the cycle has been timed and are
//! then closed, each with a bounded number of retries.
//!
//! # Example
//!
//! ```no_run
//! use tab_bench::runner::{CycleRunner, RetryPolicy};
//! use tab_bench::source::SampleSource;
//!
//! # async fn example<S: SampleSource>(source: S) -> tab_bench::error::Result<()> {
//! let mut runner = CycleRunner::new(source, RetryPolicy::default());
//! let batch = runner.run_batch(5, 10).await?;
//! assert_eq!(batch.sample_count(), 50);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{BenchError, Result, SourceError};
use crate::source::SampleSource;
use crate::types::{Batch, Cycle};

/// Bounded retry for releasing resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per resource, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(50),
        }
    }
}

/// Runs cycles and batches against a sample source
pub struct CycleRunner<S: SampleSource> {
    source: S,
    retry: RetryPolicy,
}

impl<S: SampleSource> CycleRunner<S> {
    pub fn new(source: S, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Time `tabs_per_cycle` sequential samples, then release every resource.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Acquisition`] or [`SourceError::Timeout`] abort the
    ///   cycle. Resources opened so far are still released and no partial
    ///   cycle is returned.
    /// - [`BenchError::TeardownExhausted`] when a resource cannot be released
    ///   within the retry policy. The error carries the complete cycle.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self, tabs_per_cycle: usize) -> Result<Cycle> {
        let mut cycle = Cycle::with_capacity(tabs_per_cycle);
        let mut handles = Vec::with_capacity(tabs_per_cycle);

        for index in 0..tabs_per_cycle {
            let start = Instant::now();
            let handle = match self.source.acquire().await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!("Acquisition failed at sample {}: {}", index, e);
                    self.abandon(handles).await;
                    return Err(e.into());
                }
            };
            let ready = self.source.wait_until_ready(&handle).await;
            let elapsed = start.elapsed();
            handles.push(handle);

            if let Err(e) = ready {
                warn!("Sample {} never became ready: {}", index, e);
                self.abandon(handles).await;
                return Err(e.into());
            }

            let millis = elapsed.as_nanos() as f64 / 1_000_000.0;
            debug!(sample = index, millis, "Tab ready");
            if let Err(e) = cycle.record(millis) {
                self.abandon(handles).await;
                return Err(e);
            }
        }

        self.teardown(handles, cycle).await
    }

    /// Run `num_cycles` cycles back to back.
    ///
    /// The first failing cycle aborts the batch; no partial batch is returned.
    #[instrument(skip(self))]
    pub async fn run_batch(&mut self, num_cycles: usize, tabs_per_cycle: usize) -> Result<Batch> {
        let start = Instant::now();
        let mut cycles = Vec::with_capacity(num_cycles);
        for _ in 0..num_cycles {
            cycles.push(self.run_cycle(tabs_per_cycle).await?);
        }
        info!(
            "Batch of {} cycles x {} tabs finished in {}ms",
            num_cycles,
            tabs_per_cycle,
            start.elapsed().as_millis()
        );
        Ok(Batch::new(cycles))
    }

    async fn teardown(&mut self, handles: Vec<S::Handle>, cycle: Cycle) -> Result<Cycle> {
        let mut exhausted = None;
        for handle in &handles {
            if let Err((attempts, e)) = self.release_with_retry(handle).await {
                error!("Giving up on releasing resource after {} attempts: {}", attempts, e);
                exhausted.get_or_insert((attempts, e));
            }
        }

        match exhausted {
            None => Ok(cycle),
            Some((attempts, last_error)) => Err(BenchError::TeardownExhausted {
                attempts,
                last_error,
                samples: cycle,
            }),
        }
    }

    /// Best-effort release while an earlier error is already propagating
    async fn abandon(&mut self, handles: Vec<S::Handle>) {
        for handle in &handles {
            if let Err((attempts, e)) = self.release_with_retry(handle).await {
                error!(
                    "Leaking resource from aborted cycle after {} attempts: {}",
                    attempts, e
                );
            }
        }
    }

    async fn release_with_retry(
        &mut self,
        handle: &S::Handle,
    ) -> std::result::Result<(), (u32, SourceError)> {
        let mut attempt = 1;
        loop {
            match self.source.release(handle).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.retry.max_attempts => return Err((attempt, e)),
                Err(e) => {
                    warn!("Remove failed (attempt {}), retrying: {}", attempt, e);
                    attempt += 1;
                    if !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
    }
}
