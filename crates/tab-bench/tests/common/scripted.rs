//! Scripted sample source for session tests
//!
//! Each `wait_until_ready` sleeps for the next scripted latency. Run tests
//! with `#[tokio::test(start_paused = true)]` so the measured durations equal
//! the script exactly.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tab_bench::error::SourceError;
use tab_bench::source::SampleSource;

/// One scripted step per sample
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Tab becomes ready after this many milliseconds
    Ready(u64),
    /// Opening the tab fails
    AcquireFails,
    /// The tab never becomes ready
    TimesOut,
}

#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    /// Latency used once the script is exhausted
    pub fallback_ms: Option<u64>,
    /// Every release attempt fails
    pub release_always_fails: bool,
    next_handle: u64,
    pub open: Vec<u64>,
    pub acquired: u64,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Script built from latencies, one batch per slice
    pub fn from_batches(batches: &[&[u64]]) -> Self {
        Self::new(
            batches
                .iter()
                .flat_map(|b| b.iter().copied())
                .map(Step::Ready),
        )
    }

    /// Same latency forever
    pub fn constant(ms: u64) -> Self {
        Self {
            fallback_ms: Some(ms),
            ..Default::default()
        }
    }

    fn next_step(&mut self) -> Step {
        self.steps
            .pop_front()
            .or_else(|| self.fallback_ms.map(Step::Ready))
            .unwrap_or(Step::AcquireFails)
    }
}

/// Handle carrying the step decided at acquisition
pub struct ScriptedTab {
    id: u64,
    step: Step,
}

#[async_trait]
impl SampleSource for ScriptedSource {
    type Handle = ScriptedTab;

    async fn acquire(&mut self) -> Result<ScriptedTab, SourceError> {
        let step = self.next_step();
        if step == Step::AcquireFails {
            return Err(SourceError::Acquisition("scripted failure".into()));
        }
        self.next_handle += 1;
        self.acquired += 1;
        self.open.push(self.next_handle);
        Ok(ScriptedTab {
            id: self.next_handle,
            step,
        })
    }

    async fn wait_until_ready(&mut self, tab: &ScriptedTab) -> Result<(), SourceError> {
        match tab.step {
            Step::Ready(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            _ => Err(SourceError::Timeout(Duration::from_secs(30))),
        }
    }

    async fn release(&mut self, tab: &ScriptedTab) -> Result<(), SourceError> {
        if self.release_always_fails {
            return Err(SourceError::Release("tab is busy".into()));
        }
        self.open.retain(|id| *id != tab.id);
        Ok(())
    }
}
