//! Convergence-driven tab open latency benchmark
//!
//! This crate measures how long a browser takes to open a tab until the page
//! reports ready, and keeps sampling until the measured mean is stable.
//!
//! # How it works
//!
//! - A **cycle** opens `tabs_per_cycle` tabs one after another and times each
//!   one from the open request until `document.readyState == "complete"`
//! - A **batch** is `num_cycles` cycles
//! - After every batch, the three most recent batches are compared pairwise
//!   with a standardized difference of means; when all three statistics are
//!   below the threshold the round has **converged** and the pooled mean is
//!   reported
//! - A session ends after `target_converged_count` converged rounds
//!
//! Every iteration produces one [`SessionRecord`] which is streamed to a
//! [`ReportSink`](reporter::ReportSink).
//!
//! # Example
//!
//! ```no_run
//! use tab_bench::{Config, ChromeTabSource, Session};
//! use tab_bench::reporter::{ConsoleSink, OutputFormat, Reporter};
//! use chromiumoxide::browser::BrowserConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("tab-bench.toml")?;
//! let browser_config = BrowserConfig::builder()
//!     .build()
//!     .map_err(|e| anyhow::anyhow!("{}", e))?;
//! let source = ChromeTabSource::launch(browser_config, &config.source).await?;
//!
//! let mut session = Session::new(config.session.clone(), source, (&config.teardown).into())?;
//! let report = session.run(&mut ConsoleSink::stdout()).await?;
//!
//! Reporter::new(OutputFormat::Console).report(&report)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [session]
//! num_cycles = 5
//! tabs_per_cycle = 10
//! threshold = 1.0
//! target_converged_count = 1
//! max_iterations = 200
//!
//! [source]
//! target = { type = "url", url = "about:blank" }
//! ready_timeout_ms = 30000
//!
//! [teardown]
//! max_attempts = 5
//! retry_delay_ms = 50
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod probe;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod source;
pub mod stats;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use engine::{ConvergenceEngine, ConvergenceVerdict, PairwiseStats};
pub use error::{BenchError, ProbeError, Result, SourceError};
pub use reporter::{OutputFormat, ReportSink, Reporter};
pub use runner::{CycleRunner, RetryPolicy};
pub use session::{run_session, CancelFlag, Session, SessionRecord, SessionReport, VerdictKind};
pub use source::{ChromeTabSource, SampleSource};
pub use types::{Batch, Cycle};
