//! Session reporting
//!
//! Two kinds of output exist:
//!
//! - a [`ReportSink`] receives every [`SessionRecord`] while the session is
//!   running, in order, and the final [`SessionReport`] once it completes
//! - a [`Reporter`] formats a finished report as JSON or console text
//!
//! # Example
//!
//! ```no_run
//! use tab_bench::reporter::{OutputFormat, Reporter};
//! use tab_bench::session::SessionReport;
//!
//! # fn example(report: SessionReport) -> anyhow::Result<()> {
//! Reporter::new(OutputFormat::Console).report(&report)?;
//! Reporter::new(OutputFormat::Json).write_to_file(&report, "report.json")?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;

use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::session::{SessionRecord, SessionReport};

pub use console::{ConsoleReporter, ConsoleSink};
pub use json::{JsonLinesSink, JsonReporter};

/// Ordered, append-only consumer of session records
pub trait ReportSink: Send {
    /// Receive the next record. Called once per iteration, in sequence order.
    fn record(&mut self, record: &SessionRecord) -> crate::error::Result<()>;

    /// Receive the completed report
    fn finish(&mut self, _report: &SessionReport) -> crate::error::Result<()> {
        Ok(())
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<SessionRecord>,
    pub report: Option<SessionReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn record(&mut self, record: &SessionRecord) -> crate::error::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, report: &SessionReport) -> crate::error::Result<()> {
        self.report = Some(report.clone());
        Ok(())
    }
}

/// Forwards to several sinks in order, stopping at the first error
#[derive(Default)]
pub struct MultiSink(Vec<Box<dyn ReportSink>>);

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.0.push(Box::new(sink));
        self
    }
}

impl ReportSink for MultiSink {
    fn record(&mut self, record: &SessionRecord) -> crate::error::Result<()> {
        self.0.iter_mut().try_for_each(|sink| sink.record(record))
    }

    fn finish(&mut self, report: &SessionReport) -> crate::error::Result<()> {
        self.0.iter_mut().try_for_each(|sink| sink.finish(report))
    }
}

/// Output format for a finished report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format for machine parsing
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Human-readable summary
    #[default]
    Console,
}

/// Reporter for finished sessions
#[derive(Default)]
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report to stdout
    pub fn report(&self, report: &SessionReport) -> Result<()> {
        let output = self.format_report(report)?;
        print!("{}", output);
        io::stdout().flush()?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, report: &SessionReport, path: P) -> Result<()> {
        let output = self.format_report(report)?;
        fs::write(path, output)?;
        Ok(())
    }

    pub fn format_report(&self, report: &SessionReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(report, false),
            OutputFormat::JsonPretty => JsonReporter::format(report, true),
            OutputFormat::Console => ConsoleReporter::format(report),
        }
    }
}
