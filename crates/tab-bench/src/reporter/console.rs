//! Console output for session records and finished reports

use anyhow::Result;
use std::fmt::Write as _;
use std::io::Write;

use super::ReportSink;
use crate::error::BenchError;
use crate::session::{SessionRecord, SessionReport, VerdictKind};
use crate::stats::mean;

/// Console format reporter
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Format a finished report for the terminal
    pub fn format(report: &SessionReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                    TAB OPEN LATENCY                          ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        writeln!(output, "Started:   {}", report.started_at)?;
        writeln!(output, "Duration:  {}ms", report.duration_ms)?;
        if let Some(env) = &report.environment {
            writeln!(output, "hwid:      {}", env.hwid)?;
            writeln!(output, "fwid:      {}", env.fwid)?;
        }
        writeln!(output)?;

        writeln!(output, "Configuration:")?;
        writeln!(output, "  Cycles per batch:   {}", report.config.num_cycles)?;
        writeln!(output, "  Tabs per cycle:     {}", report.config.tabs_per_cycle)?;
        writeln!(output, "  Threshold:          {}", report.config.threshold)?;
        writeln!(output, "  Target rounds:      {}", report.config.target_converged_count)?;
        writeln!(output)?;

        writeln!(
            output,
            "Iterations: {} ({} failed), converged rounds: {}",
            report.iterations, report.failed_iterations, report.converged_count
        )?;
        writeln!(output)?;

        for record in report
            .records
            .iter()
            .filter(|r| r.verdict == VerdictKind::Converged)
        {
            Self::format_converged(&mut output, record)?;
        }

        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        match report.final_mean() {
            Some(m) => writeln!(output, "Result: ✓ CONVERGED, mean tab open latency {:.2}ms", m)?,
            None => writeln!(output, "Result: ✗ no converged round")?,
        }
        if let Some(error) = &report.error {
            writeln!(output, "Stopped: {}", error)?;
        }
        writeln!(output)?;
        Ok(output)
    }

    fn format_converged(output: &mut String, record: &SessionRecord) -> Result<()> {
        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        writeln!(output, "Iteration {} converged", record.sequence_number)?;
        if let Some(pooled) = record.pooled_mean {
            writeln!(output, "  Pooled mean: {:.2}ms", pooled)?;
        }
        writeln!(
            output,
            "  Statistics:  ab={}  bc={}  ca={}",
            format_stat(record.stat_ab),
            format_stat(record.stat_bc),
            format_stat(record.stat_ca)
        )?;

        if let Some(summary) = &record.summary {
            writeln!(output, "  ┌─────────┬─────────┬─────────┬─────────┬─────────┐")?;
            writeln!(output, "  │   Min   │   P50   │   P95   │   Max   │ StdDev  │")?;
            writeln!(output, "  ├─────────┼─────────┼─────────┼─────────┼─────────┤")?;
            writeln!(
                output,
                "  │ {:>7.1} │ {:>7.1} │ {:>7.1} │ {:>7.1} │ {:>7.2} │",
                summary.min, summary.p50, summary.p95, summary.max, summary.std_dev
            )?;
            writeln!(output, "  └─────────┴─────────┴─────────┴─────────┴─────────┘")?;
            writeln!(output, "  {} samples in window", summary.count)?;
        }
        writeln!(output)?;
        Ok(())
    }

    /// One line per record, for streaming progress
    pub fn format_record(record: &SessionRecord) -> Result<String> {
        let mut line = String::new();
        write!(line, "#{:<4} {:<16}", record.sequence_number, record.verdict.to_string())?;

        if let Some(batch) = &record.raw_batch {
            if let Some(m) = mean(&batch.flatten()) {
                write!(line, " batch mean {:>8.2}ms", m)?;
            }
        }
        if record.stat_ab.is_some() {
            write!(
                line,
                "  ab={} bc={} ca={}",
                format_stat(record.stat_ab),
                format_stat(record.stat_bc),
                format_stat(record.stat_ca)
            )?;
        }
        if let Some(pooled) = record.pooled_mean {
            write!(line, "  pooled mean {:.2}ms", pooled)?;
        }
        if let Some(error) = &record.error {
            write!(line, " {}", error)?;
        }
        Ok(line)
    }
}

fn format_stat(stat: Option<f64>) -> String {
    match stat {
        Some(v) if v.is_infinite() => "inf".to_string(),
        Some(v) => format!("{:.3}", v),
        None => "-".to_string(),
    }
}

/// Prints one progress line per record
pub struct ConsoleSink<W: Write + Send> {
    writer: W,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for ConsoleSink<W> {
    fn record(&mut self, record: &SessionRecord) -> crate::error::Result<()> {
        let line =
            ConsoleReporter::format_record(record).map_err(|e| BenchError::Sink(e.to_string()))?;
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| BenchError::Sink(e.to_string()))
    }
}
