//! JSON output: whole reports and JSON-lines record streams
//!
//! Non-finite statistics (a pair of constant batches with different means)
//! are written as `null`.

use std::io::Write;

use super::ReportSink;
use crate::error::BenchError;
use crate::session::{SessionRecord, SessionReport};

/// JSON format reporter
pub struct JsonReporter;

impl JsonReporter {
    /// Format a finished report as JSON
    pub fn format(report: &SessionReport, pretty: bool) -> anyhow::Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(output)
    }
}

/// Writes one JSON object per record, one per line, flushing after each
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn record(&mut self, record: &SessionRecord) -> crate::error::Result<()> {
        let line = serde_json::to_string(record).map_err(|e| BenchError::Sink(e.to_string()))?;
        writeln!(self.writer, "{}", line).map_err(|e| BenchError::Sink(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| BenchError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::test_support::{record, report};
    use crate::session::VerdictKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_format_compact() {
        let output = JsonReporter::format(&report(), false).unwrap();
        assert!(!output.contains('\n'));
        assert!(output.contains("\"iterations\":3"));
    }

    #[test]
    fn test_json_format_pretty() {
        let output = JsonReporter::format(&report(), true).unwrap();
        assert!(output.contains('\n'));
        assert!(output.contains("  "));
    }

    #[test]
    fn test_json_report_parses_back() {
        let original = report();
        let json = JsonReporter::format(&original, false).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.records, original.records);
        assert_eq!(parsed.final_mean(), Some(11.1667));
    }

    #[test]
    fn test_json_lines_one_record_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record(&record(1, VerdictKind::NotEnoughData)).unwrap();
        sink.record(&record(2, VerdictKind::Failed)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["sequence_number"], 2);
        assert_eq!(second["verdict"], "failed");
        assert_eq!(second["raw_batch"], serde_json::Value::Null);
        assert_eq!(second["error"], "Resource not ready after 30s");
    }

    #[test]
    fn test_infinite_statistic_is_null() {
        let mut row = record(4, VerdictKind::NotConverged);
        row.stat_ab = Some(f64::INFINITY);
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.record(&row).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(value["stat_ab"], serde_json::Value::Null);
        assert_eq!(value["stat_bc"], 0.314);
    }
}
