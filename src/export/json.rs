//! Render the full report, every mail included, as JSON.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::{Result, TallyError};
use crate::model::report::AggregateReport;

/// Pretty-print the report with a four-space indent.
pub fn render_json(report: &AggregateReport) -> Result<String> {
    let mut buf = Vec::with_capacity(4096);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    report
        .serialize(&mut ser)
        .map_err(|e| TallyError::Output(format!("JSON serialization failed: {e}")))?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| TallyError::Output(format!("JSON is not UTF-8: {e}")))
}
