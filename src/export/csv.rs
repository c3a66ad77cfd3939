//! Render partner statistics as CSV.

use std::fmt::Write;

use crate::model::partner::PartnerEntry;
use crate::model::report::AggregateReport;

/// Column header of the partner CSV.
pub const CSV_HEADER: &str = "type,sizeAtoB,countAtoB,partnerA,partnerB,countBtoA,sizeBtoA";

/// Render one row per partner pair, sorted by canonical key.
///
/// Every line, including the last, ends with `\n`.
pub fn render_csv(report: &AggregateReport, header: bool) -> String {
    let mut out = String::with_capacity(64 * (report.partner_count() + 1));
    if header {
        out.push_str(CSV_HEADER);
        out.push('\n');
    }
    // BTreeMap iteration is already in key order
    for entry in report.partners.values() {
        out.push_str(&csv_row(entry));
        out.push('\n');
    }
    out
}

/// A single CSV row, without line terminator.
pub fn csv_row(entry: &PartnerEntry) -> String {
    let mut row = String::new();
    // Writing to a String cannot fail
    let _ = write!(
        row,
        "{},{},{},{},{},{},{}",
        csv_escape(&entry.kind),
        entry.size_a_to_b,
        entry.mails_a_to_b,
        csv_escape(&entry.partner_a),
        csv_escape(&entry.partner_b),
        entry.mails_b_to_a,
        entry.size_b_to_a,
    );
    row
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
