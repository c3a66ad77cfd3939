//! Core data model: log lines, mail records, partner statistics, and the aggregate report.

pub mod address;
pub mod line;
pub mod partner;
pub mod record;
pub mod report;
