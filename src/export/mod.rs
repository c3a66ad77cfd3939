//! Report rendering (CSV, JSON) and output writing.

pub mod csv;
pub mod json;
pub mod output;
