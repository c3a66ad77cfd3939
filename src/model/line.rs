//! A single qualifying line taken from a log file.

use std::sync::Arc;

/// One line of a log file, tagged with where it came from.
///
/// The file name is shared between all lines of the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Path of the log file as given on the command line.
    pub source_file: Arc<str>,
    /// 1-based line number inside the (decompressed) file.
    pub line_number: u32,
    /// Raw line content without the trailing newline.
    pub content: String,
}

impl LogLine {
    pub fn new(source_file: Arc<str>, line_number: u32, content: impl Into<String>) -> Self {
        Self {
            source_file,
            line_number,
            content: content.into(),
        }
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}
