//! Read log files (plain or gzip) and queue the lines that pass the filter.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use tracing::{debug, info};

use crate::error::{Result, TallyError};
use crate::model::line::LogLine;
use crate::queue::LineBatchQueue;

use super::filter::is_delivery_event;

/// Size of the read buffer (1 MB for fast sequential reads).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Per-file scan counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines read from the file.
    pub lines_read: u64,
    /// Lines that passed the delivery filter and were queued.
    pub lines_accepted: u64,
}

/// Whether a path is treated as gzip-compressed (by suffix).
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Open a log file, transparently decompressing `.gz` files.
pub fn open_log(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TallyError::FileNotFound(path.to_path_buf())
        } else {
            TallyError::io(path, e)
        }
    })?;

    let reader: Box<dyn Read> = if is_gzip_path(path) {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, reader)))
}

/// Scan one file and push every qualifying line to `queue` in a single call.
///
/// Lines are numbered from 1. Invalid UTF-8 is replaced rather than rejected.
pub fn scan_file(path: &Path, queue: &LineBatchQueue) -> Result<ScanStats> {
    let reader = open_log(path)?;
    let source: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
    let (lines, stats) = collect_lines(reader, &source).map_err(|e| TallyError::io(path, e))?;

    queue.push_slice(lines);
    info!(
        path = %path.display(),
        read = stats.lines_read,
        accepted = stats.lines_accepted,
        "Scanned log file"
    );
    Ok(stats)
}

/// Read all lines from `reader`, keeping those that pass the filter.
pub fn collect_lines(
    mut reader: impl BufRead,
    source: &Arc<str>,
) -> std::io::Result<(Vec<LogLine>, ScanStats)> {
    let mut lines = Vec::new();
    let mut stats = ScanStats::default();
    let mut line_no: u32 = 0;

    // Reusable buffer, avoids allocation per line
    let mut buf: Vec<u8> = Vec::with_capacity(4096);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no = line_no.saturating_add(1);
        stats.lines_read += 1;

        let text = String::from_utf8_lossy(trim_newline(&buf));
        if !is_delivery_event(&text) {
            continue;
        }
        lines.push(LogLine::new(Arc::clone(source), line_no, text.into_owned()));
        stats.lines_accepted += 1;
    }

    debug!(source = %source, accepted = stats.lines_accepted, "Collected lines");
    Ok((lines, stats))
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
