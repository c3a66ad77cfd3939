//! Write the rendered report to stdout or a file, optionally gzip-compressed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::{Compression, GzBuilder};
use tracing::info;

use crate::error::{Result, TallyError};

/// Identifier written into the gzip header comment.
pub const TOOL_ID: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Where and how the report is written.
#[derive(Debug, Clone, Copy)]
pub enum OutputTarget<'a> {
    Stdout,
    File(&'a Path),
    /// Gzip file with the given compression level (0-9).
    Gzip(&'a Path, u32),
}

/// Write `content` to `target`.
pub fn write_report(target: OutputTarget<'_>, content: &str) -> Result<()> {
    match target {
        OutputTarget::Stdout => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(content.as_bytes())
                .and_then(|_| lock.flush())
                .map_err(|e| TallyError::io("<stdout>", e))
        }
        OutputTarget::File(path) => write_plain(path, content),
        OutputTarget::Gzip(path, level) => write_gzip(path, content, level),
    }
}

fn write_plain(path: &Path, content: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| TallyError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(content.as_bytes())
        .map_err(|e| TallyError::io(path, e))?;
    writer.flush().map_err(|e| TallyError::io(path, e))?;
    info!(path = %path.display(), bytes = content.len(), "Report written");
    Ok(())
}

fn write_gzip(path: &Path, content: &str, level: u32) -> Result<()> {
    let file = File::create(path).map_err(|e| TallyError::io(path, e))?;
    let mtime = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
    let mut encoder = GzBuilder::new()
        .mtime(mtime)
        .comment(format!("created with {TOOL_ID}"))
        .write(BufWriter::new(file), Compression::new(level.min(9)));
    encoder
        .write_all(content.as_bytes())
        .map_err(|e| TallyError::io(path, e))?;
    let mut inner = encoder.finish().map_err(|e| TallyError::io(path, e))?;
    inner.flush().map_err(|e| TallyError::io(path, e))?;
    info!(path = %path.display(), bytes = content.len(), level, "Compressed report written");
    Ok(())
}
