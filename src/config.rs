//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILTALLY_CONFIG` (environment variable)
//! 2. `~/.config/mailtally/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailtally\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override whatever the file sets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::model::address::{HostClassifier, HostMatch};
use crate::pipeline::pool::DEFAULT_BATCH_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Internal/external host classification.
    pub classification: ClassificationConfig,
    /// Worker pool and extraction tuning.
    pub pipeline: PipelineConfig,
    /// Report output defaults.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory used for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Internal/external host classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Host parts considered internal.
    pub internal_hosts: Vec<String>,
    /// "exact" (default) or "suffix" (subdomains count as internal).
    pub host_match: HostMatch,
}

/// Worker pool and extraction tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CPUs to keep free for other programs.
    pub spare_cpus: usize,
    /// Explicit number of concurrent batches (overrides `spare_cpus`).
    pub workers: Option<usize>,
    /// Log lines per batch.
    pub batch_size: usize,
    /// Reject lines whose subject is present but empty.
    pub strict_subject: bool,
}

/// Report output defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default report format.
    pub format: ReportFormat,
    /// Emit the CSV header line.
    pub csv_header: bool,
    /// Gzip level (0-9) used with compressed output files.
    pub compression_level: u32,
}

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            spare_cpus: 2,
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            strict_subject: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Csv,
            csv_header: true,
            compression_level: 9,
        }
    }
}

impl ClassificationConfig {
    /// Build the classifier used by extraction and aggregation.
    pub fn classifier(&self) -> HostClassifier {
        HostClassifier::new(&self.internal_hosts, self.host_match)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found. A file that cannot
/// be read or parsed is an error; callers fall back to defaults and report it
/// once logging is up.
pub fn load_config() -> Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => read_config_file(&path),
        _ => Ok(Config::default()),
    }
}

/// Read and parse one TOML config file.
pub fn read_config_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| TallyError::io(path, e))?;
    let cfg = toml::from_str::<Config>(&contents).map_err(|e| TallyError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "Parsed config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILTALLY_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailtally").join("config.toml"))
}

/// Directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtally")
}
