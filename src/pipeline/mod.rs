//! The extraction-and-aggregation pipeline.
//!
//! ```text
//! files ─▶ scan/filter ─▶ LineBatchQueue ─▶ [N workers: extract] ─▶ RecordBatchQueue
//!                                                  │ barrier
//!                                                  ▼
//!                                   PartnerAggregator ─▶ AggregateReport
//! ```

pub mod aggregate;
pub mod pool;
pub mod semaphore;

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use tracing::{info, warn};

use crate::model::report::AggregateReport;
use crate::parser::extract::RecordExtractor;
use crate::parser::scan;
use crate::queue::{LineBatchQueue, RecordBatchQueue};

use aggregate::PartnerAggregator;
use pool::{PoolStats, WorkerPool};

/// Totals of the scanning stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub files_ok: usize,
    pub files_failed: usize,
    pub lines_read: u64,
    pub lines_accepted: u64,
}

/// Totals of a complete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub scan: ScanSummary,
    pub pool: PoolStats,
    pub partners: usize,
}

/// Wires the stages together for one run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    extractor: RecordExtractor,
    pool: WorkerPool,
}

impl Pipeline {
    pub fn new(extractor: RecordExtractor, pool: WorkerPool) -> Self {
        Self { extractor, pool }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Scan every file sequentially into `lines`.
    ///
    /// A file that cannot be read is logged and skipped; the others are still scanned.
    /// `progress` receives `(files_done, files_total)`.
    pub fn scan_files(
        &self,
        paths: &[PathBuf],
        lines: &LineBatchQueue,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> ScanSummary {
        let mut summary = ScanSummary::default();
        for (i, path) in paths.iter().enumerate() {
            match scan::scan_file(path, lines) {
                Ok(stats) => {
                    summary.files_ok += 1;
                    summary.lines_read += stats.lines_read;
                    summary.lines_accepted += stats.lines_accepted;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping log file");
                    summary.files_failed += 1;
                }
            }
            if let Some(cb) = progress {
                cb(i + 1, paths.len());
            }
        }
        summary
    }

    /// Run the worker pool over `lines`, filling `records`. Blocks until all workers are done.
    pub fn extract(
        &self,
        lines: &LineBatchQueue,
        records: &RecordBatchQueue,
        progress: Option<&(dyn Fn(u64, u64) + Sync)>,
    ) -> PoolStats {
        self.pool.run(lines, records, &self.extractor, progress)
    }

    /// Fold every buffered record into a finished report.
    pub fn aggregate(
        &self,
        records: &RecordBatchQueue,
        created_at: DateTime<FixedOffset>,
    ) -> AggregateReport {
        let mut aggregator = PartnerAggregator::new(self.extractor.classifier().clone());
        aggregator.drain(records);
        aggregator.finish(created_at)
    }

    /// All stages in order, without progress reporting.
    pub fn run(
        &self,
        paths: &[PathBuf],
        created_at: DateTime<FixedOffset>,
    ) -> (AggregateReport, RunStats) {
        let lines = LineBatchQueue::new();
        let records = RecordBatchQueue::new();

        let scan = self.scan_files(paths, &lines, None);
        let pool = self.extract(&lines, &records, None);
        let report = self.aggregate(&records, created_at);

        let stats = RunStats {
            scan,
            pool,
            partners: report.partner_count(),
        };
        info!(
            files = scan.files_ok,
            records = pool.extracted,
            partners = stats.partners,
            "Run complete"
        );
        (report, stats)
    }
}
