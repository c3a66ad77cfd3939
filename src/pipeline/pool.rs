//! Bounded worker pool turning queued log lines into mail records.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::model::line::LogLine;
use crate::model::record::MailRecord;
use crate::parser::extract::RecordExtractor;
use crate::queue::{LineBatchQueue, RecordBatchQueue};

use super::semaphore::Semaphore;

/// Lower bound on concurrent batches.
pub const MIN_WORKERS: usize = 2;

/// Default number of lines per batch.
pub const DEFAULT_BATCH_SIZE: usize = 512;

/// Number of concurrent batches for a machine with `cpus` CPUs.
///
/// `cpus - spare`, never more than `cpus` and never below [`MIN_WORKERS`].
/// An explicit count bypasses the CPU arithmetic but is still clamped.
pub fn worker_count(cpus: usize, spare: usize, explicit: Option<usize>) -> usize {
    explicit
        .unwrap_or_else(|| cpus.saturating_sub(spare).min(cpus))
        .max(MIN_WORKERS)
}

/// Counters collected over one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Concurrency bound used for the run.
    pub workers: usize,
    /// Batches dispatched.
    pub batches: u64,
    /// Lines processed.
    pub lines: u64,
    /// Records pushed to the record queue.
    pub extracted: u64,
    /// Lines skipped because extraction failed.
    pub failed: u64,
}

/// Runs extraction over a [`LineBatchQueue`] with at most `workers` batches in flight.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    batch_size: usize,
}

impl WorkerPool {
    /// `workers` is clamped to [`MIN_WORKERS`], `batch_size` to at least 1.
    pub fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            workers: workers.max(MIN_WORKERS),
            batch_size: batch_size.max(1),
        }
    }

    /// Size the pool from the CPUs of this machine, keeping `spare` free.
    pub fn for_this_machine(spare: usize, batch_size: usize) -> Self {
        Self::new(worker_count(num_cpus::get(), spare, None), batch_size)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Drain `lines` through `extractor` into `records`.
    ///
    /// Every batch runs on its own scoped thread holding one semaphore slot.
    /// Returns only after all workers have finished (saturate-then-drain
    /// barrier), so `records` is complete when this returns.
    ///
    /// `progress` receives `(lines_done, lines_total)` after each batch.
    pub fn run(
        &self,
        lines: &LineBatchQueue,
        records: &RecordBatchQueue,
        extractor: &RecordExtractor,
        progress: Option<&(dyn Fn(u64, u64) + Sync)>,
    ) -> PoolStats {
        let total = lines.len() as u64;
        let semaphore = Semaphore::new(self.workers);
        let done = AtomicU64::new(0);
        let extracted = AtomicU64::new(0);
        let failed = AtomicU64::new(0);
        let mut batches: u64 = 0;

        info!(
            workers = self.workers,
            batch_size = self.batch_size,
            lines = total,
            "Starting extraction"
        );

        std::thread::scope(|scope| {
            loop {
                let permit = semaphore.acquire();
                let Ok(batch) = lines.pop_batch(self.batch_size) else {
                    break;
                };
                batches += 1;

                let (done, extracted, failed) = (&done, &extracted, &failed);
                scope.spawn(move || {
                    let _permit = permit;
                    let batch_len = batch.len() as u64;
                    let (ok, bad) = process_batch(extractor, batch);
                    extracted.fetch_add(ok.len() as u64, Ordering::Relaxed);
                    failed.fetch_add(bad, Ordering::Relaxed);
                    records.push_slice(ok);

                    let now = done.fetch_add(batch_len, Ordering::Relaxed) + batch_len;
                    if let Some(cb) = progress {
                        cb(now, total);
                    }
                });
            }
            semaphore.wait_idle();
        });

        let stats = PoolStats {
            workers: self.workers,
            batches,
            lines: done.into_inner(),
            extracted: extracted.into_inner(),
            failed: failed.into_inner(),
        };
        info!(
            batches = stats.batches,
            extracted = stats.extracted,
            failed = stats.failed,
            "Extraction finished"
        );
        stats
    }
}

/// Extract every line of a batch independently.
///
/// A failing line is logged and skipped; it never affects its siblings.
/// Returns the successful records and the number of failures.
pub fn process_batch(extractor: &RecordExtractor, batch: Vec<LogLine>) -> (Vec<MailRecord>, u64) {
    let mut records = Vec::with_capacity(batch.len());
    let mut failed: u64 = 0;

    for line in &batch {
        match extractor.extract_line(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    file = %line.source_file,
                    line = line.line_number,
                    reason = e.reason(),
                    "Skipping mail: {e}"
                );
                failed += 1;
            }
        }
    }

    debug!(ok = records.len(), failed, "Batch done");
    (records, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::address::HostClassifier;

    fn passed(i: usize) -> String {
        format!(
            r#"2024:01:02-03:04:{:02} gw smtpd[1]: id="1000" name="email passed" from="user{i}@example.com" to="peer@example.org" subject="s{i}" size="{i}" queueid="Q{i}""#,
            i % 60
        )
    }

    fn log_lines(contents: impl IntoIterator<Item = String>) -> Vec<LogLine> {
        let source: Arc<str> = Arc::from("pool.log");
        contents
            .into_iter()
            .enumerate()
            .map(|(i, c)| LogLine::new(Arc::clone(&source), i as u32 + 1, c))
            .collect()
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(16, 2, None), 14);
        assert_eq!(worker_count(4, 2, None), 2);
        assert_eq!(worker_count(2, 2, None), MIN_WORKERS);
        assert_eq!(worker_count(1, 0, None), MIN_WORKERS);
        assert_eq!(worker_count(8, 20, None), MIN_WORKERS);
        assert_eq!(worker_count(8, 2, Some(3)), 3);
        assert_eq!(worker_count(8, 2, Some(0)), MIN_WORKERS);
    }

    #[test]
    fn test_pool_clamps_settings() {
        let pool = WorkerPool::new(0, 0);
        assert_eq!(pool.workers(), MIN_WORKERS);
        assert_eq!(pool.batch_size(), 1);
    }

    #[test]
    fn test_failure_in_batch_does_not_abort_siblings() {
        // Line 5 of 10 is malformed: the other 9 must survive.
        let mut contents: Vec<String> = (0..10).map(passed).collect();
        contents[4] = contents[4].replace("user4@example.com", "not an address");
        let (records, failed) = process_batch(&RecordExtractor::default(), log_lines(contents));
        assert_eq!(records.len(), 9);
        assert_eq!(failed, 1);
        assert!(records.iter().any(|r| r.from == "user9@example.com"));
    }

    #[test]
    fn test_run_extracts_everything() {
        let lines = LineBatchQueue::new();
        let mut contents: Vec<String> = (0..1000).map(passed).collect();
        contents[17] = contents[17].replace(r#" subject="s17""#, "");
        contents[500] = contents[500].replace(r#"to="peer@example.org""#, r#"to="""#);
        lines.push_slice(log_lines(contents));

        let records = RecordBatchQueue::new();
        let progress_calls = AtomicU64::new(0);
        let on_progress = |_done: u64, total: u64| {
            assert_eq!(total, 1000);
            progress_calls.fetch_add(1, Ordering::Relaxed);
        };
        let pool = WorkerPool::new(4, 64);
        let stats = pool.run(&lines, &records, &RecordExtractor::default(), Some(&on_progress));

        assert!(lines.is_empty());
        assert_eq!(stats.lines, 1000);
        assert_eq!(stats.extracted, 998);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.batches, 16);
        assert_eq!(records.len(), 998);
        assert_eq!(progress_calls.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn test_run_on_empty_queue() {
        let stats = WorkerPool::new(2, 8).run(
            &LineBatchQueue::new(),
            &RecordBatchQueue::new(),
            &RecordExtractor::new(HostClassifier::default(), true),
            None,
        );
        assert_eq!(stats.batches, 0);
        assert_eq!(stats.extracted, 0);
    }
}
