//! Thread-safe intermediate buffers between the pipeline stages.
//!
//! A [`BatchQueue`] is a mutex-guarded stack with a small push/pop vocabulary.
//! Lines flow through a [`LineBatchQueue`] (written per input file, drained
//! by the worker pool) and records through a [`RecordBatchQueue`] (written by
//! the workers, drained by the aggregator).

use std::sync::{Mutex, MutexGuard};

use crate::error::QueueError;
use crate::model::line::LogLine;
use crate::model::record::MailRecord;

/// Accepted raw lines awaiting extraction.
pub type LineBatchQueue = BatchQueue<LogLine>;

/// Extracted records awaiting aggregation.
pub type RecordBatchQueue = BatchQueue<MailRecord>;

/// A stack guarded by a single mutex.
///
/// No ordering is promised to consumers beyond "last pushed, first popped";
/// the pipeline never depends on it.
#[derive(Debug)]
pub struct BatchQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for BatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BatchQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Lock the buffer. A worker that panicked while holding the lock
    /// cannot leave the `Vec` half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a single element.
    pub fn push(&self, item: T) {
        self.lock().push(item);
    }

    /// Store many elements under one lock acquisition.
    pub fn push_slice(&self, items: impl IntoIterator<Item = T>) {
        self.lock().extend(items);
    }

    /// Retrieve the most recently pushed element.
    pub fn pop(&self) -> Result<T, QueueError> {
        self.lock().pop().ok_or(QueueError::Empty)
    }

    /// Retrieve up to `size` elements in one critical section.
    ///
    /// Returns fewer than `size` elements when the queue runs short.
    pub fn pop_batch(&self, size: usize) -> Result<Vec<T>, QueueError> {
        if size < 1 {
            return Err(QueueError::InvalidBatchSize(size));
        }
        let mut items = self.lock();
        if items.is_empty() {
            return Err(QueueError::Empty);
        }
        let start = items.len().saturating_sub(size);
        Ok(items.split_off(start))
    }

    /// Take every element, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
