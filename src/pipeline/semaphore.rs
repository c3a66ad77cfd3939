//! Counting semaphore bounding the number of in-flight batches.

use std::sync::{Condvar, Mutex, MutexGuard};

/// A counting semaphore with RAII permits.
///
/// [`wait_idle`](Semaphore::wait_idle) doubles as the barrier after
/// dispatch: it can only return once every outstanding permit is back.
#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    available: Mutex<usize>,
    released: Condvar,
}

/// A held slot. Dropping it (also during unwinding) returns the slot.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    /// Create a semaphore with `capacity` slots (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            available: Mutex::new(capacity),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> Permit<'_> {
        let guard = self.lock();
        let mut available = self
            .released
            .wait_while(guard, |n| *n == 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *available -= 1;
        Permit { semaphore: self }
    }

    /// Block until no permit is outstanding.
    ///
    /// Saturates the semaphore by taking every slot, then releases them all.
    pub fn wait_idle(&self) {
        let permits: Vec<Permit<'_>> = (0..self.capacity).map(|_| self.acquire()).collect();
        drop(permits);
    }

    fn release(&self) {
        let mut available = self.lock();
        *available += 1;
        drop(available);
        self.released.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
