//! Single-flight guard for test cycles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Binary "a cycle is running" flag.
///
/// `try_acquire` checks and sets atomically; a caller that gets `false`
/// must not start a cycle.
#[derive(Debug, Default)]
pub struct RunGuard {
    running: Mutex<bool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        // The flag is a plain bool; a panic while holding it cannot corrupt it.
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the flag if it is clear. Returns whether the caller now owns the run.
    pub fn try_acquire(&self) -> bool {
        let mut running = self.flag();
        if *running {
            false
        } else {
            *running = true;
            true
        }
    }

    /// Clear the flag.
    pub fn release(&self) {
        *self.flag() = false;
    }

    pub fn is_running(&self) -> bool {
        *self.flag()
    }

    /// Acquire as a permit that releases the guard when dropped.
    pub fn acquire(self: &Arc<Self>) -> Option<RunPermit> {
        self.try_acquire().then(|| RunPermit {
            guard: Arc::clone(self),
        })
    }
}

/// Ownership of the running cycle; releases the guard on drop.
#[derive(Debug)]
pub struct RunPermit {
    guard: Arc<RunGuard>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard.release();
    }
}
