use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Non-reentrant guard ensuring at most one run is active per process.
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    active: Arc<AtomicBool>,
}

/// Held for the duration of a run. Dropping it releases the lock, whether the
/// run finished, failed or panicked.
#[derive(Debug)]
pub struct RunToken {
    active: Arc<AtomicBool>,
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if a run is already active. Never waits.
    pub fn try_acquire(&self) -> Option<RunToken> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunToken {
                active: self.active.clone(),
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
