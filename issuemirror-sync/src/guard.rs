//! Single-slot admission for sync passes.
//!
//! Every trigger (startup, timer, socket request, CLI) calls
//! [`SyncGuard::try_begin`] and runs its pass only if it receives a
//! [`SyncPermit`]. A trigger that arrives while a permit is alive is
//! rejected, not queued. Dropping the permit frees the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "a pass is running" flag. Cheap to clone; clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct SyncGuard {
    running: Arc<AtomicBool>,
}

/// Proof that the holder owns the slot. Releases it on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct SyncPermit {
    running: Arc<AtomicBool>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a pass is already running.
    pub fn try_begin(&self) -> Option<SyncPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_syncing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
