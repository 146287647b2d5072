//! Connection Registry
//!
//! Each worker owns exactly one registry entry: a claim-once guard that is
//! set while the worker holds its buffer. The worker keeps the buffer itself
//! for I/O; the entry only decides which cleanup path gets to release it.
//! The worker's own close and the abnormal-termination path both race on
//! [`ConnectionRegistry::take_and_clear`], and only the call that flips the
//! guard wins.
//!
//! Every operation is a single atomic swap or load, so the entry can be
//! queried from any task while the worker is suspended in a read or write.
//!
//! An entry is only reachable through the worker that created it and the
//! termination handler built from it. No worker can see another's slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The per-worker claim on the currently owned buffer.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    claimed: Arc<AtomicBool>,
}

impl ConnectionRegistry {
    /// Creates an unclaimed entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the entry as holding a buffer.
    ///
    /// Returns `true` if it was already claimed.
    pub fn claim(&self) -> bool {
        self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Atomically reads and clears the entry.
    ///
    /// Returns `true` only for the one call that found it claimed; that
    /// caller owns the release.
    pub fn take_and_clear(&self) -> bool {
        self.claimed.swap(false, Ordering::AcqRel)
    }

    /// Returns `true` while a buffer is associated.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
