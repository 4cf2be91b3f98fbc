//! The in-process writer lease: exactly one logical writer at a time, with
//! many concurrent readers.
//!
//! Serializes commits with a `parking_lot::Mutex`. Wax has no branches and
//! no MVCC, so this is a single global mutex rather than a per-branch map;
//! the token it returns stands in for "the writer lease is held" for the
//! lifetime of a commit.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use wax_core::{WaxError, WaxResult};

/// How a would-be writer should behave when the lease is already held.
#[derive(Debug, Clone, Copy)]
pub enum LeasePolicy {
    /// Block until the lease is available.
    Wait,
    /// Return `lock_unavailable` immediately if the lease is held.
    Fail,
    /// Block up to `Duration`, then return `lock_unavailable`.
    Timeout(Duration),
}

/// The single global writer lease. Held for the duration of a mutating
/// operation (ingest, commit, index stage); readers never acquire it.
pub struct WriterLease {
    inner: Mutex<()>,
}

impl Default for WriterLease {
    fn default() -> Self {
        WriterLease::new()
    }
}

impl WriterLease {
    pub fn new() -> Self {
        WriterLease { inner: Mutex::new(()) }
    }

    /// Acquire the lease per `policy`, returning a guard token that releases
    /// it on drop.
    pub fn acquire(&self, policy: LeasePolicy) -> WaxResult<WriterLeaseGuard<'_>> {
        let guard = match policy {
            LeasePolicy::Wait => self.inner.lock(),
            LeasePolicy::Fail => self
                .inner
                .try_lock()
                .ok_or_else(|| WaxError::lock_unavailable("writer lease held by another task"))?,
            LeasePolicy::Timeout(duration) => self
                .inner
                .try_lock_for(duration)
                .ok_or_else(|| WaxError::lock_unavailable("writer lease acquisition timed out"))?,
        };
        Ok(WriterLeaseGuard { _guard: guard })
    }
}

/// Proof of holding the writer lease. The writer must hold one of these for
/// the full duration of a mutating operation.
pub struct WriterLeaseGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}
