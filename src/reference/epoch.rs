//! Reference epoch manager.
//!
//! [`EpochClock`] keeps a global epoch counter and a registry of the epochs
//! pinned by live [`EpochGuard`]s. It does not reclaim anything itself; the
//! reference indexes ask it for [`EpochClock::horizon`] to decide which old
//! versions nobody can reach anymore.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::index::{Epoch, EpochManager};

/// Global epoch plus the set of pinned epochs.
#[derive(Debug)]
pub struct EpochClock {
    inner: Arc<ClockInner>,
}

#[derive(Debug)]
struct ClockInner {
    current: AtomicU64,

    /// Pinned epoch → number of live guards pinning it.
    pinned: Mutex<BTreeMap<Epoch, usize>>,
}

/// Pins one epoch until dropped.
#[derive(Debug)]
pub struct EpochGuard {
    inner: Arc<ClockInner>,
    epoch: Epoch,
}

impl EpochGuard {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

impl Drop for EpochGuard {
    fn drop(&mut self) {
        let mut pinned = self
            .inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = pinned.get_mut(&self.epoch) {
            *count -= 1;
            if *count == 0 {
                pinned.remove(&self.epoch);
            }
        }
        trace!(epoch = self.epoch, "epoch unpinned");
    }
}

impl Default for EpochClock {
    fn default() -> Self {
        Self {
            inner: Arc::new(ClockInner {
                current: AtomicU64::new(1),
                pinned: Mutex::new(BTreeMap::new()),
            }),
        }
    }
}

impl EpochClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Epoch {
        self.inner.current.load(Ordering::Acquire)
    }

    /// Oldest epoch that may still be observed: the oldest pinned epoch, or
    /// the current one when nothing is pinned.
    pub fn horizon(&self) -> Epoch {
        let pinned = self
            .inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pinned
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.current())
    }

    /// Number of live guards.
    pub fn pinned_count(&self) -> usize {
        self.inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    fn pin(&self) -> EpochGuard {
        let mut pinned = self
            .inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let epoch = self.current();
        *pinned.entry(epoch).or_insert(0) += 1;
        trace!(epoch, "epoch pinned");
        EpochGuard {
            inner: Arc::clone(&self.inner),
            epoch,
        }
    }
}

impl EpochManager for EpochClock {
    type Guard = EpochGuard;

    fn forward_global_epoch(&self) {
        let previous = self.inner.current.fetch_add(1, Ordering::AcqRel);
        trace!(epoch = previous + 1, "global epoch forwarded");
    }

    fn protected_epochs(&self) -> (EpochGuard, Vec<Epoch>) {
        let guard = self.pin();
        let current = guard.epoch;

        let mut epochs = vec![current];
        if current > 0 {
            epochs.push(current - 1);
        }

        let pinned = self
            .inner
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let older = current.saturating_sub(1);
        epochs.extend(pinned.keys().rev().copied().filter(|e| *e < older));

        (guard, epochs)
    }

    fn create_guard(&self) -> EpochGuard {
        self.pin()
    }
}
