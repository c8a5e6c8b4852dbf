//! Collaborator contracts consumed by the harness.
//!
//! The harness never looks inside an index. It only needs:
//!
//! - [`IndexUnderTest`]: the point and range operations of a key-value index,
//!   together with the [`CapabilitySet`] describing which of the optional ones
//!   are implemented.
//! - [`EpochManager`]: the public face of the index's epoch-based reclamation
//!   scheme: advancing the global epoch, pinning the current epoch with a
//!   guard, and reporting the set of protected epochs a snapshot must honour.
//!
//! Status codes follow the usual C convention: `0` is success, anything else
//! is a failure whose reason is private to the index.

use std::sync::Arc;
use std::time::Duration;

use crate::capability::CapabilitySet;

/// Raw status code returned by mutating index operations.
pub type StatusCode = i32;

/// The status code every index returns on success.
pub const SUCCESS: StatusCode = 0;

/// Returned by the default bodies of optional operations.
pub const NOT_IMPLEMENTED: StatusCode = -1;

/// A logical epoch number.
pub type Epoch = u64;

// ------------------------------------------------------------------------------------------------
// Epoch manager
// ------------------------------------------------------------------------------------------------

/// Epoch-based reclamation, as seen from outside the index.
pub trait EpochManager: Default + Send + Sync + 'static {
    /// Keeps an epoch protected for as long as it is alive.
    type Guard: Send + Sync;

    /// Advances the global epoch by one.
    fn forward_global_epoch(&self);

    /// Pins the current epoch and returns the protected epochs in descending
    /// order: the current epoch, the one before it, then the epochs of every
    /// other live guard.
    fn protected_epochs(&self) -> (Self::Guard, Vec<Epoch>);

    /// Pins the current epoch.
    fn create_guard(&self) -> Self::Guard;
}

// ------------------------------------------------------------------------------------------------
// Scan arguments
// ------------------------------------------------------------------------------------------------

/// One end of a scan range.
#[derive(Debug)]
pub struct ScanBound<'a, K> {
    pub key: &'a K,
    pub key_len: usize,
    /// Whether the bound itself belongs to the range.
    pub closed: bool,
}

impl<'a, K> ScanBound<'a, K> {
    pub fn closed(key: &'a K, key_len: usize) -> Self {
        Self {
            key,
            key_len,
            closed: true,
        }
    }

    pub fn open(key: &'a K, key_len: usize) -> Self {
        Self {
            key,
            key_len,
            closed: false,
        }
    }
}

/// Which version of the index a scan observes.
pub enum ScanView<'a, G> {
    /// The latest committed state, without any epoch protection.
    Latest,

    /// The latest committed state, with the scan pinned by `guard` so that
    /// nodes it walks through cannot be reclaimed.
    Guarded(&'a G),

    /// The state as of the head of `protected`.
    Snapshot { guard: &'a G, protected: &'a [Epoch] },
}

/// One entry of a bulk load.
#[derive(Debug, Clone)]
pub struct BulkEntry<K, V> {
    pub key: K,
    pub payload: V,
    pub key_len: usize,
    pub pay_len: usize,
}

/// Lazily produced `(key, payload)` pairs in ascending key order.
pub type ScanIter<'a, K, V> = Box<dyn Iterator<Item = (K, V)> + 'a>;

// ------------------------------------------------------------------------------------------------
// Index under test
// ------------------------------------------------------------------------------------------------

/// A concurrent key-value index driven by the harness.
///
/// `read` is mandatory. Every other operation has a default body returning
/// [`NOT_IMPLEMENTED`] (or nothing); an implementation overrides the ones it
/// supports and lists them in [`IndexUnderTest::CAPABILITIES`]. The harness
/// only calls operations present in the capability set.
pub trait IndexUnderTest<K: 'static, V: 'static>: Send + Sync + Sized {
    /// The epoch manager this index reclaims memory with.
    type Epochs: EpochManager;

    /// Optional operations this index implements.
    const CAPABILITIES: CapabilitySet;

    /// Builds an empty index sharing `epochs`, advancing epochs every
    /// `epoch_interval` if the index runs its own epoch thread.
    fn open(epochs: Arc<Self::Epochs>, epoch_interval: Duration) -> Self;

    /// Returns the latest payload of `key`, if any.
    fn read(&self, key: &K, key_len: usize) -> Option<V>;

    /// Upserts `key`.
    fn write(&self, _key: &K, _payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        NOT_IMPLEMENTED
    }

    /// Adds `key`; fails if it is already live.
    fn insert(&self, _key: &K, _payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        NOT_IMPLEMENTED
    }

    /// Replaces the payload of `key`; fails if it is not live.
    fn update(&self, _key: &K, _payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        NOT_IMPLEMENTED
    }

    /// Removes `key`; fails if it is not live.
    fn delete(&self, _key: &K, _key_len: usize) -> StatusCode {
        NOT_IMPLEMENTED
    }

    /// Iterates `[begin, end]` (bounds honour their `closed` flag; `None` is
    /// unbounded) in ascending key order.
    fn scan<'s>(
        &'s self,
        _view: ScanView<'_, <Self::Epochs as EpochManager>::Guard>,
        _begin: Option<ScanBound<'_, K>>,
        _end: Option<ScanBound<'_, K>>,
    ) -> ScanIter<'s, K, V> {
        Box::new(std::iter::empty())
    }

    /// Reads `key` as of the head of `protected`.
    fn snapshot_read(
        &self,
        _key: &K,
        _guard: &<Self::Epochs as EpochManager>::Guard,
        _protected: &[Epoch],
        _key_len: usize,
    ) -> Option<V> {
        None
    }

    /// Loads `entries` (sorted by key) into an empty key range, building with
    /// up to `thread_hint` threads.
    fn bulkload(&self, _entries: Vec<BulkEntry<K, V>>, _thread_hint: usize) -> StatusCode {
        NOT_IMPLEMENTED
    }
}
