//! Ordered multi-version reference index.
//!
//! Every key maps to its versions in ascending epoch order. A version is
//! either a payload or a tombstone and is stamped with the global epoch at the
//! time it was written.
//!
//! ## Visibility
//!
//! - Point reads and unguarded / guarded scans see the newest version.
//! - Snapshot reads and snapshot scans see, per key, the newest version whose
//!   epoch is strictly below the head of the protected epoch list.
//!
//! ## Pruning
//!
//! After every mutation of a key, versions that no snapshot can reach are
//! dropped: everything older than the newest version below the clock's
//! horizon.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, trace};

use super::epoch::{EpochClock, EpochGuard};
use super::{KEY_EXISTS, KEY_NOT_EXIST, NOT_SORTED};
use crate::capability::CapabilitySet;
use crate::index::{BulkEntry, Epoch, IndexUnderTest, SUCCESS, ScanBound, ScanIter, ScanView, StatusCode};

/// One version of a key. `None` is a tombstone.
#[derive(Debug, Clone)]
struct Version<V> {
    epoch: Epoch,
    payload: Option<V>,
}

/// A B-tree map of versioned records behind a reader-writer lock.
pub struct VersionedIndex<K, V> {
    epochs: Arc<EpochClock>,
    tree: RwLock<BTreeMap<K, Vec<Version<V>>>>,
}

impl<K, V> VersionedIndex<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(epochs: Arc<EpochClock>) -> Self {
        Self {
            epochs,
            tree: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.values().filter(|versions| latest_live(versions).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of retained versions, tombstones included.
    pub fn version_count(&self) -> usize {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.values().map(Vec::len).sum()
    }

    /// Appends a version of `key` if `admit` accepts the current latest payload.
    fn push_version(
        &self,
        key: &K,
        payload: Option<V>,
        admit: impl FnOnce(Option<&V>) -> Result<(), StatusCode>,
    ) -> StatusCode {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let versions = tree.entry(key.clone()).or_default();

        if let Err(rc) = admit(latest_live(versions)) {
            if versions.is_empty() {
                tree.remove(key);
            }
            return rc;
        }

        let epoch = self.epochs.current();
        versions.push(Version { epoch, payload });
        prune(versions, self.epochs.horizon());
        trace!(epoch, versions = versions.len(), "version appended");
        SUCCESS
    }
}

impl<K, V> IndexUnderTest<K, V> for VersionedIndex<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Epochs = EpochClock;

    const CAPABILITIES: CapabilitySet = CapabilitySet::ALL;

    fn open(epochs: Arc<EpochClock>, epoch_interval: Duration) -> Self {
        debug!(?epoch_interval, "opening versioned reference index");
        Self::new(epochs)
    }

    fn read(&self, key: &K, _key_len: usize) -> Option<V> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.get(key).and_then(|versions| latest_live(versions).cloned())
    }

    fn write(&self, key: &K, payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        self.push_version(key, Some(payload.clone()), |_| Ok(()))
    }

    fn insert(&self, key: &K, payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        self.push_version(key, Some(payload.clone()), |latest| match latest {
            Some(_) => Err(KEY_EXISTS),
            None => Ok(()),
        })
    }

    fn update(&self, key: &K, payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        self.push_version(key, Some(payload.clone()), |latest| match latest {
            Some(_) => Ok(()),
            None => Err(KEY_NOT_EXIST),
        })
    }

    fn delete(&self, key: &K, _key_len: usize) -> StatusCode {
        self.push_version(key, None, |latest| match latest {
            Some(_) => Ok(()),
            None => Err(KEY_NOT_EXIST),
        })
    }

    fn scan<'s>(
        &'s self,
        view: ScanView<'_, EpochGuard>,
        begin: Option<ScanBound<'_, K>>,
        end: Option<ScanBound<'_, K>>,
    ) -> ScanIter<'s, K, V> {
        if let (Some(b), Some(e)) = (&begin, &end) {
            if b.key > e.key || (b.key == e.key && !(b.closed && e.closed)) {
                return Box::new(std::iter::empty());
            }
        }

        let snapshot = match view {
            ScanView::Snapshot { protected, .. } => protected.first().copied(),
            ScanView::Latest | ScanView::Guarded(_) => None,
        };

        let range = (to_bound(begin), to_bound(end));
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        let records: Vec<(K, V)> = tree
            .range::<K, _>(range)
            .filter_map(|(key, versions)| {
                let visible = match snapshot {
                    Some(epoch) => visible_at(versions, epoch),
                    None => latest_live(versions),
                };
                visible.map(|payload| (key.clone(), payload.clone()))
            })
            .collect();

        trace!(records = records.len(), ?snapshot, "scan collected");
        Box::new(records.into_iter())
    }

    fn snapshot_read(
        &self,
        key: &K,
        _guard: &EpochGuard,
        protected: &[Epoch],
        _key_len: usize,
    ) -> Option<V> {
        let epoch = protected.first().copied()?;
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.get(key)
            .and_then(|versions| visible_at(versions, epoch).cloned())
    }

    fn bulkload(&self, entries: Vec<BulkEntry<K, V>>, thread_hint: usize) -> StatusCode {
        if entries.windows(2).any(|w| w[0].key >= w[1].key) {
            return NOT_SORTED;
        }

        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .iter()
            .any(|entry| tree.get(&entry.key).and_then(|v| latest_live(v)).is_some())
        {
            return KEY_EXISTS;
        }

        let epoch = self.epochs.current();
        let count = entries.len();
        for entry in entries {
            tree.entry(entry.key).or_default().push(Version {
                epoch,
                payload: Some(entry.payload),
            });
        }

        debug!(count, thread_hint, epoch, "bulkload applied");
        SUCCESS
    }
}

fn latest_live<V>(versions: &[Version<V>]) -> Option<&V> {
    versions.last().and_then(|v| v.payload.as_ref())
}

/// Newest payload written strictly before `epoch`.
fn visible_at<V>(versions: &[Version<V>], epoch: Epoch) -> Option<&V> {
    versions
        .iter()
        .rev()
        .find(|v| v.epoch < epoch)
        .and_then(|v| v.payload.as_ref())
}

/// Drops every version older than the newest one below `horizon`.
fn prune<V>(versions: &mut Vec<Version<V>>, horizon: Epoch) {
    if let Some(pos) = versions.iter().rposition(|v| v.epoch < horizon) {
        versions.drain(..pos);
    }
}

fn to_bound<'a, K>(bound: Option<ScanBound<'a, K>>) -> Bound<&'a K> {
    match bound {
        Some(b) if b.closed => Bound::Included(b.key),
        Some(b) => Bound::Excluded(b.key),
        None => Bound::Unbounded,
    }
}
