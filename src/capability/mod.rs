//! # Capability Probe
//!
//! Decides, once per index type, which optional operations it supports and
//! routes calls accordingly.
//!
//! A [`CapabilitySet`] is a `const` bit set attached to every index type via
//! [`IndexUnderTest::CAPABILITIES`]. [`CapabilityProbe`] wraps an index and a
//! dataset-independent view of the value kinds; each adapter either forwards
//! to the index (computing encoded lengths) or answers
//! [`OpOutcome::Unsupported`] without touching it.

#[cfg(test)]
mod tests;

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::data::DataKind;
use crate::index::{
    BulkEntry, Epoch, EpochManager, IndexUnderTest, SUCCESS, ScanBound, ScanIter, ScanView,
    StatusCode,
};

/// Guard type of the epoch manager behind index `I`.
pub type GuardOf<K, V, I> =
    <<I as IndexUnderTest<<K as DataKind>::Data, <V as DataKind>::Data>>::Epochs as EpochManager>::Guard;

// ------------------------------------------------------------------------------------------------
// Operations
// ------------------------------------------------------------------------------------------------

/// Every operation the harness issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Insert,
    Update,
    Delete,
    Scan,
    SnapshotRead,
    Bulkload,
}

impl Operation {
    const fn bit(self) -> u8 {
        match self {
            Operation::Read => 0,
            Operation::Write => 1 << 0,
            Operation::Insert => 1 << 1,
            Operation::Update => 1 << 2,
            Operation::Delete => 1 << 3,
            Operation::Scan => 1 << 4,
            Operation::SnapshotRead => 1 << 5,
            Operation::Bulkload => 1 << 6,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Scan => "scan",
            Operation::SnapshotRead => "snapshot read",
            Operation::Bulkload => "bulkload",
        };
        f.write_str(name)
    }
}

// ------------------------------------------------------------------------------------------------
// Capability set
// ------------------------------------------------------------------------------------------------

/// The optional operations an index implements. `Read` is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// Read-only index.
    pub const NONE: Self = Self(0);

    /// Every optional operation.
    pub const ALL: Self = Self::NONE
        .with(Operation::Write)
        .with(Operation::Insert)
        .with(Operation::Update)
        .with(Operation::Delete)
        .with(Operation::Scan)
        .with(Operation::SnapshotRead)
        .with(Operation::Bulkload);

    pub const fn with(self, op: Operation) -> Self {
        Self(self.0 | op.bit())
    }

    pub const fn without(self, op: Operation) -> Self {
        Self(self.0 & !op.bit())
    }

    pub const fn supports(self, op: Operation) -> bool {
        self.0 & op.bit() == op.bit()
    }

    /// Returns the first operation of `required` that is missing.
    pub fn first_missing(self, required: &[Operation]) -> Option<Operation> {
        required.iter().copied().find(|op| !self.supports(*op))
    }
}

// ------------------------------------------------------------------------------------------------
// Operation outcome
// ------------------------------------------------------------------------------------------------

/// Result of issuing an operation through the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    /// The index does not implement the operation; nothing was issued.
    Unsupported,
    Succeeded,
    Failed(StatusCode),
}

impl OpOutcome {
    pub fn from_status(rc: StatusCode) -> Self {
        if rc == SUCCESS {
            OpOutcome::Succeeded
        } else {
            OpOutcome::Failed(rc)
        }
    }

    /// Whether the outcome agrees with an expected success or failure.
    /// Unsupported operations agree with either.
    pub fn matches(self, expect_success: bool) -> bool {
        match self {
            OpOutcome::Unsupported => true,
            OpOutcome::Succeeded => expect_success,
            OpOutcome::Failed(_) => !expect_success,
        }
    }

    /// Status code as the index would have reported it; `0` when unsupported.
    pub fn code(self) -> StatusCode {
        match self {
            OpOutcome::Unsupported | OpOutcome::Succeeded => SUCCESS,
            OpOutcome::Failed(rc) => rc,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Probe
// ------------------------------------------------------------------------------------------------

/// Routes operations to an index according to its capability set.
pub struct CapabilityProbe<'i, K, V, I> {
    index: &'i I,
    kinds: PhantomData<fn() -> (K, V)>,
}

impl<'i, K, V, I> CapabilityProbe<'i, K, V, I>
where
    K: DataKind,
    V: DataKind,
    I: IndexUnderTest<K::Data, V::Data>,
{
    pub fn new(index: &'i I) -> Self {
        Self {
            index,
            kinds: PhantomData,
        }
    }

    pub fn supports(op: Operation) -> bool {
        I::CAPABILITIES.supports(op)
    }

    pub fn write(&self, key: &K::Data, payload: &V::Data) -> OpOutcome {
        if !Self::supports(Operation::Write) {
            return OpOutcome::Unsupported;
        }
        let rc = self
            .index
            .write(key, payload, K::encoded_len(key), V::encoded_len(payload));
        trace!(rc, "write issued");
        OpOutcome::from_status(rc)
    }

    pub fn insert(&self, key: &K::Data, payload: &V::Data) -> OpOutcome {
        if !Self::supports(Operation::Insert) {
            return OpOutcome::Unsupported;
        }
        let rc = self
            .index
            .insert(key, payload, K::encoded_len(key), V::encoded_len(payload));
        trace!(rc, "insert issued");
        OpOutcome::from_status(rc)
    }

    pub fn update(&self, key: &K::Data, payload: &V::Data) -> OpOutcome {
        if !Self::supports(Operation::Update) {
            return OpOutcome::Unsupported;
        }
        let rc = self
            .index
            .update(key, payload, K::encoded_len(key), V::encoded_len(payload));
        trace!(rc, "update issued");
        OpOutcome::from_status(rc)
    }

    pub fn delete(&self, key: &K::Data) -> OpOutcome {
        if !Self::supports(Operation::Delete) {
            return OpOutcome::Unsupported;
        }
        let rc = self.index.delete(key, K::encoded_len(key));
        trace!(rc, "delete issued");
        OpOutcome::from_status(rc)
    }

    /// Issues the mutating operation `op`. `payload` is ignored by deletes;
    /// non-mutating operations answer [`OpOutcome::Unsupported`].
    pub fn mutate(&self, op: Operation, key: &K::Data, payload: &V::Data) -> OpOutcome {
        match op {
            Operation::Write => self.write(key, payload),
            Operation::Insert => self.insert(key, payload),
            Operation::Update => self.update(key, payload),
            Operation::Delete => self.delete(key),
            Operation::Read | Operation::Scan | Operation::SnapshotRead | Operation::Bulkload => {
                OpOutcome::Unsupported
            }
        }
    }

    pub fn read(&self, key: &K::Data) -> Option<V::Data> {
        self.index.read(key, K::encoded_len(key))
    }

    /// Scans `[begin, end]`; each bound is a key and whether it is closed.
    /// Returns `None` when the index cannot scan.
    pub fn scan(
        &self,
        view: ScanView<'_, GuardOf<K, V, I>>,
        begin: Option<(&K::Data, bool)>,
        end: Option<(&K::Data, bool)>,
    ) -> Option<ScanIter<'i, K::Data, V::Data>> {
        if !Self::supports(Operation::Scan) {
            return None;
        }
        Some(self.index.scan(
            view,
            begin.map(scan_bound::<K>),
            end.map(scan_bound::<K>),
        ))
    }

    /// Reads `key` as of the head of `protected`. Returns `None` both for a
    /// missing record and when the index has no snapshots; callers check
    /// [`Operation::SnapshotRead`] first.
    pub fn snapshot_read(
        &self,
        key: &K::Data,
        guard: &GuardOf<K, V, I>,
        protected: &[Epoch],
    ) -> Option<V::Data> {
        if !Self::supports(Operation::SnapshotRead) {
            return None;
        }
        self.index
            .snapshot_read(key, guard, protected, K::encoded_len(key))
    }

    /// Bulk loads `(key, payload)` pairs, attaching encoded lengths.
    pub fn bulkload<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a K::Data, &'a V::Data)>,
        thread_hint: usize,
    ) -> OpOutcome {
        if !Self::supports(Operation::Bulkload) {
            return OpOutcome::Unsupported;
        }
        let entries: Vec<_> = entries
            .into_iter()
            .map(|(key, payload)| BulkEntry {
                key: key.clone(),
                payload: payload.clone(),
                key_len: K::encoded_len(key),
                pay_len: V::encoded_len(payload),
            })
            .collect();
        trace!(entries = entries.len(), thread_hint, "bulkload issued");
        OpOutcome::from_status(self.index.bulkload(entries, thread_hint))
    }
}

/// Attaches the encoded length to a `(key, closed)` scan bound.
fn scan_bound<D: DataKind>((key, closed): (&D::Data, bool)) -> ScanBound<'_, D::Data> {
    ScanBound {
        key,
        key_len: D::encoded_len(key),
        closed,
    }
}
