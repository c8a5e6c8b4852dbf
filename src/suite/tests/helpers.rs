use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::HarnessConfig;
use crate::capability::CapabilitySet;
use crate::data::UInt8;
use crate::index::{BulkEntry, Epoch, IndexUnderTest, ScanBound, ScanIter, ScanView, StatusCode};
use crate::reference::{EpochClock, EpochGuard, VersionedIndex};
use crate::suite::IndexFixture;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times; only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Four workers with eight records each: enough to interleave, small
/// enough to keep every scenario in the millisecond range.
pub fn small_config() -> HarnessConfig {
    init_tracing();
    HarnessConfig {
        thread_count: 4,
        exec_count: 8,
        repeat_count: 2,
        thread_creation_grace: Duration::from_millis(5),
        epoch_interval: Duration::from_micros(100),
        random_seed: 10,
        sequential_max_records: 300,
    }
}

/// Same as [`small_config`] with `thread_count` workers.
pub fn config_with_threads(thread_count: usize) -> HarnessConfig {
    HarnessConfig {
        thread_count,
        ..small_config()
    }
}

pub type Reference = VersionedIndex<u64, u64>;

pub fn reference_fixture() -> IndexFixture<UInt8, UInt8, Reference> {
    IndexFixture::new(small_config()).unwrap()
}

// ------------------------------------------------------------------------------------------------
// Faulty indexes
// ------------------------------------------------------------------------------------------------

/// Inserts overwrite live records instead of failing.
pub const INSERT_OVERWRITES: u8 = 1;

/// Scans yield records in descending key order.
pub const SCAN_REVERSED: u8 = 2;

/// Deletes panic.
pub const DELETE_PANICS: u8 = 3;

/// Snapshot reads never find anything.
pub const SNAPSHOT_BLIND: u8 = 4;

/// Snapshot scans wait for concurrent mutations to land, then scan the
/// latest state.
pub const SCAN_IGNORES_SNAPSHOT: u8 = 5;

/// Snapshot reads of live records return a payload nobody wrote.
pub const SNAPSHOT_PHANTOM: u8 = 6;

/// Payload returned by [`SNAPSHOT_PHANTOM`] snapshot reads.
pub const PHANTOM_PAYLOAD: u64 = u64::MAX;

/// How long a [`SCAN_IGNORES_SNAPSHOT`] scan lets mutators run first.
pub const SNAPSHOT_SCAN_DELAY: Duration = Duration::from_millis(100);

/// The versioned reference index with one deliberate bug.
pub struct FaultyIndex<const FAULT: u8> {
    inner: Reference,
}

impl<const FAULT: u8> IndexUnderTest<u64, u64> for FaultyIndex<FAULT> {
    type Epochs = EpochClock;

    const CAPABILITIES: CapabilitySet = CapabilitySet::ALL;

    fn open(epochs: Arc<EpochClock>, epoch_interval: Duration) -> Self {
        Self {
            inner: Reference::open(epochs, epoch_interval),
        }
    }

    fn read(&self, key: &u64, key_len: usize) -> Option<u64> {
        self.inner.read(key, key_len)
    }

    fn write(&self, key: &u64, payload: &u64, key_len: usize, pay_len: usize) -> StatusCode {
        self.inner.write(key, payload, key_len, pay_len)
    }

    fn insert(&self, key: &u64, payload: &u64, key_len: usize, pay_len: usize) -> StatusCode {
        if FAULT == INSERT_OVERWRITES {
            return self.inner.write(key, payload, key_len, pay_len);
        }
        self.inner.insert(key, payload, key_len, pay_len)
    }

    fn update(&self, key: &u64, payload: &u64, key_len: usize, pay_len: usize) -> StatusCode {
        self.inner.update(key, payload, key_len, pay_len)
    }

    fn delete(&self, key: &u64, key_len: usize) -> StatusCode {
        if FAULT == DELETE_PANICS {
            panic!("delete of {key} hit a corrupted node");
        }
        self.inner.delete(key, key_len)
    }

    fn scan<'s>(
        &'s self,
        view: ScanView<'_, EpochGuard>,
        begin: Option<ScanBound<'_, u64>>,
        end: Option<ScanBound<'_, u64>>,
    ) -> ScanIter<'s, u64, u64> {
        let view = match view {
            ScanView::Snapshot { .. } if FAULT == SCAN_IGNORES_SNAPSHOT => {
                std::thread::sleep(SNAPSHOT_SCAN_DELAY);
                ScanView::Latest
            }
            view => view,
        };
        let records = self.inner.scan(view, begin, end);
        if FAULT == SCAN_REVERSED {
            let mut records: Vec<_> = records.collect();
            records.reverse();
            return Box::new(records.into_iter());
        }
        records
    }

    fn snapshot_read(
        &self,
        key: &u64,
        guard: &EpochGuard,
        protected: &[Epoch],
        key_len: usize,
    ) -> Option<u64> {
        if FAULT == SNAPSHOT_BLIND {
            return None;
        }
        let found = self.inner.snapshot_read(key, guard, protected, key_len);
        if FAULT == SNAPSHOT_PHANTOM {
            return found.map(|_| PHANTOM_PAYLOAD);
        }
        found
    }

    fn bulkload(&self, entries: Vec<BulkEntry<u64, u64>>, thread_hint: usize) -> StatusCode {
        self.inner.bulkload(entries, thread_hint)
    }
}

pub fn faulty_fixture<const FAULT: u8>() -> IndexFixture<UInt8, UInt8, FaultyIndex<FAULT>> {
    IndexFixture::new(small_config()).unwrap()
}
