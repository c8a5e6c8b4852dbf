//! # Single-Threaded Fixture
//!
//! [`SequentialFixture`] drives an index from the calling thread only. It
//! complements the multi-threaded suite with larger record counts, so that
//! leaf and internal structure modifications happen deterministically, and
//! with range scans over explicit bounds.
//!
//! Its dataset has `max + 2` keys and payloads, where `max` is
//! [`HarnessConfig::sequential_max_records`]. Record `i` is written with
//! `payloads[i]`; "second" writes use `payloads[i + 1]`.


use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityProbe, Operation};
use crate::data::{DataKind, Dataset, is_equal};
use crate::index::{IndexUnderTest, ScanView};
use crate::report::{Expectations, Outcome, Skip, Violation};
use crate::{HarnessConfig, HarnessError};

/// Records written without triggering any split.
pub const REC_NUM_WITHOUT_SMOS: usize = 30;

/// Records written to trigger leaf splits.
pub const REC_NUM_WITH_LEAF_SMOS: usize = 1_000;

/// Records written to trigger internal-node splits.
pub const REC_NUM_WITH_INTERNAL_SMOS: usize = 30_000;

/// Every violation of a single-threaded run is attributed to this worker.
const WORKER: usize = 0;

/// Single-threaded test fixture for index type `I`.
pub struct SequentialFixture<K, V, I>
where
    K: DataKind,
    V: DataKind,
    I: IndexUnderTest<K::Data, V::Data>,
{
    config: HarnessConfig,
    epochs: Arc<I::Epochs>,
    index: I,
    data: Dataset<K, V>,
    expectations: Expectations,
}

impl<K, V, I> SequentialFixture<K, V, I>
where
    K: DataKind,
    V: DataKind,
    I: IndexUnderTest<K::Data, V::Data>,
{
    /// Validates `config` and opens an empty index.
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        let epochs = Arc::new(I::Epochs::default());
        let index = I::open(Arc::clone(&epochs), config.epoch_interval);
        info!(
            max_records = config.sequential_max_records,
            "sequential fixture created"
        );
        Ok(Self {
            config,
            epochs,
            index,
            data: Dataset::default(),
            expectations: Expectations::new(),
        })
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn epochs(&self) -> &I::Epochs {
        &self.epochs
    }

    /// Upper bound on the records any scenario touches.
    pub fn max_records(&self) -> usize {
        self.config.sequential_max_records
    }

    /// `0..count`, shuffled with the configured seed when `shuffled`.
    pub fn target_ids(&self, count: usize, shuffled: bool) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..count).collect();
        if shuffled {
            let mut rng = StdRng::seed_from_u64(self.config.random_seed);
            ids.shuffle(&mut rng);
        }
        ids
    }

    // --------------------------------------------------------------------------------------------
    // Scenarios
    // --------------------------------------------------------------------------------------------

    /// Writes `records` records in key order (capped at the maximum) and
    /// reads them back.
    pub fn construct_with(&mut self, records: usize) -> Result<Outcome, HarnessError> {
        let records = records.min(self.max_records());
        self.verify_writes_with(false, false, false, records)
    }

    /// Reading record 0 of an empty index finds nothing.
    pub fn verify_read_empty(&mut self) -> Result<Outcome, HarnessError> {
        self.scenario("read empty", &[], |fx| {
            fx.verify_read(0, 0, false);
            Ok(())
        })
    }

    /// Writes every record, then scans `[begin, end]`. Each bound is a
    /// record id and whether it is closed; `None` is unbounded.
    pub fn verify_scan(
        &mut self,
        begin: Option<(usize, bool)>,
        end: Option<(usize, bool)>,
    ) -> Result<Outcome, HarnessError> {
        let max = self.max_records();
        if let Some((id, _)) = begin.into_iter().chain(end).find(|(id, _)| *id >= max) {
            return Err(HarnessError::ContractViolation(format!(
                "scan bound {id} beyond the {max} written records"
            )));
        }

        self.scenario("scan", &[Operation::Write, Operation::Scan], |fx| {
            let probe = CapabilityProbe::<K, V, I>::new(&fx.index);
            for id in 0..fx.max_records() {
                let outcome = probe.write(fx.data.key(id), fx.data.payload(id));
                fx.expectations
                    .check_status(Operation::Write, WORKER, id, outcome, true);
            }

            let mut pos = match begin {
                Some((id, true)) => id,
                Some((id, false)) => id + 1,
                None => 0,
            };
            let end_pos = end.map(|(id, closed)| if closed { id + 1 } else { id });

            let Some(records) = probe.scan(
                ScanView::Latest,
                begin.map(|(id, closed)| (fx.data.key(id), closed)),
                end.map(|(id, closed)| (fx.data.key(id), closed)),
            ) else {
                return Ok(());
            };
            for (key, payload) in records {
                if pos < fx.data.key_count() {
                    fx.expectations
                        .check(is_equal::<K::Comp, _>(fx.data.key(pos), &key), || {
                            Violation::KeyMismatch {
                                worker: WORKER,
                                record: pos,
                                actual: format!("{key:?}"),
                            }
                        });
                    fx.expectations.check_payload::<V::Comp, _>(
                        Operation::Scan,
                        WORKER,
                        pos,
                        Some(&payload),
                        Some(fx.data.payload(pos)),
                    );
                }
                pos += 1;
            }

            let expected_end = end_pos.unwrap_or(fx.max_records());
            fx.expectations.check(pos == expected_end, || Violation::ScanEnd {
                worker: WORKER,
                expected_end,
                actual_end: pos,
            });
            Ok(())
        })
    }

    /// Writes `ops` records (in shuffled order if requested), optionally
    /// deletes them, optionally writes them again, then reads them back.
    pub fn verify_writes_with(
        &mut self,
        write_twice: bool,
        with_delete: bool,
        shuffled: bool,
        ops: usize,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Write];
        if with_delete {
            required.push(Operation::Delete);
        }
        let ops = ops.min(self.max_records());
        let expect_success = !with_delete || write_twice;

        self.scenario("writes", &required, |fx| {
            debug!(write_twice, with_delete, shuffled, ops, "sequential writes scenario");
            let ids = fx.target_ids(ops, shuffled);
            for &id in &ids {
                fx.verify_write(id, id);
            }
            if with_delete {
                for &id in &ids {
                    fx.verify_delete(id, true);
                }
            }
            if write_twice {
                for &id in &ids {
                    fx.verify_write(id, id + 1);
                }
            }
            for &id in &ids {
                let pay_id = if write_twice { id + 1 } else { id };
                fx.verify_read(id, pay_id, expect_success);
            }
            Ok(())
        })
    }

    /// Inserts every record, optionally deletes it, optionally inserts it
    /// again, then reads it back.
    pub fn verify_inserts_with(
        &mut self,
        write_twice: bool,
        with_delete: bool,
        shuffled: bool,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Insert];
        if with_delete {
            required.push(Operation::Delete);
        }
        let expect_success = !with_delete || write_twice;
        let is_updated = with_delete && write_twice;

        self.scenario("inserts", &required, |fx| {
            debug!(write_twice, with_delete, shuffled, "sequential inserts scenario");
            let ids = fx.target_ids(fx.max_records(), shuffled);
            for &id in &ids {
                fx.verify_insert(id, id, true);
            }
            if with_delete {
                for &id in &ids {
                    fx.verify_delete(id, true);
                }
            }
            if write_twice {
                for &id in &ids {
                    fx.verify_insert(id, id + 1, with_delete);
                }
            }
            for &id in &ids {
                let pay_id = if is_updated { id + 1 } else { id };
                fx.verify_read(id, pay_id, expect_success);
            }
            Ok(())
        })
    }

    /// Optionally writes and deletes every record, then updates it.
    pub fn verify_updates_with(
        &mut self,
        with_write: bool,
        with_delete: bool,
        shuffled: bool,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Update];
        if with_write {
            required.push(Operation::Write);
        }
        if with_delete {
            required.push(Operation::Delete);
        }
        let expect_success = with_write && !with_delete;

        self.scenario("updates", &required, |fx| {
            debug!(with_write, with_delete, shuffled, "sequential updates scenario");
            let ids = fx.target_ids(fx.max_records(), shuffled);
            if with_write {
                for &id in &ids {
                    fx.verify_write(id, id);
                }
            }
            if with_delete {
                for &id in &ids {
                    fx.verify_delete(id, with_write);
                }
            }
            for &id in &ids {
                fx.verify_update(id, id + 1, expect_success);
            }
            for &id in &ids {
                fx.verify_read(id, id + 1, expect_success);
            }
            Ok(())
        })
    }

    /// Optionally writes and deletes every record, then deletes it.
    pub fn verify_deletes_with(
        &mut self,
        with_write: bool,
        with_delete: bool,
        shuffled: bool,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Delete];
        if with_write {
            required.push(Operation::Write);
        }
        let expect_success = with_write && !with_delete;

        self.scenario("deletes", &required, |fx| {
            debug!(with_write, with_delete, shuffled, "sequential deletes scenario");
            let ids = fx.target_ids(fx.max_records(), shuffled);
            if with_write {
                for &id in &ids {
                    fx.verify_write(id, id);
                }
            }
            if with_delete {
                for &id in &ids {
                    fx.verify_delete(id, with_write);
                }
            }
            for &id in &ids {
                fx.verify_delete(id, expect_success);
            }
            for &id in &ids {
                fx.verify_read(id, id, false);
            }
            Ok(())
        })
    }

    // --------------------------------------------------------------------------------------------
    // Single operations
    // --------------------------------------------------------------------------------------------

    fn probe(&self) -> CapabilityProbe<'_, K, V, I> {
        CapabilityProbe::new(&self.index)
    }

    /// Reads `keys[key_id]`, expecting `payloads[pay_id]` or nothing.
    pub fn verify_read(&self, key_id: usize, pay_id: usize, expect_success: bool) -> bool {
        let actual = self.probe().read(self.data.key(key_id));
        let expected = expect_success.then(|| self.data.payload(pay_id));
        self.expectations.check_payload::<V::Comp, _>(
            Operation::Read,
            WORKER,
            key_id,
            actual.as_ref(),
            expected,
        )
    }

    pub fn verify_write(&self, key_id: usize, pay_id: usize) -> bool {
        let outcome = self
            .probe()
            .write(self.data.key(key_id), self.data.payload(pay_id));
        self.expectations
            .check_status(Operation::Write, WORKER, key_id, outcome, true)
    }

    pub fn verify_insert(&self, key_id: usize, pay_id: usize, expect_success: bool) -> bool {
        let outcome = self
            .probe()
            .insert(self.data.key(key_id), self.data.payload(pay_id));
        self.expectations
            .check_status(Operation::Insert, WORKER, key_id, outcome, expect_success)
    }

    pub fn verify_update(&self, key_id: usize, pay_id: usize, expect_success: bool) -> bool {
        let outcome = self
            .probe()
            .update(self.data.key(key_id), self.data.payload(pay_id));
        self.expectations
            .check_status(Operation::Update, WORKER, key_id, outcome, expect_success)
    }

    pub fn verify_delete(&self, key_id: usize, expect_success: bool) -> bool {
        let outcome = self.probe().delete(self.data.key(key_id));
        self.expectations
            .check_status(Operation::Delete, WORKER, key_id, outcome, expect_success)
    }

    // --------------------------------------------------------------------------------------------
    // Helpers
    // --------------------------------------------------------------------------------------------

    fn scenario(
        &mut self,
        name: &str,
        required: &[Operation],
        body: impl FnOnce(&Self) -> Result<(), HarnessError>,
    ) -> Result<Outcome, HarnessError> {
        if let Some(op) = I::CAPABILITIES.first_missing(required) {
            let reason = Skip::MissingCapability(op);
            warn!(scenario = name, "scenario skipped: {reason}");
            return Ok(Outcome::NotApplicable(reason));
        }

        info!(scenario = name, "sequential scenario started");
        self.epochs = Arc::new(I::Epochs::default());
        self.index = I::open(Arc::clone(&self.epochs), self.config.epoch_interval);
        self.expectations.take();
        let count = self.max_records() + 2;
        self.data = Dataset::prepare(count, count);

        let result = body(&*self);
        std::mem::take(&mut self.data).release();
        result?;

        let outcome = Outcome::from_violations(self.expectations.take());
        info!(
            scenario = name,
            violations = outcome.violations().len(),
            "sequential scenario finished"
        );
        Ok(outcome)
    }
}
