//! # Verification Suite
//!
//! [`IndexFixture`] runs the multi-threaded scenarios against one index type.
//!
//! ## Scenario template
//!
//! Every public `verify_*_with` method follows the same steps:
//!
//! 1. Return [`Outcome::NotApplicable`] if the index lacks a required
//!    operation (or the thread count does not fit the scenario).
//! 2. Rebuild the index and its epoch manager, and prepare a fresh dataset of
//!    `(exec_count + 2) * thread_count` keys and payloads.
//! 3. Run the mutation phases. Each phase is one [`ThreadBarrier::run_all`]:
//!    every worker walks its partition in the requested [`AccessPattern`] and
//!    checks the status of each call.
//! 4. Read every record back and scan every per-worker block under a
//!    snapshot, comparing against the expected payloads.
//! 5. Release the dataset and turn the recorded violations into an
//!    [`Outcome`].
//!
//! ## Payload convention
//!
//! Worker `w` writes `payloads[w]` first and `payloads[w + T]` whenever a
//! phase "updates" its records. Since record `id` belongs to worker
//! `id % T`, the expected payload of any record follows from its id alone.

#[cfg(test)]
pub(crate) mod tests;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::barrier::{ThreadBarrier, WorkerContext, WorkerFailure};
use crate::capability::{CapabilityProbe, OpOutcome, Operation};
use crate::data::{DataKind, Dataset, is_equal};
use crate::index::{EpochManager, IndexUnderTest, ScanIter, ScanView};
use crate::report::{Expectations, Outcome, Skip, Violation};
use crate::workload::{AccessPattern, PartitionedWorkloadGenerator, WriteOperation};
use crate::{HarnessConfig, HarnessError};

// ------------------------------------------------------------------------------------------------
// Fixture
// ------------------------------------------------------------------------------------------------

/// Multi-threaded test fixture for index type `I` with key kind `K` and
/// payload kind `V`.
pub struct IndexFixture<K, V, I>
where
    K: DataKind,
    V: DataKind,
    I: IndexUnderTest<K::Data, V::Data>,
{
    pub(crate) config: HarnessConfig,
    pub(crate) generator: PartitionedWorkloadGenerator,
    pub(crate) barrier: ThreadBarrier,
    pub(crate) epochs: Arc<I::Epochs>,
    pub(crate) index: I,
    pub(crate) data: Dataset<K, V>,
    pub(crate) expectations: Expectations,
}

impl<K, V, I> IndexFixture<K, V, I>
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
            threads = config.thread_count,
            execs = config.exec_count,
            capabilities = ?I::CAPABILITIES,
            "index fixture created"
        );

        Ok(Self {
            generator: PartitionedWorkloadGenerator::new(
                config.thread_count,
                config.exec_count,
                config.random_seed,
            ),
            barrier: ThreadBarrier::new(config.thread_creation_grace),
            epochs,
            index,
            data: Dataset::default(),
            expectations: Expectations::new(),
            config,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn epochs(&self) -> &I::Epochs {
        &self.epochs
    }

    pub fn generator(&self) -> &PartitionedWorkloadGenerator {
        &self.generator
    }

    pub fn data(&self) -> &Dataset<K, V> {
        &self.data
    }

    /// Violations recorded since the last scenario finished.
    pub fn expectations(&self) -> &Expectations {
        &self.expectations
    }

    pub fn probe(&self) -> CapabilityProbe<'_, K, V, I> {
        CapabilityProbe::new(&self.index)
    }

    /// Replaces the index (and its epoch manager) with empty ones and drops
    /// any pending violations.
    pub fn reset_index(&mut self) {
        self.epochs = Arc::new(I::Epochs::default());
        self.index = I::open(Arc::clone(&self.epochs), self.config.epoch_interval);
        let stale = self.expectations.take();
        debug!(discarded = stale.len(), "index reset");
    }

    /// Generates the dataset the phase methods read from.
    pub fn prepare_data(&mut self) {
        let count = self.config.key_count();
        self.data = Dataset::prepare(count, count);
    }

    pub fn release_data(&mut self) {
        std::mem::take(&mut self.data).release();
    }

    // --------------------------------------------------------------------------------------------
    // Scenarios
    // --------------------------------------------------------------------------------------------

    /// Writes every record, optionally deletes it, optionally writes it again
    /// with the updated payload, then reads and scans everything.
    pub fn verify_writes_with(
        &mut self,
        write_twice: bool,
        with_delete: bool,
        pattern: AccessPattern,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Write];
        if with_delete {
            required.push(Operation::Delete);
        }
        let expect_success = !with_delete || write_twice;

        self.scenario("writes", &required, |fx| {
            debug!(write_twice, with_delete, %pattern, "writes scenario");
            fx.verify_write(false, pattern)?;
            if with_delete {
                fx.verify_delete(true, pattern)?;
            }
            if write_twice {
                fx.verify_write(true, pattern)?;
            }
            fx.verify_read(expect_success, write_twice, pattern)?;
            fx.verify_scan(expect_success, write_twice)
        })
    }

    /// Inserts every record, optionally deletes it, optionally inserts it
    /// again with the updated payload (which only succeeds after a delete),
    /// then reads and scans everything.
    pub fn verify_inserts_with(
        &mut self,
        write_twice: bool,
        with_delete: bool,
        pattern: AccessPattern,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Insert];
        if with_delete {
            required.push(Operation::Delete);
        }
        let expect_success = !with_delete || write_twice;
        let is_updated = with_delete && write_twice;

        self.scenario("inserts", &required, |fx| {
            debug!(write_twice, with_delete, %pattern, "inserts scenario");
            fx.verify_insert(true, false, pattern)?;
            if with_delete {
                fx.verify_delete(true, pattern)?;
            }
            if write_twice {
                fx.verify_insert(with_delete, true, pattern)?;
            }
            fx.verify_read(expect_success, is_updated, pattern)?;
            fx.verify_scan(expect_success, is_updated)
        })
    }

    /// Optionally writes and deletes every record, then updates it. Updates
    /// succeed only on live records.
    pub fn verify_updates_with(
        &mut self,
        with_write: bool,
        with_delete: bool,
        pattern: AccessPattern,
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
            debug!(with_write, with_delete, %pattern, "updates scenario");
            if with_write {
                fx.verify_write(false, pattern)?;
            }
            if with_delete {
                fx.verify_delete(with_write, pattern)?;
            }
            fx.verify_update(expect_success, pattern)?;
            fx.verify_read(expect_success, true, pattern)?;
            fx.verify_scan(expect_success, true)
        })
    }

    /// Optionally writes and deletes every record, then deletes it. Deletes
    /// succeed only on live records; afterwards nothing is readable.
    pub fn verify_deletes_with(
        &mut self,
        with_write: bool,
        with_delete: bool,
        pattern: AccessPattern,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Delete];
        if with_write {
            required.push(Operation::Write);
        }
        let expect_success = with_write && !with_delete;

        self.scenario("deletes", &required, |fx| {
            debug!(with_write, with_delete, %pattern, "deletes scenario");
            if with_write {
                fx.verify_write(false, pattern)?;
            }
            if with_delete {
                fx.verify_delete(with_write, pattern)?;
            }
            fx.verify_delete(expect_success, pattern)?;
            fx.verify_read(false, false, pattern)?;
            fx.verify_scan(false, false)
        })
    }

    /// Bulk loads the working range, applies `write_ops` to every record and
    /// checks that the loaded values are observed by the mutation.
    pub fn verify_bulkload_with(
        &mut self,
        write_ops: WriteOperation,
        pattern: AccessPattern,
    ) -> Result<Outcome, HarnessError> {
        let mut required = vec![Operation::Bulkload];
        required.extend(write_ops.operation());

        self.scenario("bulkload", &required, |fx| {
            debug!(%write_ops, %pattern, "bulkload scenario");
            fx.verify_bulkload();
            let (expect_success, is_updated) = match write_ops {
                WriteOperation::None => (true, false),
                WriteOperation::Write => {
                    fx.verify_write(true, pattern)?;
                    (true, true)
                }
                WriteOperation::Insert => {
                    fx.verify_insert(false, true, pattern)?;
                    (true, false)
                }
                WriteOperation::Update => {
                    fx.verify_update(true, pattern)?;
                    (true, true)
                }
                WriteOperation::Delete => {
                    fx.verify_delete(true, pattern)?;
                    (false, false)
                }
            };
            fx.verify_read(expect_success, is_updated, pattern)?;
            fx.verify_scan(expect_success, is_updated)
        })
    }

    /// One worker snapshot-reads the whole working range while the others
    /// overwrite their partitions.
    pub fn verify_snapshot_read(&mut self) -> Result<Outcome, HarnessError> {
        if self.config.thread_count < 2 {
            return Ok(self.skip(
                "snapshot read",
                Skip::ThreadCount {
                    required: "at least 2",
                    actual: self.config.thread_count,
                },
            ));
        }

        self.scenario(
            "snapshot read",
            &[Operation::Write, Operation::SnapshotRead],
            |fx| {
                fx.verify_write(false, AccessPattern::Sequential)?;
                fx.snapshot_read_phase()
            },
        )
    }

    /// One worker scans the whole working range under a fixed snapshot while
    /// the others apply `write_ops` to their partitions.
    ///
    /// # Errors
    ///
    /// [`HarnessError::ContractViolation`] for [`WriteOperation::Insert`]:
    /// the records already exist, so concurrent inserts could only fail.
    pub fn verify_snapshot_scan_with(
        &mut self,
        write_ops: WriteOperation,
        pattern: AccessPattern,
    ) -> Result<Outcome, HarnessError> {
        if write_ops == WriteOperation::Insert {
            return Err(HarnessError::ContractViolation(
                "snapshot scan cannot run concurrently with inserts".into(),
            ));
        }
        if self.config.thread_count < 2 {
            return Ok(self.skip(
                "snapshot scan",
                Skip::ThreadCount {
                    required: "at least 2",
                    actual: self.config.thread_count,
                },
            ));
        }

        let mut required = vec![Operation::Write, Operation::Scan];
        required.extend(write_ops.operation());

        self.scenario("snapshot scan", &required, |fx| {
            debug!(%write_ops, %pattern, "snapshot scan scenario");
            fx.verify_write(false, AccessPattern::Sequential)?;
            fx.snapshot_scan_phase(write_ops.operation(), pattern)
        })
    }

    // --------------------------------------------------------------------------------------------
    // Phases
    // --------------------------------------------------------------------------------------------

    /// Every worker writes its records; must succeed.
    pub fn verify_write(&self, is_updated: bool, pattern: AccessPattern) -> Result<(), HarnessError> {
        self.mutation_phase(Operation::Write, true, is_updated, pattern)
    }

    pub fn verify_insert(
        &self,
        expect_success: bool,
        is_updated: bool,
        pattern: AccessPattern,
    ) -> Result<(), HarnessError> {
        self.mutation_phase(Operation::Insert, expect_success, is_updated, pattern)
    }

    /// Updates always carry the updated payload.
    pub fn verify_update(&self, expect_success: bool, pattern: AccessPattern) -> Result<(), HarnessError> {
        self.mutation_phase(Operation::Update, expect_success, true, pattern)
    }

    pub fn verify_delete(&self, expect_success: bool, pattern: AccessPattern) -> Result<(), HarnessError> {
        self.mutation_phase(Operation::Delete, expect_success, false, pattern)
    }

    /// Every worker point-reads its records. With `expect_success` each must
    /// carry the owner's pristine (or updated) payload; otherwise each must
    /// be absent.
    pub fn verify_read(
        &self,
        expect_success: bool,
        is_updated: bool,
        pattern: AccessPattern,
    ) -> Result<(), HarnessError> {
        let probe = self.probe();
        self.run_phase(Operation::Read, |ctx| {
            let worker = ctx.id();
            let expected = expect_success.then(|| self.data.payload(self.payload_id(worker, is_updated)));
            for id in self.generator.target_ids(ctx, pattern) {
                let actual = probe.read(self.data.key(id));
                self.expectations.check_payload::<V::Comp, _>(
                    Operation::Read,
                    worker,
                    id,
                    actual.as_ref(),
                    expected,
                );
            }
        })
    }

    /// Every worker scans its block `[T + E*w, T + E*(w+1))` under one shared
    /// snapshot. Skipped silently when the index cannot scan.
    pub fn verify_scan(&self, expect_success: bool, is_updated: bool) -> Result<(), HarnessError> {
        if !CapabilityProbe::<K, V, I>::supports(Operation::Scan) {
            return Ok(());
        }

        self.epochs.forward_global_epoch();
        let (guard, protected) = self.epochs.protected_epochs();
        let probe = self.probe();
        let offset = if is_updated { self.config.thread_count } else { 0 };

        self.run_phase(Operation::Scan, |ctx| {
            let worker = ctx.id();
            let (begin, end) = self.generator.scan_range(worker);
            let view = ScanView::Snapshot {
                guard: &guard,
                protected: &protected,
            };
            let Some(records) = probe.scan(
                view,
                Some((self.data.key(begin), true)),
                Some((self.data.key(end), false)),
            ) else {
                return;
            };

            if expect_success {
                self.check_scanned(worker, records, begin, end, offset);
            } else {
                let found = records.count();
                self.expectations.check(found == 0, || Violation::ScanEnd {
                    worker,
                    expected_end: begin,
                    actual_end: begin + found,
                });
            }
        })
    }

    /// Loads `[T, T*(E+1))` in one call, record `id` carrying
    /// `payloads[id % T]`.
    pub fn verify_bulkload(&self) {
        let t = self.config.thread_count;
        let ids = self.generator.first_id()..self.generator.end_id();
        let records = ids.len();

        let entries = ids.map(|id| (self.data.key(id), self.data.payload(id % t)));
        if let OpOutcome::Failed(code) = self.probe().bulkload(entries, t) {
            self.expectations.record(Violation::BulkloadFailed {
                entries: records,
                code,
            });
        }
        debug!(records, "bulkload phase finished");
    }

    fn mutation_phase(
        &self,
        op: Operation,
        expect_success: bool,
        is_updated: bool,
        pattern: AccessPattern,
    ) -> Result<(), HarnessError> {
        let probe = self.probe();
        self.run_phase(op, |ctx| {
            let worker = ctx.id();
            let payload = self.data.payload(self.payload_id(worker, is_updated));
            for id in self.generator.target_ids(ctx, pattern) {
                let outcome = probe.mutate(op, self.data.key(id), payload);
                self.expectations
                    .check_status(op, worker, id, outcome, expect_success);
            }
        })
    }

    fn snapshot_read_phase(&self) -> Result<(), HarnessError> {
        self.epochs.forward_global_epoch();
        let (guard, protected) = self.epochs.protected_epochs();
        let probe = self.probe();
        let t = self.config.thread_count;
        let (first, end) = (self.generator.first_id(), self.generator.end_id());

        let reader = |ctx: &WorkerContext<'_>| {
            let worker = ctx.id();
            ctx.gate().await_start();
            for id in first..end {
                let before = self.data.payload(id % t);
                let after = self.data.payload(id % t + t);
                let Some(actual) = probe.snapshot_read(self.data.key(id), &guard, &protected) else {
                    self.expectations.record(Violation::MissingRecord {
                        op: Operation::SnapshotRead,
                        worker,
                        record: id,
                    });
                    continue;
                };
                let seen = is_equal::<V::Comp, _>(before, &actual)
                    || is_equal::<V::Comp, _>(after, &actual);
                self.expectations.check(seen, || Violation::PayloadMismatch {
                    op: Operation::SnapshotRead,
                    worker,
                    record: id,
                    expected: format!("{before:?} or {after:?}"),
                    actual: format!("{actual:?}"),
                });
            }
        };

        let writer = |ctx: &WorkerContext<'_>| {
            let worker = ctx.id();
            let payload = self.data.payload(worker + t);
            for id in self.generator.target_ids(ctx, AccessPattern::Sequential) {
                let outcome = probe.write(self.data.key(id), payload);
                self.expectations
                    .check_status(Operation::Write, worker, id, outcome, true);
            }
        };

        self.run_phase_but_one(Operation::SnapshotRead, reader, writer)
    }

    fn snapshot_scan_phase(&self, op: Option<Operation>, pattern: AccessPattern) -> Result<(), HarnessError> {
        self.epochs.forward_global_epoch();
        let (guard, protected) = self.epochs.protected_epochs();
        // Mutations land two epochs past the snapshot.
        self.epochs.forward_global_epoch();
        self.epochs.forward_global_epoch();

        let probe = self.probe();
        let t = self.config.thread_count;
        let (begin, end) = (self.generator.first_id(), self.generator.end_id());

        let scanner = |ctx: &WorkerContext<'_>| {
            ctx.gate().await_start();
            let view = ScanView::Snapshot {
                guard: &guard,
                protected: &protected,
            };
            if let Some(records) = probe.scan(
                view,
                Some((self.data.key(begin), true)),
                Some((self.data.key(end), false)),
            ) {
                self.check_scanned(ctx.id(), records, begin, end, 0);
            }
        };

        let mutator = |ctx: &WorkerContext<'_>| {
            let worker = ctx.id();
            let payload = self.data.payload(worker + t);
            for id in self.generator.target_ids(ctx, pattern) {
                if let Some(op) = op {
                    let outcome = probe.mutate(op, self.data.key(id), payload);
                    self.expectations.check_status(op, worker, id, outcome, true);
                }
            }
        };

        self.run_phase_but_one(Operation::Scan, scanner, mutator)
    }

    // --------------------------------------------------------------------------------------------
    // Helpers
    // --------------------------------------------------------------------------------------------

    /// Runs the skip check, then `body` against a fresh index and dataset.
    pub(crate) fn scenario(
        &mut self,
        name: &str,
        required: &[Operation],
        body: impl FnOnce(&Self) -> Result<(), HarnessError>,
    ) -> Result<Outcome, HarnessError> {
        if let Some(op) = I::CAPABILITIES.first_missing(required) {
            return Ok(self.skip(name, Skip::MissingCapability(op)));
        }

        info!(scenario = name, "scenario started");
        self.reset_index();
        self.prepare_data();
        let result = body(&*self);
        self.release_data();
        result?;

        let outcome = Outcome::from_violations(self.expectations.take());
        match &outcome {
            Outcome::Failed(violations) => {
                info!(scenario = name, violations = violations.len(), "scenario failed")
            }
            _ => info!(scenario = name, "scenario passed"),
        }
        Ok(outcome)
    }

    pub(crate) fn skip(&self, name: &str, reason: Skip) -> Outcome {
        warn!(scenario = name, "scenario skipped: {reason}");
        Outcome::NotApplicable(reason)
    }

    pub(crate) fn run_phase<F>(&self, phase: impl fmt::Display, task: F) -> Result<(), HarnessError>
    where
        F: Fn(&WorkerContext<'_>) + Sync,
    {
        let failures = self.barrier.run_all(self.config.thread_count, task)?;
        self.record_failures(failures);
        debug!(%phase, "phase finished");
        Ok(())
    }

    pub(crate) fn run_phase_but_one<M, O>(
        &self,
        phase: impl fmt::Display,
        main: M,
        other: O,
    ) -> Result<(), HarnessError>
    where
        M: Fn(&WorkerContext<'_>) + Sync,
        O: Fn(&WorkerContext<'_>) + Sync,
    {
        let failures = self
            .barrier
            .run_all_but_one(self.config.thread_count, main, other)?;
        self.record_failures(failures);
        debug!(%phase, "phase finished");
        Ok(())
    }

    fn record_failures(&self, failures: Vec<WorkerFailure>) {
        for WorkerFailure { worker, message } in failures {
            self.expectations
                .record(Violation::WorkerPanicked { worker, message });
        }
    }

    fn payload_id(&self, worker: usize, is_updated: bool) -> usize {
        if is_updated {
            worker + self.config.thread_count
        } else {
            worker
        }
    }

    /// Checks that `records` holds exactly records `[begin, end)` in order,
    /// record `id` carrying `payloads[id % T + offset]`.
    fn check_scanned(
        &self,
        worker: usize,
        records: ScanIter<'_, K::Data, V::Data>,
        begin: usize,
        end: usize,
        offset: usize,
    ) {
        let t = self.config.thread_count;
        let mut id = begin;
        for (key, payload) in records {
            if id < end {
                self.expectations
                    .check(is_equal::<K::Comp, _>(self.data.key(id), &key), || {
                        Violation::KeyMismatch {
                            worker,
                            record: id,
                            actual: format!("{key:?}"),
                        }
                    });
                self.expectations.check_payload::<V::Comp, _>(
                    Operation::Scan,
                    worker,
                    id,
                    Some(&payload),
                    Some(self.data.payload(id % t + offset)),
                );
            }
            id += 1;
        }
        self.expectations.check(id == end, || Violation::ScanEnd {
            worker,
            expected_end: end,
            actual_end: id,
        });
    }
}
