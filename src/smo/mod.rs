//! # Concurrent SMO Stress
//!
//! Hammers an ordered index with structure-modification operations (node
//! splits and merges) while readers and scanners walk it.
//!
//! With `T` workers (a multiple of 4), every sub-round splits them into bands:
//!
//! ```text
//! [0, T/2)      writers and deleters, alternating by parity
//! [T/2, 3T/4)   point readers
//! [3T/4, T)     full-range scanners
//! ```
//!
//! Each of the `repeat_count` rounds has two sub-rounds. In the first, even
//! workers of the lower band delete the records they wrote before while odd
//! workers write theirs; in the second the parities swap. Before the first
//! round the even workers write, so every delete targets live records.
//!
//! Readers only ever see a record of the lower band or nothing, so a found
//! payload must be the owner's pristine one. Scanners keep scanning until all
//! `T/2` writers and deleters have finished, asserting strictly ascending keys
//! on every pass.


use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use crate::barrier::WorkerContext;
use crate::capability::Operation;
use crate::data::{Comparator, DataKind};
use crate::index::{EpochManager, IndexUnderTest, ScanView};
use crate::report::{Outcome, Skip, Violation};
use crate::suite::IndexFixture;
use crate::workload::AccessPattern;
use crate::HarnessError;

// ------------------------------------------------------------------------------------------------
// Roles
// ------------------------------------------------------------------------------------------------

/// Which parity of the lower band deletes in a sub-round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletingParity {
    Even,
    Odd,
}

impl DeletingParity {
    fn deletes(self, worker: usize) -> bool {
        match self {
            DeletingParity::Even => worker % 2 == 0,
            DeletingParity::Odd => worker % 2 == 1,
        }
    }
}

impl fmt::Display for DeletingParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletingParity::Even => f.write_str("even"),
            DeletingParity::Odd => f.write_str("odd"),
        }
    }
}

/// What a worker does in one sub-round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoRole {
    Writer,
    Deleter,
    Reader,
    Scanner,
}

/// Role of `worker` out of `thread_count` when `parity` deletes.
pub fn role_of(worker: usize, thread_count: usize, parity: DeletingParity) -> SmoRole {
    if worker >= thread_count * 3 / 4 {
        SmoRole::Scanner
    } else if worker >= thread_count / 2 {
        SmoRole::Reader
    } else if parity.deletes(worker) {
        SmoRole::Deleter
    } else {
        SmoRole::Writer
    }
}

/// Whether `worker` loads its partition before the first round.
pub fn writes_initially(worker: usize, thread_count: usize) -> bool {
    worker < thread_count / 2 && worker % 2 == 0
}

/// Bumps the finished-worker counter even if the worker panics.
struct FinishedGuard<'a>(&'a AtomicUsize);

impl Drop for FinishedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

// ------------------------------------------------------------------------------------------------
// Orchestrator
// ------------------------------------------------------------------------------------------------

impl<K, V, I> IndexFixture<K, V, I>
where
    K: DataKind,
    V: DataKind,
    I: IndexUnderTest<K::Data, V::Data>,
{
    /// Runs the concurrent SMO stress test.
    ///
    /// Not applicable unless the index writes, deletes and scans and the
    /// thread count is a multiple of 4.
    pub fn verify_concurrent_smos(&mut self) -> Result<Outcome, HarnessError> {
        let thread_count = self.config.thread_count;
        if thread_count % 4 != 0 {
            return Ok(self.skip(
                "concurrent SMOs",
                Skip::ThreadCount {
                    required: "a multiple of 4",
                    actual: thread_count,
                },
            ));
        }

        let required = [Operation::Write, Operation::Delete, Operation::Scan];
        let repeat_count = self.config.repeat_count;

        self.scenario("concurrent SMOs", &required, |fx| {
            fx.run_phase("SMO initial load", |ctx| {
                if writes_initially(ctx.id(), thread_count) {
                    fx.smo_write(ctx);
                }
            })?;

            let finished = AtomicUsize::new(0);
            for round in 0..repeat_count {
                for parity in [DeletingParity::Even, DeletingParity::Odd] {
                    finished.store(0, Ordering::Release);
                    fx.run_phase("SMO sub-round", |ctx| {
                        match role_of(ctx.id(), thread_count, parity) {
                            SmoRole::Writer => {
                                let _finished = FinishedGuard(&finished);
                                fx.smo_write(ctx);
                            }
                            SmoRole::Deleter => {
                                let _finished = FinishedGuard(&finished);
                                fx.smo_delete(ctx);
                            }
                            SmoRole::Reader => fx.smo_read(ctx),
                            SmoRole::Scanner => fx.smo_scan(ctx, &finished),
                        }
                    })?;
                    debug!(round, %parity, "SMO sub-round finished");
                }
                info!(round, repeat_count, "SMO round finished");
            }
            Ok(())
        })
    }

    fn smo_write(&self, ctx: &WorkerContext<'_>) {
        let worker = ctx.id();
        let probe = self.probe();
        let payload = self.data.payload(worker);
        for id in self.generator.target_ids(ctx, AccessPattern::Random) {
            let outcome = probe.write(self.data.key(id), payload);
            self.expectations
                .check_status(Operation::Write, worker, id, outcome, true);
        }
    }

    fn smo_delete(&self, ctx: &WorkerContext<'_>) {
        let worker = ctx.id();
        let probe = self.probe();
        for id in self.generator.target_ids(ctx, AccessPattern::Random) {
            let outcome = probe.delete(self.data.key(id));
            self.expectations
                .check_status(Operation::Delete, worker, id, outcome, true);
        }
    }

    fn smo_read(&self, ctx: &WorkerContext<'_>) {
        let worker = ctx.id();
        let probe = self.probe();
        let half = self.config.thread_count / 2;
        for id in self.generator.target_ids_for_smo_stress(ctx) {
            if let Some(actual) = probe.read(self.data.key(id)) {
                self.expectations.check_payload::<V::Comp, _>(
                    Operation::Read,
                    worker,
                    id,
                    Some(&actual),
                    Some(self.data.payload(id % half)),
                );
            }
        }
    }

    fn smo_scan(&self, ctx: &WorkerContext<'_>, finished: &AtomicUsize) {
        let worker = ctx.id();
        let probe = self.probe();
        let writers = self.config.thread_count / 2;

        ctx.gate().await_start();
        self.epochs.forward_global_epoch();
        let guard = self.epochs.create_guard();

        // Record 0 sorts below every targeted record.
        let mut previous = self.data.key(0).clone();
        let mut passes = 0usize;
        while finished.load(Ordering::Acquire) < writers {
            previous.clone_from(self.data.key(0));
            let Some(records) = probe.scan(ScanView::Guarded(&guard), None, None) else {
                return;
            };
            for (key, _) in records {
                self.expectations
                    .check(K::Comp::less(&previous, &key), || Violation::OrderViolation {
                        worker,
                        previous: format!("{previous:?}"),
                        current: format!("{key:?}"),
                    });
                previous.clone_from(&key);
            }
            passes += 1;
        }
        debug!(worker, passes, "scanner finished");
    }
}
