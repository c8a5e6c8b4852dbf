//! # Partitioned Workload Generator
//!
//! Decides which records each worker touches and in which order.
//!
//! With `T` workers and `E` operations per worker, worker `w` owns records
//!
//! ```text
//! T*1 + w, T*2 + w, ..., T*E + w
//! ```
//!
//! so the union over all workers is the contiguous range `[T, T*(E+1))` and no
//! two workers ever share a record. The [`AccessPattern`] only changes the
//! order: ascending, descending, or ascending shuffled with a fixed seed.
//!
//! Records `[0, T)` and `[T*(E+1), T*(E+2))` are never targeted; they are
//! sentinels below and above the working range (the SMO scanners use record 0
//! as their initial "previous key").
//!
//! [`PartitionedWorkloadGenerator::target_ids`] and
//! [`PartitionedWorkloadGenerator::target_ids_for_smo_stress`] compute their
//! sequence under the gate's shared lock and then block on the gate, so a
//! worker returns from them exactly at the common start instant.


use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::barrier::WorkerContext;
use crate::capability::Operation;

// ------------------------------------------------------------------------------------------------
// Parameters
// ------------------------------------------------------------------------------------------------

/// Order in which a worker visits its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessPattern {
    Sequential,
    Reverse,
    Random,
}

impl AccessPattern {
    pub const ALL: [AccessPattern; 3] = [
        AccessPattern::Sequential,
        AccessPattern::Reverse,
        AccessPattern::Random,
    ];
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPattern::Sequential => f.write_str("sequential"),
            AccessPattern::Reverse => f.write_str("reverse"),
            AccessPattern::Random => f.write_str("random"),
        }
    }
}

/// Mutation run concurrently with (or after) a verification phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOperation {
    None,
    Write,
    Insert,
    Update,
    Delete,
}

impl WriteOperation {
    /// The index operation this mutation issues, if any.
    pub fn operation(self) -> Option<Operation> {
        match self {
            WriteOperation::None => None,
            WriteOperation::Write => Some(Operation::Write),
            WriteOperation::Insert => Some(Operation::Insert),
            WriteOperation::Update => Some(Operation::Update),
            WriteOperation::Delete => Some(Operation::Delete),
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOperation::None => f.write_str("none"),
            WriteOperation::Write => f.write_str("write"),
            WriteOperation::Insert => f.write_str("insert"),
            WriteOperation::Update => f.write_str("update"),
            WriteOperation::Delete => f.write_str("delete"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Generator
// ------------------------------------------------------------------------------------------------

/// Computes per-worker target record ids.
#[derive(Debug, Clone, Copy)]
pub struct PartitionedWorkloadGenerator {
    thread_count: usize,
    exec_count: usize,
    seed: u64,
}

impl PartitionedWorkloadGenerator {
    pub fn new(thread_count: usize, exec_count: usize, seed: u64) -> Self {
        Self {
            thread_count,
            exec_count,
            seed,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn exec_count(&self) -> usize {
        self.exec_count
    }

    /// First record id any worker targets.
    pub fn first_id(&self) -> usize {
        self.thread_count
    }

    /// One past the last record id any worker targets.
    pub fn end_id(&self) -> usize {
        self.thread_count * (self.exec_count + 1)
    }

    /// Worker owning record `id` in the partitioned layout.
    pub fn owner_of(&self, id: usize) -> usize {
        id % self.thread_count
    }

    /// Contiguous `[begin, end)` block of the working range assigned to
    /// worker `worker` for per-worker range scans.
    pub fn scan_range(&self, worker: usize) -> (usize, usize) {
        let begin = self.first_id() + self.exec_count * worker;
        (begin, begin + self.exec_count)
    }

    /// The records of `worker` in `pattern` order, without synchronisation.
    pub fn partition(&self, worker: usize, pattern: AccessPattern) -> Vec<usize> {
        let mut ids: Vec<usize> = (1..=self.exec_count)
            .map(|i| self.thread_count * i + worker)
            .collect();

        match pattern {
            AccessPattern::Sequential => {}
            AccessPattern::Reverse => ids.reverse(),
            AccessPattern::Random => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                ids.shuffle(&mut rng);
            }
        }

        ids
    }

    /// `exec_count` records drawn from the first half of the workers'
    /// partitions, without synchronisation. Every caller gets the same
    /// sequence.
    pub fn smo_stress_ids(&self) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let half = (self.thread_count / 2).max(1);
        (0..self.exec_count)
            .map(|_| {
                let exec = rng.random_range(1..=self.exec_count);
                let thread = rng.random_range(0..half);
                self.thread_count * exec + thread
            })
            .collect()
    }

    /// [`Self::partition`] for the calling worker, returned at the start instant.
    pub fn target_ids(&self, ctx: &WorkerContext<'_>, pattern: AccessPattern) -> Vec<usize> {
        let gate = ctx.gate();
        let ids = gate.compute(|| self.partition(ctx.id(), pattern));
        trace!(worker = ctx.id(), %pattern, count = ids.len(), "partition computed");
        gate.await_start();
        ids
    }

    /// [`Self::smo_stress_ids`], returned at the start instant.
    pub fn target_ids_for_smo_stress(&self, ctx: &WorkerContext<'_>) -> Vec<usize> {
        let gate = ctx.gate();
        let ids = gate.compute(|| self.smo_stress_ids());
        trace!(worker = ctx.id(), count = ids.len(), "SMO targets computed");
        gate.await_start();
        ids
    }

    /// `0..count`, for scenarios that do not partition by worker.
    pub fn sequential_ids(count: usize) -> Vec<usize> {
        (0..count).collect()
    }
}
