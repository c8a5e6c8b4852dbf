//! # Thread Barrier
//!
//! Starts a set of worker threads at one logical instant.
//!
//! Each run builds a fresh [`StartGate`]: a readiness flag guarded by a mutex
//! and a condition variable, plus a reader-writer lock separating per-worker
//! partition computation (shared) from the one-time readiness flip
//! (exclusive).
//!
//! ## Protocol
//!
//! 1. The driver spawns every worker. Each worker computes whatever it needs
//!    under the shared lock, then parks on the condition variable.
//! 2. The driver sleeps for a grace interval so that workers reach their wait
//!    point, takes the lock exclusively (serialising against any in-flight
//!    partition computation), sets the flag and wakes everyone.
//! 3. The driver joins every worker. A panicking worker is reported as a
//!    [`WorkerFailure`]; its siblings keep running.
//!
//! The flag and condition variable are what make the start safe. The grace
//! interval only makes it likely that every worker is already parked, so the
//! start is as simultaneous as the scheduler allows.


use std::any::Any;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam::sync::ShardedLock;
use crossbeam::thread::ScopedJoinHandle;
use tracing::{debug, error, trace};

use crate::HarnessError;

// ------------------------------------------------------------------------------------------------
// Start gate
// ------------------------------------------------------------------------------------------------

/// One-shot rendezvous between a driver and its workers.
#[derive(Debug, Default)]
pub struct StartGate {
    /// Shared while a worker computes its partition, exclusive while the
    /// driver flips readiness.
    partition_lock: ShardedLock<()>,

    /// Readiness flag.
    ready: Mutex<bool>,

    /// Wakes workers parked on `ready`.
    cond: Condvar,
}

impl StartGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `compute` under the shared lock. Concurrent callers do not
    /// serialise against each other, only against [`StartGate::declare_start`].
    pub fn compute<T>(&self, compute: impl FnOnce() -> T) -> T {
        let _shared = self
            .partition_lock
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        compute()
    }

    /// Blocks until the driver declares the start.
    pub fn await_start(&self) {
        let ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        let _ready = self
            .cond
            .wait_while(ready, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Releases every current and future waiter.
    pub fn declare_start(&self) {
        let _exclusive = self
            .partition_lock
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        *ready = true;
        self.cond.notify_all();
    }

    pub fn is_started(&self) -> bool {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ------------------------------------------------------------------------------------------------
// Worker context
// ------------------------------------------------------------------------------------------------

/// What a worker knows about itself.
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'g> {
    id: usize,
    gate: &'g StartGate,
}

impl<'g> WorkerContext<'g> {
    pub fn new(id: usize, gate: &'g StartGate) -> Self {
        Self { id, gate }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn gate(&self) -> &'g StartGate {
        self.gate
    }
}

/// A worker that panicked instead of returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker: usize,
    pub message: String,
}

// ------------------------------------------------------------------------------------------------
// Barrier
// ------------------------------------------------------------------------------------------------

/// Spawns, synchronises and joins worker threads.
#[derive(Debug, Clone, Copy)]
pub struct ThreadBarrier {
    grace: Duration,
}

impl ThreadBarrier {
    /// `grace` is how long the driver waits after spawning before declaring
    /// the start.
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Runs `task` on `worker_count` fresh threads with ids `0..worker_count`.
    pub fn run_all<F>(&self, worker_count: usize, task: F) -> Result<Vec<WorkerFailure>, HarnessError>
    where
        F: Fn(&WorkerContext<'_>) + Sync,
    {
        self.run(worker_count, &task)
    }

    /// Runs `main` on worker `worker_count - 1` and `other` on every other worker.
    pub fn run_all_but_one<M, O>(
        &self,
        worker_count: usize,
        main: M,
        other: O,
    ) -> Result<Vec<WorkerFailure>, HarnessError>
    where
        M: Fn(&WorkerContext<'_>) + Sync,
        O: Fn(&WorkerContext<'_>) + Sync,
    {
        let main_id = worker_count.saturating_sub(1);
        self.run(worker_count, &|ctx: &WorkerContext<'_>| {
            if ctx.id() == main_id {
                main(ctx)
            } else {
                other(ctx)
            }
        })
    }

    fn run(
        &self,
        worker_count: usize,
        task: &(dyn Fn(&WorkerContext<'_>) + Sync),
    ) -> Result<Vec<WorkerFailure>, HarnessError> {
        let gate = StartGate::new();

        let joined = crossbeam::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(worker_count);
            for id in 0..worker_count {
                let gate = &gate;
                let spawned = scope
                    .builder()
                    .name(format!("indexfixture-worker-{id}"))
                    .spawn(move |_| task(&WorkerContext::new(id, gate)));
                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(e) => {
                        error!(worker = id, "failed to spawn worker: {e}");
                        // Workers already spawned may be parked on the gate.
                        gate.declare_start();
                        let failures = join_workers(handles);
                        if !failures.is_empty() {
                            error!(failures = failures.len(), "workers panicked before spawn failure");
                        }
                        return Err(HarnessError::Spawn(e));
                    }
                }
            }
            trace!(worker_count, "all workers spawned");

            thread::sleep(self.grace);
            gate.declare_start();
            debug!(worker_count, "start declared");

            Ok(join_workers(handles))
        });

        joined.map_err(|_| HarnessError::Internal("worker scope panicked".into()))?
    }
}

/// Joins every handle, turning each panic into a logged [`WorkerFailure`].
fn join_workers(handles: Vec<(usize, ScopedJoinHandle<'_, ()>)>) -> Vec<WorkerFailure> {
    let mut failures = Vec::new();
    for (id, handle) in handles {
        if let Err(payload) = handle.join() {
            let message = panic_message(payload.as_ref());
            error!(worker = id, "worker panicked: {message}");
            failures.push(WorkerFailure {
                worker: id,
                message,
            });
        }
    }
    failures
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
