//! # Expectation Recording
//!
//! Scenarios never stop at the first divergence. Every mismatch between the
//! index and the reference data is recorded as a [`Violation`] in a shared
//! [`Expectations`] sink, and the scenario reports all of them at the end as
//! an [`Outcome`].
//!
//! A scenario that cannot run against a given index (missing capability,
//! unsuitable thread count) is [`Outcome::NotApplicable`], neither a pass nor
//! a failure.


use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::error;

use crate::capability::{OpOutcome, Operation};
use crate::data::{Comparator, is_equal};
use crate::index::StatusCode;

// ------------------------------------------------------------------------------------------------
// Violations
// ------------------------------------------------------------------------------------------------

/// A single divergence between the index and the reference model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// A mutating operation that must succeed failed.
    #[error("{op} of record {record} by worker {worker}: failed with status {code}")]
    UnexpectedFailure {
        op: Operation,
        worker: usize,
        record: usize,
        code: StatusCode,
    },

    /// A mutating operation that must fail succeeded.
    #[error("{op} of record {record} by worker {worker}: succeeded but must fail")]
    UnexpectedSuccess {
        op: Operation,
        worker: usize,
        record: usize,
    },

    /// A record that must be present was not found.
    #[error("{op} of record {record} by worker {worker}: record not found")]
    MissingRecord {
        op: Operation,
        worker: usize,
        record: usize,
    },

    /// A record that must be absent was found.
    #[error("{op} of record {record} by worker {worker}: record unexpectedly present")]
    UnexpectedRecord {
        op: Operation,
        worker: usize,
        record: usize,
    },

    /// A record carried a payload other than the expected one.
    #[error("{op} of record {record} by worker {worker}: expected {expected}, got {actual}")]
    PayloadMismatch {
        op: Operation,
        worker: usize,
        record: usize,
        expected: String,
        actual: String,
    },

    /// A scan produced a key other than the expected one.
    #[error("scan by worker {worker}: expected key of record {record}, got {actual}")]
    KeyMismatch {
        worker: usize,
        record: usize,
        actual: String,
    },

    /// A scan ended before or after the expected position.
    #[error("scan by worker {worker}: expected to stop at record {expected_end}, stopped at {actual_end}")]
    ScanEnd {
        worker: usize,
        expected_end: usize,
        actual_end: usize,
    },

    /// A scan produced two adjacent keys out of strict ascending order.
    #[error("scan by worker {worker}: key {current} does not sort after {previous}")]
    OrderViolation {
        worker: usize,
        previous: String,
        current: String,
    },

    /// The driver's bulk load was rejected.
    #[error("bulkload of {entries} records: failed with status {code}")]
    BulkloadFailed { entries: usize, code: StatusCode },

    /// A worker thread panicked.
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },
}

// ------------------------------------------------------------------------------------------------
// Expectation sink
// ------------------------------------------------------------------------------------------------

/// Thread-safe collector of violations.
#[derive(Debug, Default)]
pub struct Expectations {
    violations: Mutex<Vec<Violation>>,
}

impl Expectations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `violation` and keeps going.
    pub fn record(&self, violation: Violation) {
        error!("{violation}");
        // A poisoned sink still holds every violation recorded so far.
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(violation);
    }

    /// Records the violation built by `violation` unless `holds`.
    pub fn check(&self, holds: bool, violation: impl FnOnce() -> Violation) -> bool {
        if !holds {
            self.record(violation());
        }
        holds
    }

    /// Checks the outcome of a mutating operation against `expect_success`.
    pub fn check_status(
        &self,
        op: Operation,
        worker: usize,
        record: usize,
        outcome: OpOutcome,
        expect_success: bool,
    ) -> bool {
        if outcome.matches(expect_success) {
            return true;
        }
        self.record(match outcome {
            OpOutcome::Failed(code) => Violation::UnexpectedFailure {
                op,
                worker,
                record,
                code,
            },
            OpOutcome::Succeeded | OpOutcome::Unsupported => Violation::UnexpectedSuccess {
                op,
                worker,
                record,
            },
        });
        false
    }

    /// Checks a looked-up payload. `expected == None` means the record must
    /// be absent.
    pub fn check_payload<C, T>(
        &self,
        op: Operation,
        worker: usize,
        record: usize,
        actual: Option<&T>,
        expected: Option<&T>,
    ) -> bool
    where
        C: Comparator<T>,
        T: Debug,
    {
        let violation = match (actual, expected) {
            (Some(actual), Some(expected)) if is_equal::<C, T>(expected, actual) => return true,
            (None, None) => return true,
            (Some(actual), Some(expected)) => Violation::PayloadMismatch {
                op,
                worker,
                record,
                expected: format!("{expected:?}"),
                actual: format!("{actual:?}"),
            },
            (None, Some(_)) => Violation::MissingRecord { op, worker, record },
            (Some(_), None) => Violation::UnexpectedRecord { op, worker, record },
        };
        self.record(violation);
        false
    }

    pub fn len(&self) -> usize {
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<Violation> {
        std::mem::take(
            &mut *self
                .violations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

// ------------------------------------------------------------------------------------------------
// Outcomes
// ------------------------------------------------------------------------------------------------

/// Why a scenario did not run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Skip {
    #[error("index does not support {0}")]
    MissingCapability(Operation),

    #[error("scenario requires {required} threads, configured with {actual}")]
    ThreadCount { required: &'static str, actual: usize },
}

/// Final verdict of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(Vec<Violation>),
    NotApplicable(Skip),
}

impl Outcome {
    /// `Passed` when `violations` is empty, `Failed` otherwise.
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed(violations)
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Outcome::NotApplicable(_))
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Outcome::Failed(v) => v,
            _ => &[],
        }
    }
}
