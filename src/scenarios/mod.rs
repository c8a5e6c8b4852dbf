//! # Scenario Catalog
//!
//! Every named scenario the harness knows, as plain data.
//!
//! A [`Scenario`] is a fixture method plus its arguments. [`Scenario::ALL`]
//! lists the full catalog and [`run_catalog`] runs it against one index type,
//! building a fresh fixture for every entry. Names follow the
//! `{Pattern}{Operation}With{Keys}{Result}` convention, e.g.
//! `RandomInsertWithDuplicateKeysFail`.

#[cfg(test)]
mod tests;

use std::fmt;

use tracing::info;

use crate::data::DataKind;
use crate::index::IndexUnderTest;
use crate::report::Outcome;
use crate::sequential::{
    REC_NUM_WITH_INTERNAL_SMOS, REC_NUM_WITH_LEAF_SMOS, REC_NUM_WITHOUT_SMOS, SequentialFixture,
};
use crate::suite::IndexFixture;
use crate::workload::AccessPattern::{Random, Reverse, Sequential};
use crate::workload::{AccessPattern, WriteOperation};
use crate::{HarnessConfig, HarnessError};

// ------------------------------------------------------------------------------------------------
// Scenarios
// ------------------------------------------------------------------------------------------------

/// A multi-threaded scenario, or a single-threaded one wrapped in
/// [`Scenario::Sequential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    Writes {
        write_twice: bool,
        with_delete: bool,
        pattern: AccessPattern,
    },
    Inserts {
        write_twice: bool,
        with_delete: bool,
        pattern: AccessPattern,
    },
    Updates {
        with_write: bool,
        with_delete: bool,
        pattern: AccessPattern,
    },
    Deletes {
        with_write: bool,
        with_delete: bool,
        pattern: AccessPattern,
    },
    Bulkload {
        write_ops: WriteOperation,
        pattern: AccessPattern,
    },
    SnapshotRead,
    SnapshotScan {
        write_ops: WriteOperation,
        pattern: AccessPattern,
    },
    ConcurrentSmos,
    Sequential(SequentialScenario),
}

/// A single-threaded scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequentialScenario {
    Construct {
        records: usize,
    },
    ReadWithEmptyIndex,
    Scan {
        begin: Option<(usize, bool)>,
        end: Option<(usize, bool)>,
    },
    Writes {
        write_twice: bool,
        with_delete: bool,
        shuffled: bool,
    },
    Inserts {
        write_twice: bool,
        with_delete: bool,
        shuffled: bool,
    },
    Updates {
        with_write: bool,
        with_delete: bool,
        shuffled: bool,
    },
    Deletes {
        with_write: bool,
        with_delete: bool,
        shuffled: bool,
    },
}

const fn writes(write_twice: bool, with_delete: bool, pattern: AccessPattern) -> Scenario {
    Scenario::Writes {
        write_twice,
        with_delete,
        pattern,
    }
}

const fn inserts(write_twice: bool, with_delete: bool, pattern: AccessPattern) -> Scenario {
    Scenario::Inserts {
        write_twice,
        with_delete,
        pattern,
    }
}

const fn updates(with_write: bool, with_delete: bool, pattern: AccessPattern) -> Scenario {
    Scenario::Updates {
        with_write,
        with_delete,
        pattern,
    }
}

const fn deletes(with_write: bool, with_delete: bool, pattern: AccessPattern) -> Scenario {
    Scenario::Deletes {
        with_write,
        with_delete,
        pattern,
    }
}

const fn bulkload(write_ops: WriteOperation, pattern: AccessPattern) -> Scenario {
    Scenario::Bulkload { write_ops, pattern }
}

const fn snapshot_scan(write_ops: WriteOperation) -> Scenario {
    Scenario::SnapshotScan {
        write_ops,
        pattern: AccessPattern::Random,
    }
}

const fn single(scenario: SequentialScenario) -> Scenario {
    Scenario::Sequential(scenario)
}

const fn single_writes(write_twice: bool, with_delete: bool, shuffled: bool) -> Scenario {
    single(SequentialScenario::Writes {
        write_twice,
        with_delete,
        shuffled,
    })
}

const fn single_inserts(write_twice: bool, with_delete: bool, shuffled: bool) -> Scenario {
    single(SequentialScenario::Inserts {
        write_twice,
        with_delete,
        shuffled,
    })
}

const fn single_updates(with_write: bool, with_delete: bool, shuffled: bool) -> Scenario {
    single(SequentialScenario::Updates {
        with_write,
        with_delete,
        shuffled,
    })
}

const fn single_deletes(with_write: bool, with_delete: bool, shuffled: bool) -> Scenario {
    single(SequentialScenario::Deletes {
        with_write,
        with_delete,
        shuffled,
    })
}

impl Scenario {
    /// The full catalog.
    pub const ALL: &'static [Scenario] = &[
        // multi-threaded point operations
        writes(false, false, Sequential),
        writes(true, false, Sequential),
        writes(true, true, Sequential),
        writes(false, false, Random),
        writes(true, false, Random),
        writes(true, true, Random),
        inserts(false, false, Sequential),
        inserts(true, false, Sequential),
        inserts(true, true, Sequential),
        inserts(false, false, Random),
        inserts(true, false, Random),
        inserts(true, true, Random),
        updates(true, false, Sequential),
        updates(false, false, Sequential),
        updates(true, true, Sequential),
        updates(true, false, Random),
        updates(false, false, Random),
        updates(true, true, Random),
        deletes(true, false, Sequential),
        deletes(false, false, Sequential),
        deletes(true, true, Sequential),
        deletes(true, false, Random),
        deletes(false, false, Random),
        deletes(true, true, Random),
        // reverse order
        writes(true, true, Reverse),
        inserts(true, true, Reverse),
        updates(true, false, Reverse),
        deletes(true, false, Reverse),
        // bulk load
        bulkload(WriteOperation::None, Sequential),
        bulkload(WriteOperation::Write, Random),
        bulkload(WriteOperation::Insert, Random),
        bulkload(WriteOperation::Update, Random),
        bulkload(WriteOperation::Delete, Random),
        // snapshots
        Scenario::SnapshotRead,
        snapshot_scan(WriteOperation::None),
        snapshot_scan(WriteOperation::Write),
        snapshot_scan(WriteOperation::Update),
        snapshot_scan(WriteOperation::Delete),
        // structure modifications
        Scenario::ConcurrentSmos,
        // single-threaded
        single(SequentialScenario::Construct {
            records: REC_NUM_WITHOUT_SMOS,
        }),
        single(SequentialScenario::Construct {
            records: REC_NUM_WITH_LEAF_SMOS,
        }),
        single(SequentialScenario::Construct {
            records: REC_NUM_WITH_INTERNAL_SMOS,
        }),
        single(SequentialScenario::ReadWithEmptyIndex),
        single(SequentialScenario::Scan {
            begin: None,
            end: None,
        }),
        single(SequentialScenario::Scan {
            begin: Some((0, true)),
            end: Some((REC_NUM_WITHOUT_SMOS - 1, true)),
        }),
        single(SequentialScenario::Scan {
            begin: Some((0, false)),
            end: Some((REC_NUM_WITHOUT_SMOS - 1, false)),
        }),
        single_writes(false, false, false),
        single_writes(true, false, false),
        single_writes(true, true, false),
        single_writes(false, false, true),
        single_writes(true, false, true),
        single_writes(true, true, true),
        single_inserts(false, false, false),
        single_inserts(true, false, false),
        single_inserts(true, true, false),
        single_inserts(false, false, true),
        single_inserts(true, false, true),
        single_inserts(true, true, true),
        single_updates(true, false, false),
        single_updates(false, false, false),
        single_updates(true, true, false),
        single_updates(true, false, true),
        single_updates(false, false, true),
        single_updates(true, true, true),
        single_deletes(true, false, false),
        single_deletes(false, false, false),
        single_deletes(true, true, false),
        single_deletes(true, false, true),
        single_deletes(false, false, true),
        single_deletes(true, true, true),
    ];

    pub fn is_multi_threaded(&self) -> bool {
        !matches!(self, Scenario::Sequential(_))
    }

    /// Runs this scenario against a fresh fixture for index type `I`.
    pub fn run<K, V, I>(&self, config: &HarnessConfig) -> Result<Outcome, HarnessError>
    where
        K: DataKind,
        V: DataKind,
        I: IndexUnderTest<K::Data, V::Data>,
    {
        info!(scenario = %self, "running scenario");
        match *self {
            Scenario::Sequential(scenario) => {
                let mut fixture = SequentialFixture::<K, V, I>::new(config.clone())?;
                scenario.run_on(&mut fixture)
            }
            _ => {
                let mut fixture = IndexFixture::<K, V, I>::new(config.clone())?;
                self.run_on(&mut fixture)
            }
        }
    }

    fn run_on<K, V, I>(&self, fx: &mut IndexFixture<K, V, I>) -> Result<Outcome, HarnessError>
    where
        K: DataKind,
        V: DataKind,
        I: IndexUnderTest<K::Data, V::Data>,
    {
        match *self {
            Scenario::Writes {
                write_twice,
                with_delete,
                pattern,
            } => fx.verify_writes_with(write_twice, with_delete, pattern),
            Scenario::Inserts {
                write_twice,
                with_delete,
                pattern,
            } => fx.verify_inserts_with(write_twice, with_delete, pattern),
            Scenario::Updates {
                with_write,
                with_delete,
                pattern,
            } => fx.verify_updates_with(with_write, with_delete, pattern),
            Scenario::Deletes {
                with_write,
                with_delete,
                pattern,
            } => fx.verify_deletes_with(with_write, with_delete, pattern),
            Scenario::Bulkload { write_ops, pattern } => fx.verify_bulkload_with(write_ops, pattern),
            Scenario::SnapshotRead => fx.verify_snapshot_read(),
            Scenario::SnapshotScan { write_ops, pattern } => {
                fx.verify_snapshot_scan_with(write_ops, pattern)
            }
            Scenario::ConcurrentSmos => fx.verify_concurrent_smos(),
            Scenario::Sequential(_) => Err(HarnessError::Internal(format!(
                "{self} is not a multi-threaded scenario"
            ))),
        }
    }
}

impl SequentialScenario {
    fn run_on<K, V, I>(&self, fx: &mut SequentialFixture<K, V, I>) -> Result<Outcome, HarnessError>
    where
        K: DataKind,
        V: DataKind,
        I: IndexUnderTest<K::Data, V::Data>,
    {
        match *self {
            SequentialScenario::Construct { records } => fx.construct_with(records),
            SequentialScenario::ReadWithEmptyIndex => fx.verify_read_empty(),
            SequentialScenario::Scan { begin, end } => fx.verify_scan(begin, end),
            SequentialScenario::Writes {
                write_twice,
                with_delete,
                shuffled,
            } => {
                let ops = fx.max_records();
                fx.verify_writes_with(write_twice, with_delete, shuffled, ops)
            }
            SequentialScenario::Inserts {
                write_twice,
                with_delete,
                shuffled,
            } => fx.verify_inserts_with(write_twice, with_delete, shuffled),
            SequentialScenario::Updates {
                with_write,
                with_delete,
                shuffled,
            } => fx.verify_updates_with(with_write, with_delete, shuffled),
            SequentialScenario::Deletes {
                with_write,
                with_delete,
                shuffled,
            } => fx.verify_deletes_with(with_write, with_delete, shuffled),
        }
    }
}

/// Runs every entry of [`Scenario::ALL`] against index type `I`.
///
/// Stops at the first harness error; index misbehaviour never stops the run.
pub fn run_catalog<K, V, I>(config: &HarnessConfig) -> Result<Vec<(Scenario, Outcome)>, HarnessError>
where
    K: DataKind,
    V: DataKind,
    I: IndexUnderTest<K::Data, V::Data>,
{
    let mut results = Vec::with_capacity(Scenario::ALL.len());
    for scenario in Scenario::ALL {
        let outcome = scenario.run::<K, V, I>(config)?;
        results.push((*scenario, outcome));
    }

    let passed = results.iter().filter(|(_, o)| o.is_passed()).count();
    let failed = results.iter().filter(|(_, o)| o.is_failed()).count();
    info!(
        total = results.len(),
        passed,
        failed,
        skipped = results.len() - passed - failed,
        "catalog finished"
    );
    Ok(results)
}

// ------------------------------------------------------------------------------------------------
// Names
// ------------------------------------------------------------------------------------------------

fn pattern_prefix(pattern: AccessPattern) -> &'static str {
    match pattern {
        AccessPattern::Sequential => "",
        AccessPattern::Reverse => "Reverse",
        AccessPattern::Random => "Random",
    }
}

fn result_word(succeeds: bool) -> &'static str {
    if succeeds { "Succeed" } else { "Fail" }
}

/// `{Keys}{Result}` for write and insert scenarios.
fn rewrite_suffix(write_twice: bool, with_delete: bool, insert: bool) -> String {
    let keys = if with_delete {
        "Deleted"
    } else if write_twice {
        "Duplicate"
    } else {
        "Unique"
    };
    let succeeds = if insert {
        write_twice == with_delete
    } else {
        !with_delete || write_twice
    };
    format!("With{keys}Keys{}", result_word(succeeds))
}

/// `{Keys}{Result}` for update and delete scenarios.
fn existing_suffix(with_write: bool, with_delete: bool) -> String {
    let keys = if with_delete {
        "Deleted"
    } else if with_write {
        "Duplicate"
    } else {
        "NotInserted"
    };
    format!("With{keys}Keys{}", result_word(with_write && !with_delete))
}

fn write_ops_suffix(write_ops: WriteOperation) -> &'static str {
    match write_ops {
        WriteOperation::None => "WithoutWrite",
        WriteOperation::Write => "WithWrite",
        WriteOperation::Insert => "WithInsertFail",
        WriteOperation::Update => "WithUpdate",
        WriteOperation::Delete => "WithDelete",
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scenario::Writes {
                write_twice,
                with_delete,
                pattern,
            } => write!(
                f,
                "{}Write{}",
                pattern_prefix(pattern),
                rewrite_suffix(write_twice, with_delete, false)
            ),
            Scenario::Inserts {
                write_twice,
                with_delete,
                pattern,
            } => write!(
                f,
                "{}Insert{}",
                pattern_prefix(pattern),
                rewrite_suffix(write_twice, with_delete, true)
            ),
            Scenario::Updates {
                with_write,
                with_delete,
                pattern,
            } => write!(
                f,
                "{}Update{}",
                pattern_prefix(pattern),
                existing_suffix(with_write, with_delete)
            ),
            Scenario::Deletes {
                with_write,
                with_delete,
                pattern,
            } => write!(
                f,
                "{}Delete{}",
                pattern_prefix(pattern),
                existing_suffix(with_write, with_delete)
            ),
            Scenario::Bulkload { write_ops, pattern } => write!(
                f,
                "{}Bulkload{}",
                pattern_prefix(pattern),
                write_ops_suffix(write_ops)
            ),
            Scenario::SnapshotRead => f.write_str("SnapshotReadWithWrite"),
            Scenario::SnapshotScan { write_ops, pattern } => write!(
                f,
                "{}SnapshotScan{}",
                pattern_prefix(pattern),
                write_ops_suffix(write_ops)
            ),
            Scenario::ConcurrentSmos => f.write_str("ConcurrentSMOs"),
            Scenario::Sequential(scenario) => write!(f, "SingleThread{scenario}"),
        }
    }
}

impl fmt::Display for SequentialScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shuffle_prefix = |shuffled: bool| if shuffled { "Random" } else { "" };
        match *self {
            SequentialScenario::Construct { records } => {
                let kind = match records {
                    REC_NUM_WITHOUT_SMOS => "WithoutSMOs".to_string(),
                    REC_NUM_WITH_LEAF_SMOS => "WithLeafSMOs".to_string(),
                    REC_NUM_WITH_INTERNAL_SMOS => "WithInternalSMOs".to_string(),
                    n => format!("With{n}Records"),
                };
                write!(f, "Construct{kind}")
            }
            SequentialScenario::ReadWithEmptyIndex => f.write_str("ReadWithEmptyIndexFail"),
            SequentialScenario::Scan { begin, end } => match (begin, end) {
                (None, None) => f.write_str("ScanWithoutKeysPerformFullScan"),
                (Some((_, true)), Some((_, true))) => {
                    f.write_str("ScanWithClosedRangeIncludeLeftRightEnd")
                }
                (Some((_, false)), Some((_, false))) => {
                    f.write_str("ScanWithOpenedRangeExcludeLeftRightEnd")
                }
                (begin, end) => write!(f, "ScanWithRange{begin:?}To{end:?}"),
            },
            SequentialScenario::Writes {
                write_twice,
                with_delete,
                shuffled,
            } => write!(
                f,
                "{}Write{}",
                shuffle_prefix(shuffled),
                rewrite_suffix(write_twice, with_delete, false)
            ),
            SequentialScenario::Inserts {
                write_twice,
                with_delete,
                shuffled,
            } => write!(
                f,
                "{}Insert{}",
                shuffle_prefix(shuffled),
                rewrite_suffix(write_twice, with_delete, true)
            ),
            SequentialScenario::Updates {
                with_write,
                with_delete,
                shuffled,
            } => write!(
                f,
                "{}Update{}",
                shuffle_prefix(shuffled),
                existing_suffix(with_write, with_delete)
            ),
            SequentialScenario::Deletes {
                with_write,
                with_delete,
                shuffled,
            } => write!(
                f,
                "{}Delete{}",
                shuffle_prefix(shuffled),
                existing_suffix(with_write, with_delete)
            ),
        }
    }
}
