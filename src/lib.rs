//! # indexfixture
//!
//! A multi-threaded **correctness-test harness** for concurrent key-value
//! indexes (B-trees, hash indexes, skip-lists) that reclaim memory with
//! **epoch-based reclamation**.
//!
//! The harness drives an index from many worker threads at once, with
//! deterministic but varied access patterns, and checks every observable
//! result against reference data it tracks itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use indexfixture::data::UInt8;
//! use indexfixture::reference::VersionedIndex;
//! use indexfixture::workload::AccessPattern;
//! use indexfixture::{HarnessConfig, IndexFixture};
//!
//! let config = HarnessConfig {
//!     thread_count: 4,
//!     exec_count: 64,
//!     ..HarnessConfig::default()
//! };
//!
//! let mut fixture =
//!     IndexFixture::<UInt8, UInt8, VersionedIndex<u64, u64>>::new(config).unwrap();
//!
//! // Write every record twice, then read and scan everything back.
//! let outcome = fixture
//!     .verify_writes_with(true, false, AccessPattern::Random)
//!     .unwrap();
//! assert!(outcome.is_passed());
//! ```
//!
//! ## Components
//!
//! - [`data`]: key and payload datasets, comparators.
//! - [`index`]: the contracts an index and its epoch manager implement.
//! - [`capability`]: which optional operations an index supports.
//! - [`barrier`]: spawning workers and starting them at one instant.
//! - [`workload`]: disjoint per-worker record partitions.
//! - [`suite`]: multi-threaded verification scenarios.
//! - [`smo`]: the concurrent structure-modification stress test.
//! - [`sequential`]: single-threaded verification scenarios.
//! - [`scenarios`]: the named scenario catalog.
//! - [`reference`]: a reference epoch manager and reference indexes.
//! - [`report`]: violations and scenario outcomes.

pub mod barrier;
pub mod capability;
pub mod data;
pub mod index;
pub mod reference;
pub mod report;
pub mod scenarios;
pub mod sequential;
pub mod smo;
pub mod suite;
pub mod workload;

use std::time::Duration;

use thiserror::Error;

pub use capability::{CapabilitySet, OpOutcome, Operation};
pub use index::{EpochManager, IndexUnderTest};
pub use report::{Outcome, Skip, Violation};
pub use sequential::SequentialFixture;
pub use suite::IndexFixture;

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Environment variable overriding [`HarnessConfig::thread_count`].
pub const THREAD_NUM_ENV: &str = "INDEX_FIXTURE_THREAD_NUM";

/// Environment variable overriding [`HarnessConfig::exec_count`].
pub const EXEC_NUM_ENV: &str = "INDEX_FIXTURE_EXEC_NUM";

/// Environment variable overriding [`HarnessConfig::repeat_count`].
pub const REPEAT_NUM_ENV: &str = "INDEX_FIXTURE_REPEAT_NUM";

/// Configuration shared by every fixture.
///
/// All fields have defaults via [`HarnessConfig::default()`]; fixtures
/// validate the configuration when they are built.
///
/// # Example
///
/// ```rust
/// use indexfixture::HarnessConfig;
///
/// let config = HarnessConfig {
///     thread_count: 4,
///     exec_count: 128,
///     ..HarnessConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of worker threads per phase.
    ///
    /// Default: 8. Must be ≥ 1. Snapshot scenarios need ≥ 2 and the SMO stress
    /// test a multiple of 4; other values make those scenarios not applicable.
    pub thread_count: usize,

    /// Number of records each worker targets per phase.
    ///
    /// Default: 1000. Must be ≥ 1.
    pub exec_count: usize,

    /// Number of rounds of the concurrent SMO stress test.
    ///
    /// Default: 5. Must be ≥ 1.
    pub repeat_count: usize,

    /// How long the driver waits after spawning workers before starting them.
    ///
    /// Default: 100 ms.
    pub thread_creation_grace: Duration,

    /// Epoch interval handed to the index when it is built.
    ///
    /// Default: 1000 µs. Must be non-zero.
    pub epoch_interval: Duration,

    /// Seed for every random access sequence.
    ///
    /// Default: 10.
    pub random_seed: u64,

    /// Upper bound on records written by single-threaded scenarios.
    ///
    /// Default: 1 000 000. Must be ≥ 30.
    pub sequential_max_records: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            thread_count: 8,
            exec_count: 1000,
            repeat_count: 5,
            thread_creation_grace: Duration::from_millis(100),
            epoch_interval: Duration::from_micros(1000),
            random_seed: 10,
            sequential_max_records: 1_000_000,
        }
    }
}

impl HarnessConfig {
    /// Defaults, overridden by `INDEX_FIXTURE_THREAD_NUM`,
    /// `INDEX_FIXTURE_EXEC_NUM` and `INDEX_FIXTURE_REPEAT_NUM` when set.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let mut config = Self::default();
        if let Some(n) = env_usize(&lookup, THREAD_NUM_ENV)? {
            config.thread_count = n;
        }
        if let Some(n) = env_usize(&lookup, EXEC_NUM_ENV)? {
            config.exec_count = n;
        }
        if let Some(n) = env_usize(&lookup, REPEAT_NUM_ENV)? {
            config.repeat_count = n;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates all configuration parameters.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.thread_count < 1 {
            return Err(HarnessError::InvalidConfig(
                "thread_count must be >= 1".into(),
            ));
        }
        if self.exec_count < 1 {
            return Err(HarnessError::InvalidConfig("exec_count must be >= 1".into()));
        }
        if self.repeat_count < 1 {
            return Err(HarnessError::InvalidConfig(
                "repeat_count must be >= 1".into(),
            ));
        }
        if self.epoch_interval.is_zero() {
            return Err(HarnessError::InvalidConfig(
                "epoch_interval must be non-zero".into(),
            ));
        }
        if self.sequential_max_records < sequential::REC_NUM_WITHOUT_SMOS {
            return Err(HarnessError::InvalidConfig(format!(
                "sequential_max_records must be >= {}",
                sequential::REC_NUM_WITHOUT_SMOS
            )));
        }
        Ok(())
    }

    /// Number of keys (and payloads) in a multi-threaded dataset.
    pub fn key_count(&self) -> usize {
        (self.exec_count + 2) * self.thread_count
    }
}

fn env_usize<F>(lookup: &F, name: &str) -> Result<Option<usize>, HarnessError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    match lookup(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HarnessError::InvalidConfig(format!("{name} must be an integer, got {raw:?}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(HarnessError::InvalidConfig(format!(
            "{name} is not valid unicode"
        ))),
    }
}

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors that stop the harness itself, as opposed to [`Violation`]s of the
/// index under test.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid configuration parameter.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A scenario was requested with a combination of parameters that makes
    /// no sense; this is a bug in the caller, not in the index.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}
