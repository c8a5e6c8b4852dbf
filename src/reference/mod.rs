//! # Reference Collaborators
//!
//! Simple, obviously-correct implementations of the collaborator contracts,
//! used to exercise the harness itself and as a template for wiring a real
//! index into it.
//!
//! - [`EpochClock`]: an [`EpochManager`](crate::index::EpochManager) with a
//!   registry of pinned epochs.
//! - [`VersionedIndex`]: an ordered multi-version index supporting every
//!   operation, snapshots included.
//! - [`HashIndex`]: an unordered index with point operations only.

#[cfg(test)]
mod tests;

mod epoch;
mod hashed;
mod versioned;

pub use epoch::{EpochClock, EpochGuard};
pub use hashed::HashIndex;
pub use versioned::VersionedIndex;

use crate::index::StatusCode;

/// `insert` (or `bulkload`) of a key that is already live.
pub const KEY_EXISTS: StatusCode = 1;

/// `update` or `delete` of a key that is not live.
pub const KEY_NOT_EXIST: StatusCode = 2;

/// `bulkload` entries that are not strictly ascending.
pub const NOT_SORTED: StatusCode = 3;
