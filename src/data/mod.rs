//! # Test Data Module
//!
//! Generates the key and payload datasets every scenario runs against.
//!
//! A [`DataKind`] bundles a concrete value type with the comparator used to
//! decide equality between two values of that type, mirroring how an index
//! under test is parameterised by a key type and a key comparator. Six kinds
//! are provided:
//!
//! | kind         | data type   | encoded length        |
//! |--------------|-------------|-----------------------|
//! | [`UInt8`]    | `u64`       | 8                     |
//! | [`Int8`]     | `i64`       | 8                     |
//! | [`UInt4`]    | `u32`       | 4                     |
//! | [`Ptr`]      | `Box<u64>`  | pointer width         |
//! | [`Var`]      | `Vec<u8>`   | number of bytes       |
//! | [`Original`] | [`Tagged`]  | 8                     |
//!
//! A [`Dataset`] owns `keys[0..n)` and `payloads[0..n)`. Value `i` of every
//! kind sorts at position `i`, so record ids double as key order.


use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use tracing::debug;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Number of ASCII digits in a generated variable-length value.
pub const VAR_DATA_DIGITS: usize = 11;

// ------------------------------------------------------------------------------------------------
// Comparators
// ------------------------------------------------------------------------------------------------

/// A strict-weak-ordering predicate over values of type `T`.
pub trait Comparator<T>: Send + Sync + 'static {
    /// Returns `true` if `a` sorts strictly before `b`.
    fn less(a: &T, b: &T) -> bool;
}

/// Orders values by their [`Ord`] implementation.
pub struct NaturalOrder<T>(PhantomData<fn() -> T>);

impl<T: Ord + 'static> Comparator<T> for NaturalOrder<T> {
    fn less(a: &T, b: &T) -> bool {
        a < b
    }
}

/// Orders boxed values by the value they point to.
pub struct PointeeOrder;

impl Comparator<Box<u64>> for PointeeOrder {
    fn less(a: &Box<u64>, b: &Box<u64>) -> bool {
        **a < **b
    }
}

/// Returns `true` if neither value sorts before the other under `C`.
pub fn is_equal<C, T>(a: &T, b: &T) -> bool
where
    C: Comparator<T>,
{
    !C::less(a, b) && !C::less(b, a)
}

// ------------------------------------------------------------------------------------------------
// Data kinds
// ------------------------------------------------------------------------------------------------

/// A family of test values: the concrete type, its comparator and how to
/// build value `i`.
pub trait DataKind: Send + Sync + 'static {
    /// The concrete value type handed to the index.
    type Data: Clone + Debug + Send + Sync + 'static;

    /// Comparator deciding equality between two values.
    type Comp: Comparator<Self::Data>;

    /// Whether values of this kind carry their length explicitly.
    const VAR_LEN: bool = false;

    /// Builds the `i`-th value. Values are strictly increasing in `i`.
    fn generate(i: usize) -> Self::Data;

    /// Returns the encoded length handed to the index next to `value`.
    fn encoded_len(_value: &Self::Data) -> usize {
        std::mem::size_of::<Self::Data>()
    }
}

/// Unsigned 8-byte integers.
pub struct UInt8;

impl DataKind for UInt8 {
    type Data = u64;
    type Comp = NaturalOrder<u64>;

    fn generate(i: usize) -> u64 {
        i as u64
    }
}

/// Signed 8-byte integers.
pub struct Int8;

impl DataKind for Int8 {
    type Data = i64;
    type Comp = NaturalOrder<i64>;

    fn generate(i: usize) -> i64 {
        i as i64
    }
}

/// Unsigned 4-byte integers.
pub struct UInt4;

impl DataKind for UInt4 {
    type Data = u32;
    type Comp = NaturalOrder<u32>;

    fn generate(i: usize) -> u32 {
        i as u32
    }
}

/// Heap-allocated integers compared through the pointer.
pub struct Ptr;

impl DataKind for Ptr {
    type Data = Box<u64>;
    type Comp = PointeeOrder;

    fn generate(i: usize) -> Box<u64> {
        Box::new(i as u64)
    }
}

/// Variable-length byte strings: zero-padded decimal digits.
pub struct Var;

impl DataKind for Var {
    type Data = Vec<u8>;
    type Comp = NaturalOrder<Vec<u8>>;

    const VAR_LEN: bool = true;

    fn generate(i: usize) -> Vec<u8> {
        format!("{i:0width$}", width = VAR_DATA_DIGITS).into_bytes()
    }

    fn encoded_len(value: &Vec<u8>) -> usize {
        value.len()
    }
}

/// User-defined, CAS-updatable values (see [`Tagged`]).
pub struct Original;

impl DataKind for Original {
    type Data = Tagged;
    type Comp = NaturalOrder<Tagged>;

    fn generate(i: usize) -> Tagged {
        Tagged::new(i as u64)
    }
}

// ------------------------------------------------------------------------------------------------
// Tagged value
// ------------------------------------------------------------------------------------------------

/// A word-sized value with 61 bits of data and 3 control bits.
///
/// Indexes that update payloads in place with compare-and-swap reserve the low
/// bits of a word for their own bookkeeping; this type models such payloads.
/// Ordering and equality only look at the data bits.
#[derive(Clone, Copy, Default)]
pub struct Tagged(u64);

impl Tagged {
    const CONTROL_BITS: u32 = 3;
    const DATA_MASK: u64 = u64::MAX >> Self::CONTROL_BITS;

    pub fn new(data: u64) -> Self {
        Self((data & Self::DATA_MASK) << Self::CONTROL_BITS)
    }

    pub fn data(&self) -> u64 {
        self.0 >> Self::CONTROL_BITS
    }

    pub fn control(&self) -> u8 {
        (self.0 & ((1 << Self::CONTROL_BITS) - 1)) as u8
    }

    /// Returns a copy with the control bits replaced (masked to 3 bits).
    pub fn with_control(self, bits: u8) -> Self {
        let mask = (1u64 << Self::CONTROL_BITS) - 1;
        Self((self.0 & !mask) | (bits as u64 & mask))
    }
}

impl PartialEq for Tagged {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
    }
}

impl Eq for Tagged {}

impl PartialOrd for Tagged {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tagged {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data().cmp(&other.data())
    }
}

impl Hash for Tagged {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data().hash(state);
    }
}

impl Debug for Tagged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tagged({})", self.data())
    }
}

// ------------------------------------------------------------------------------------------------
// Dataset
// ------------------------------------------------------------------------------------------------

/// Builds `count` values of kind `D`.
pub fn prepare_test_data<D: DataKind>(count: usize) -> Vec<D::Data> {
    (0..count).map(D::generate).collect()
}

/// The keys and payloads a scenario reads from.
///
/// Workers only ever borrow the dataset immutably, so it is shared across
/// threads without synchronisation.
pub struct Dataset<K: DataKind, V: DataKind> {
    keys: Vec<K::Data>,
    payloads: Vec<V::Data>,
}

impl<K: DataKind, V: DataKind> Dataset<K, V> {
    /// Generates `key_count` keys and `payload_count` payloads.
    pub fn prepare(key_count: usize, payload_count: usize) -> Self {
        debug!(key_count, payload_count, "preparing test data");
        Self {
            keys: prepare_test_data::<K>(key_count),
            payloads: prepare_test_data::<V>(payload_count),
        }
    }

    /// Releases the dataset. Consumes `self` so no worker can observe it afterwards.
    pub fn release(self) {
        debug!(
            key_count = self.keys.len(),
            payload_count = self.payloads.len(),
            "releasing test data"
        );
    }

    pub fn key(&self, id: usize) -> &K::Data {
        &self.keys[id]
    }

    pub fn payload(&self, id: usize) -> &V::Data {
        &self.payloads[id]
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn payload_count(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: DataKind, V: DataKind> Default for Dataset<K, V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            payloads: Vec::new(),
        }
    }
}
