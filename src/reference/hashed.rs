//! Unordered, single-version reference index.
//!
//! Supports point operations only. It exists so that scenarios needing scans,
//! snapshots or bulk loads have something to be skipped against.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;

use super::epoch::EpochClock;
use super::{KEY_EXISTS, KEY_NOT_EXIST};
use crate::capability::{CapabilitySet, Operation};
use crate::index::{IndexUnderTest, SUCCESS, StatusCode};

pub struct HashIndex<K, V> {
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> HashIndex<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for HashIndex<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> IndexUnderTest<K, V> for HashIndex<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Epochs = EpochClock;

    const CAPABILITIES: CapabilitySet = CapabilitySet::NONE
        .with(Operation::Write)
        .with(Operation::Insert)
        .with(Operation::Update)
        .with(Operation::Delete);

    fn open(_epochs: Arc<EpochClock>, _epoch_interval: Duration) -> Self {
        debug!("opening hash reference index");
        Self::new()
    }

    fn read(&self, key: &K, _key_len: usize) -> Option<V> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &K, payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), payload.clone());
        SUCCESS
    }

    fn insert(&self, key: &K, payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        match map.entry(key.clone()) {
            Entry::Occupied(_) => KEY_EXISTS,
            Entry::Vacant(slot) => {
                slot.insert(payload.clone());
                SUCCESS
            }
        }
    }

    fn update(&self, key: &K, payload: &V, _key_len: usize, _pay_len: usize) -> StatusCode {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(key) {
            Some(slot) => {
                *slot = payload.clone();
                SUCCESS
            }
            None => KEY_NOT_EXIST,
        }
    }

    fn delete(&self, key: &K, _key_len: usize) -> StatusCode {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        match map.remove(key) {
            Some(_) => SUCCESS,
            None => KEY_NOT_EXIST,
        }
    }
}
