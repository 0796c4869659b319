// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key to many-values map used for vertex adjacency.

use std::hash::Hash;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Most vertices touch a handful of triangles and have at most one or two
/// seam twins, so values stay inline until they outgrow this.
const INLINE_VALUES: usize = 6;

/// Map from a key to an ordered list of values.
///
/// Values keep insertion order and repeats are kept: inserting the same pair
/// twice stores it twice.
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    map: FxHashMap<K, SmallVec<[V; INLINE_VALUES]>>,
    value_count: usize,
}

impl<K, V> MultiMap<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    pub fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            value_count: 0,
        }
    }

    /// Create a map with room for `keys` distinct keys
    pub fn with_capacity(keys: usize) -> Self {
        Self {
            map: FxHashMap::with_capacity_and_hasher(keys, Default::default()),
            value_count: 0,
        }
    }

    /// Append a value to the list stored under `key`
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        self.map.entry(key).or_default().push(value);
        self.value_count += 1;
    }

    /// Values stored under `key`, empty if the key is absent
    #[inline]
    pub fn get(&self, key: &K) -> &[V] {
        self.map.get(key).map(|values| values.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// True if `value` is stored under `key`
    #[inline]
    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.get(key).contains(value)
    }

    /// Number of distinct keys
    #[inline]
    pub fn key_count(&self) -> usize {
        self.map.len()
    }

    /// Number of stored values across all keys
    #[inline]
    pub fn len(&self) -> usize {
        self.value_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> {
        self.map.iter().map(|(k, values)| (k, values.as_slice()))
    }
}

impl<K, V> Default for MultiMap<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
