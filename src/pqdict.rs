// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Keyed min-heap (priority dictionary): a map from key to integer priority
// supporting O(log n) insert/update and O(1) peek-minimum.
//
// Pairs a `BTreeMap<priority, set of keys>` with a `HashMap<key, priority>`
// index — the index lets `set` find and remove a key's old priority bucket
// before inserting the new one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use crate::Timestamp;

#[derive(Debug, Clone, Default)]
pub struct PqDict<K> {
    by_priority: BTreeMap<Timestamp, HashSet<K>>,
    by_key: HashMap<K, Timestamp>,
}

impl<K: Clone + Eq + Hash> PqDict<K> {
    pub fn new() -> Self {
        Self { by_priority: BTreeMap::new(), by_key: HashMap::new() }
    }

    /// Insert or update `key`'s priority. Idempotent when called with the
    /// same priority again.
    pub fn set(&mut self, key: K, priority: Timestamp) {
        if let Some(&old) = self.by_key.get(&key) {
            if old == priority {
                return;
            }
            if let Some(bucket) = self.by_priority.get_mut(&old) {
                bucket.remove(&key);
                if bucket.is_empty() {
                    self.by_priority.remove(&old);
                }
            }
        }
        self.by_key.insert(key.clone(), priority);
        self.by_priority.entry(priority).or_default().insert(key);
    }

    /// The minimum priority currently held, and one key holding it.
    /// Tie-breaking among keys sharing the minimum is unspecified.
    pub fn peek(&self) -> Option<(K, Timestamp)> {
        let (&priority, bucket) = self.by_priority.iter().next()?;
        let key = bucket.iter().next()?.clone();
        Some((key, priority))
    }

    /// The priority currently stored for `key`, if any.
    pub fn get(&self, key: &K) -> Option<Timestamp> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
