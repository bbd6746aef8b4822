// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A generic locked uniquing container: inserts a canonical entity for a
//! given key and returns `(reference, inserted?)`. Every uniqued collection
//! in the data model (modules by path, files by path, metrics by settings,
//! threads by identifier tuple, a Context's children by NestedScope) is
//! built on this.
//!
//! Entities are heap-allocated once and never moved or removed; callers hold
//! `Arc<V>` handles that stay valid for the container's lifetime. Writes
//! serialize on a single mutex; once inserted, an entry's value is immutable
//! and readable without taking the lock again.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

pub struct UniqueSet<K, V> {
    inner: Mutex<HashMap<K, Arc<V>>>,
}

impl<K, V> UniqueSet<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    /// Returns the existing entry for `key`, or builds one with `make` and
    /// inserts it. The `bool` is `true` exactly when `make` ran.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> (Arc<V>, bool) {
        let mut guard = self.inner.lock();
        if let Some(existing) = guard.get(&key) {
            return (Arc::clone(existing), false);
        }
        let value = Arc::new(make());
        guard.insert(key, Arc::clone(&value));
        (value, true)
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every value currently in the set, in unspecified order.
    pub fn values(&self) -> Vec<Arc<V>> {
        self.inner.lock().values().cloned().collect()
    }
}

impl<K, V> Default for UniqueSet<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn second_insert_reuses_first() {
        let set: UniqueSet<String, u32> = UniqueSet::new();
        let (a, inserted_a) = set.get_or_insert_with("x".to_string(), || 1);
        let (b, inserted_b) = set.get_or_insert_with("x".to_string(), || 2);
        assert!(inserted_a);
        assert!(!inserted_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, 1);
    }

    #[test]
    fn concurrent_inserts_produce_one_canonical_entity() {
        let set: Arc<UniqueSet<u32, AtomicUsize>> = Arc::new(UniqueSet::new());
        let make_count = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let set = Arc::clone(&set);
                let make_count = Arc::clone(&make_count);
                scope.spawn(move || {
                    set.get_or_insert_with(42, || {
                        make_count.fetch_add(1, Ordering::SeqCst);
                        AtomicUsize::new(0)
                    });
                });
            }
        });

        assert_eq!(set.len(), 1);
        assert_eq!(make_count.load(Ordering::SeqCst), 1);
    }
}
