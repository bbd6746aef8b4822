// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Typed userdata slots. Each entity type (Module, File, Function, Context,
//! Thread, Metric) carries a fixed set of extension slots — identifier,
//! classification result, resolved path, scoped-metric identifier pair —
//! installed by Finalizers at pipeline construction and lazily initialized
//! on first access.
//!
//! The set of slots is fixed before any entity exists: a [`SlotRegistry`]
//! accepts registrations only before [`SlotRegistry::freeze`], after which
//! it hands out a [`SlotSpace`] factory that every subsequently-created
//! entity uses to back its slots.

use once_cell::sync::OnceCell;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

type Initializer = Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// A handle to one registered slot, branded with the value type `T` so a
/// [`Slot<T>`] cannot be used to read a different type out of a
/// [`SlotSpace`].
pub struct Slot<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Slot<T> {}

/// Accepts slot registrations before [`freeze`](Self::freeze); rejects them
/// after.
pub struct SlotRegistry {
    initializers: Vec<Initializer>,
    frozen: bool,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self { initializers: Vec::new(), frozen: false }
    }

    /// Registers a new slot with a default-producing closure, returning a
    /// typed handle. Panics if called after [`freeze`](Self::freeze).
    pub fn register<T>(&mut self, default: impl Fn() -> T + Send + Sync + 'static) -> Slot<T>
    where
        T: Send + Sync + 'static,
    {
        assert!(!self.frozen, "cannot register a slot after the registry is frozen");
        let index = self.initializers.len();
        self.initializers.push(Box::new(move || Box::new(default()) as Box<dyn Any + Send + Sync>));
        Slot { index, _marker: PhantomData }
    }

    /// Freezes the registry: no further slots may be registered. Returns a
    /// factory for producing per-entity slot storage.
    pub fn freeze(mut self) -> SlotSpaceFactory {
        self.frozen = true;
        SlotSpaceFactory { initializers: Arc::new(self.initializers) }
    }
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces a [`SlotSpace`] for each new entity of one type.
#[derive(Clone)]
pub struct SlotSpaceFactory {
    initializers: Arc<Vec<Initializer>>,
}

impl SlotSpaceFactory {
    pub fn create(&self) -> SlotSpace {
        let mut cells = Vec::with_capacity(self.initializers.len());
        cells.resize_with(self.initializers.len(), OnceCell::new);
        SlotSpace { initializers: Arc::clone(&self.initializers), cells }
    }
}

/// Per-entity storage for every registered slot. Each cell initializes at
/// most once, on first access.
pub struct SlotSpace {
    initializers: Arc<Vec<Initializer>>,
    cells: Vec<OnceCell<Box<dyn Any + Send + Sync>>>,
}

impl SlotSpace {
    /// Returns the slot's value, running its registered initializer on
    /// first access.
    pub fn get_or_init<T: Send + Sync + 'static>(&self, slot: Slot<T>) -> &T {
        let cell = &self.cells[slot.index];
        let make = &self.initializers[slot.index];
        cell.get_or_init(make).downcast_ref::<T>().expect("slot type mismatch: registry corrupted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn slot_lazily_initializes_once() {
        let mut registry = SlotRegistry::new();
        let call_count = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&call_count);
        let id_slot: Slot<u32> = registry.register(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            7
        });
        let factory = registry.freeze();
        let space = factory.create();

        assert_eq!(*space.get_or_init(id_slot), 7);
        assert_eq!(*space.get_or_init(id_slot), 7);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_slots_are_independent() {
        let mut registry = SlotRegistry::new();
        let a: Slot<u32> = registry.register(|| 1);
        let b: Slot<String> = registry.register(|| "x".to_string());
        let factory = registry.freeze();
        let space = factory.create();

        assert_eq!(*space.get_or_init(a), 1);
        assert_eq!(space.get_or_init(b), "x");
    }

    #[test]
    fn distinct_entities_have_independent_storage() {
        let mut registry = SlotRegistry::new();
        let slot: Slot<u32> = registry.register(|| 0);
        let factory = registry.freeze();

        let space1 = factory.create();
        let space2 = factory.create();
        assert_eq!(*space1.get_or_init(slot), 0);
        assert_eq!(*space2.get_or_init(slot), 0);
    }
}
