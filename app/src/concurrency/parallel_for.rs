// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bounded and resettable parallel-for: the pipeline engine's dynamic
//! work-sharing primitive. Items are collected up front; any participant
//! thread drains the shared queue by calling `contribute()` until it is
//! empty, and `wait()` blocks the caller until every item has been consumed.

use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

/// A one-shot work queue drained cooperatively by any number of threads.
pub struct ParallelForEach<T> {
    queue: SegQueue<T>,
    remaining: AtomicUsize,
    done: Mutex<bool>,
    cv: Condvar,
}

impl<T> ParallelForEach<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let queue = SegQueue::new();
        let mut count = 0usize;
        for item in items {
            queue.push(item);
            count += 1;
        }
        Self { queue, remaining: AtomicUsize::new(count), done: Mutex::new(count == 0), cv: Condvar::new() }
    }

    /// Drains the queue, calling `work` on every item this thread pops.
    /// Returns the number of items this call processed.
    pub fn contribute(&self, mut work: impl FnMut(T)) -> usize {
        let mut processed = 0;
        while let Some(item) = self.queue.pop() {
            work(item);
            processed += 1;
            if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let mut done = self.done.lock().unwrap();
                *done = true;
                self.cv.notify_all();
            }
        }
        processed
    }

    /// Blocks until every item has been drained by some participant.
    pub fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.cv.wait(done).unwrap();
        }
    }

    pub fn len(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reusable [`ParallelForEach`]: after a batch drains, `reset` installs a
/// fresh batch so the same queue/condvar pair can be reused across
/// wavefronts without reallocating.
pub struct ResettableParallelForEach<T> {
    inner: Mutex<ParallelForEach<T>>,
}

impl<T> ResettableParallelForEach<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self { inner: Mutex::new(ParallelForEach::new(items)) }
    }

    pub fn contribute(&self, work: impl FnMut(T)) -> usize {
        self.inner.lock().unwrap().contribute(work)
    }

    pub fn wait(&self) {
        self.inner.lock().unwrap().wait();
    }

    /// Replaces the current batch, once it has fully drained. Panics if
    /// called while the previous batch still has outstanding items — callers
    /// must `wait()` first.
    pub fn reset(&self, items: impl IntoIterator<Item = T>) {
        let mut guard = self.inner.lock().unwrap();
        assert!(guard.is_empty(), "reset() called before the previous batch drained");
        *guard = ParallelForEach::new(items);
    }
}
