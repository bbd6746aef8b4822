// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A single-shot guard: concurrent `call_once` invocations all block until
//! the single execution completes, then all return. Used for rate-limited
//! warnings and for the packer's per-`from`-context expansion tracker.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Once {
    done: AtomicBool,
    lock: Mutex<()>,
}

impl Once {
    pub fn new() -> Self {
        Self { done: AtomicBool::new(false), lock: Mutex::new(()) }
    }

    /// Runs `f` exactly once across however many threads call this
    /// concurrently; every caller returns only after the winning `f` has
    /// finished running.
    pub fn call_once(&self, f: impl FnOnce()) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.lock.lock();
        if self.done.load(Ordering::Acquire) {
            return;
        }
        f();
        self.done.store(true, Ordering::Release);
    }

    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}
