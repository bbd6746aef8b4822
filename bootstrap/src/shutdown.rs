// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Manages graceful shutdown across application worker threads.
//!
//! ## Design Pattern
//!
//! The shutdown coordinator provides:
//! - **Cancellation tokens** for propagating shutdown signals to worker threads
//! - **Grace period** with timeout enforcement
//! - **Atomic state** for shutdown tracking
//!
//! ## Usage
//!
//! ```rust
//! use profkit_bootstrap::shutdown::ShutdownCoordinator;
//! use std::time::Duration;
//!
//! let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
//! let token = coordinator.token();
//!
//! std::thread::spawn(move || {
//!     while !token.is_cancelled() {
//!         // do work
//!         std::thread::sleep(Duration::from_millis(10));
//!     }
//! });
//!
//! coordinator.initiate_shutdown();
//! coordinator.wait_for_shutdown();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Default grace period for graceful shutdown (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// Cancellation token for signaling shutdown
///
/// Lightweight clone-able token passed to worker threads.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<(Mutex<()>, Condvar)>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new((Mutex::new(()), Condvar::new())),
        }
    }

    /// Cancel this token, waking any thread blocked in `cancelled()`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let (lock, cvar) = &*self.notify;
        let _guard = lock.lock().unwrap();
        cvar.notify_all();
    }

    /// Check if cancelled (non-blocking)
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block the calling thread until cancelled.
    pub fn wait_cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let (lock, cvar) = &*self.notify;
        let mut guard = lock.lock().unwrap();
        while !self.is_cancelled() {
            guard = cvar.wait(guard).unwrap();
        }
    }

    /// Block the calling thread until cancelled or `timeout` elapses.
    /// Returns `true` if cancelled before the timeout.
    pub fn wait_cancelled_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &*self.notify;
        let guard = lock.lock().unwrap();
        let (_guard, result) = cvar.wait_timeout_while(guard, timeout, |_| !self.is_cancelled()).unwrap();
        !result.timed_out()
    }
}

/// Shutdown coordinator
///
/// Manages graceful shutdown with grace period and timeout enforcement.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
    shutdown_initiated: Arc<AtomicBool>,
    complete: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    ///
    /// # Arguments
    ///
    /// * `grace_period` - Maximum time to wait for graceful shutdown
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            complete: CancellationToken::new(),
        }
    }

    /// Get a cancellation token
    ///
    /// Tokens can be cloned and passed to worker threads for shutdown signaling.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Initiate graceful shutdown
    ///
    /// This will:
    /// 1. Set shutdown initiated flag
    /// 2. Cancel all tokens
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("Initiating graceful shutdown (grace period: {:?})", self.grace_period);
            self.token.cancel();
        }
    }

    /// Wait for shutdown to complete or timeout
    ///
    /// Returns `true` if shutdown completed within grace period,
    /// `false` if timeout occurred.
    pub fn wait_for_shutdown(&self) -> bool {
        if !self.is_shutting_down() {
            tracing::warn!("wait_for_shutdown called but shutdown not initiated");
            return true;
        }

        let completed = self.complete.wait_cancelled_timeout(self.grace_period);
        if completed {
            tracing::info!("Shutdown completed gracefully");
        } else {
            tracing::warn!("Shutdown grace period expired, forcing shutdown");
        }
        completed
    }

    /// Signal that shutdown is complete
    ///
    /// Call this after all cleanup is done to release waiters.
    pub fn complete_shutdown(&self) {
        self.complete.cancel();
    }

    /// Wait for shutdown with a custom timeout
    pub fn wait_with_timeout(&self, timeout: Duration) -> bool {
        if !self.is_shutting_down() {
            return true;
        }
        self.complete.wait_cancelled_timeout(timeout)
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_create() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_cancelled_already() {
        let token = CancellationToken::new();
        token.cancel();
        token.wait_cancelled();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_cancelled_wait() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token_clone.cancel();
        });

        token.wait_cancelled();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_shutdown_coordinator_create() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        assert!(!coordinator.is_shutting_down());
    }

    #[test]
    fn test_shutdown_coordinator_default() {
        let coordinator = ShutdownCoordinator::default();
        assert!(!coordinator.is_shutting_down());
    }

    #[test]
    fn test_shutdown_coordinator_initiate() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        coordinator.initiate_shutdown();
        assert!(coordinator.is_shutting_down());
        assert!(coordinator.token().is_cancelled());
    }

    #[test]
    fn test_shutdown_coordinator_token() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let token = coordinator.token();

        assert!(!token.is_cancelled());

        coordinator.initiate_shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_shutdown_coordinator_complete() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));

        coordinator.initiate_shutdown();

        let coordinator_clone = coordinator.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            coordinator_clone.complete_shutdown();
        });

        assert!(coordinator.wait_for_shutdown());
    }

    #[test]
    fn test_shutdown_coordinator_timeout() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));

        coordinator.initiate_shutdown();
        // Don't call complete_shutdown - let it timeout

        assert!(!coordinator.wait_for_shutdown());
    }

    #[test]
    fn test_shutdown_coordinator_wait_custom_timeout() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(10));

        coordinator.initiate_shutdown();

        assert!(!coordinator.wait_with_timeout(Duration::from_millis(50)));
    }
}
