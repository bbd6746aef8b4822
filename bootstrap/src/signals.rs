// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # System Signal Handling
//!
//! Cross-platform signal handling for graceful shutdown, built on `ctrlc`
//! rather than an async runtime since the pipeline itself runs on plain OS
//! threads.
//!
//! ## Supported Signals
//!
//! - **SIGINT** (2) / Ctrl+C - User interrupt
//! - **SIGTERM** (15) - Graceful shutdown request (Unix only)
//!
//! ## Design Pattern
//!
//! The signal handler provides:
//! - **Trait abstraction** for testing
//! - **Callback-based** shutdown initiation, invoked from the signal thread

use std::sync::Arc;

/// Callback type for shutdown notification
pub type ShutdownCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// System signal handling trait
///
/// Abstracts platform-specific signal handling for graceful shutdown.
pub trait SystemSignals: Send + Sync {
    /// Install a handler that invokes `on_shutdown` when SIGINT (and, on
    /// Unix, SIGTERM) is received. Returns once the handler is installed;
    /// the callback fires later, from the signal-handling thread.
    fn install(&self, on_shutdown: ShutdownCallback) -> Result<(), SignalError>;
}

/// Error installing a signal handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to install signal handler: {0}")]
    Install(String),
}

/// `ctrlc`-backed signal handler implementation.
///
/// Handles SIGINT on all platforms and additionally SIGTERM/SIGHUP on Unix.
pub struct CtrlcSignalHandler;

impl CtrlcSignalHandler {
    /// Create a new signal handler.
    pub fn new() -> Self {
        Self
    }
}

impl Default for CtrlcSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSignals for CtrlcSignalHandler {
    fn install(&self, on_shutdown: ShutdownCallback) -> Result<(), SignalError> {
        ctrlc::set_handler(move || {
            tracing::info!("Received interrupt signal, initiating graceful shutdown");
            on_shutdown();
        })
        .map_err(|e| SignalError::Install(e.to_string()))
    }
}

/// No-op signal handler for testing
///
/// Never installs a real handler, allowing tests to control shutdown
/// explicitly.
#[derive(Default)]
pub struct NoOpSignalHandler;

impl NoOpSignalHandler {
    /// Create a new no-op signal handler
    pub fn new() -> Self {
        Self
    }
}

impl SystemSignals for NoOpSignalHandler {
    fn install(&self, _on_shutdown: ShutdownCallback) -> Result<(), SignalError> {
        Ok(())
    }
}

/// Create the platform-specific signal handler
pub fn create_signal_handler() -> Box<dyn SystemSignals> {
    Box::new(CtrlcSignalHandler::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_noop_signal_handler() {
        let handler = NoOpSignalHandler::new();
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        handler
            .install(Arc::new(move || {
                called_clone.store(true, Ordering::SeqCst);
            }))
            .unwrap();

        // No-op never invokes the callback.
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_create_signal_handler() {
        // Just verify it constructs without panicking; installing a real
        // ctrlc handler from a test process is left to integration tests.
        let _handler = create_signal_handler();
    }
}
