// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the core pipeline and provides:
//!
//! - **Entry point** - CLI parsing and process lifecycle
//! - **Platform abstraction** - OS-specific operations (POSIX vs Windows)
//! - **Signal handling** - Graceful shutdown (SIGINT, SIGTERM)
//! - **Argument parsing** - CLI parse-then-validate
//! - **Configuration** - Layered settings (config file, then CLI overrides)
//! - **Error handling** - Unix exit code mapping
//! - **Shutdown coordination** - Cooperative cancellation across worker threads
//!
//! ## Module Structure
//!
//! - `platform` - OS abstraction (Unix/Windows)
//! - `signals` - Signal handling (SIGINT, SIGTERM)
//! - `cli` - Argument parsing and validation
//! - `config` - Run settings
//! - `exit_code` - Unix exit code enumeration
//! - `logger` - Bootstrap-specific logging
//! - `shutdown` - Shutdown coordination

pub mod cli;
pub mod config;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ParseError, ValidatedCli};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};

/// Bootstrap and parse CLI arguments
///
/// This is the main entry point for the bootstrap layer. It handles:
/// 1. CLI parsing with clap
/// 2. Validation (existence of input paths, numeric ranges)
/// 3. Returns validated configuration
///
/// The caller is responsible for:
/// - Running the application logic
/// - Mapping results to exit codes using `result_to_exit_code`
///
/// # Errors
///
/// Returns [`ParseError`] if CLI parsing or validation fails. Clap handles
/// `--help` and `--version` and exits the process itself.
pub fn bootstrap_cli() -> Result<ValidatedCli, ParseError> {
    cli::parse_and_validate()
}
