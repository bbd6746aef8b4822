// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entry point: parse and validate the CLI, initialize `tracing` at the
//! resolved log level, run the pipeline, and map the result to a process
//! exit code.

use profkit::presentation;
use profkit_bootstrap::{bootstrap_cli, result_to_exit_code, ExitCode};

fn main() -> std::process::ExitCode {
    let cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("profkit: {err}");
            return std::process::ExitCode::from(ExitCode::UsageError.as_i32() as u8);
        }
    };

    tracing_subscriber::fmt().with_max_level(cli_log_level(&cli)).init();

    result_to_exit_code(presentation::run(cli))
}

fn cli_log_level(cli: &profkit_bootstrap::ValidatedCli) -> tracing::Level {
    if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    }
}
