// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with a parse-then-validate design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parse_cli()                     │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Range / existence checks
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// Raw CLI arguments, as parsed by clap.
///
/// Mirrors the argument surface of the original profile-merging tool: one or
/// more profile directories/files, a team size, an output directory, path
/// substitutions, and classifier/statistics knobs.
#[derive(Debug, Parser)]
#[command(name = "profkit", about = "Merge sampling-profiler measurements into a calling-context-tree database", version)]
pub struct Cli {
    /// Profile directories or measurement files to process.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for profile.db / cct.db.
    #[arg(short = 'o', long = "output", default_value = "hpctoolkit-database")]
    pub output: PathBuf,

    /// Number of worker threads.
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Directory of load-module structure (classifier) files.
    #[arg(short = 'M', long = "struct")]
    pub struct_dir: Option<PathBuf>,

    /// Path substitution `FROM=TO`, may be repeated; applied in order.
    #[arg(short = 'I', long = "replace-path")]
    pub replace_path: Vec<String>,

    /// Treat out-of-allowlist paths as nonexistent rather than erroring.
    #[arg(long)]
    pub foreign: bool,

    /// Skip reading trace files even if present.
    #[arg(long)]
    pub no_traces: bool,

    /// Include per-source-file copies in the output (unused by the core
    /// writer, forwarded to the downstream source-copy tool).
    #[arg(long)]
    pub include_sources: bool,

    /// Retain thread-local (not just summary) metric values.
    #[arg(long, default_value_t = true)]
    pub include_thread_local: bool,

    /// Comma-separated derived statistics to compute: sum,mean,min,max,stddev,cfvar.
    #[arg(long, default_value = "sum")]
    pub stats: String,

    /// Maximum module size (bytes) for DWARF-based direct classification.
    #[arg(long, default_value = "67108864")]
    pub dwarf_max_size: String,

    /// Optional TOML configuration file; CLI flags override its values.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Per-rank debug trace logging.
    #[arg(long)]
    pub debug: bool,
}

/// Validated statistics selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidatedStats {
    pub sum: bool,
    pub mean: bool,
    pub min: bool,
    pub max: bool,
    pub stddev: bool,
    pub cfvar: bool,
}

/// Validated path substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubstitution {
    pub from_prefix: String,
    pub to_prefix: String,
}

/// Fully validated CLI configuration, ready to become a run [`crate::config::Settings`].
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub jobs: usize,
    pub struct_dir: Option<PathBuf>,
    pub replace_path: Vec<ValidatedSubstitution>,
    pub foreign: bool,
    pub include_traces: bool,
    pub include_sources: bool,
    pub include_thread_local: bool,
    pub stats: ValidatedStats,
    pub dwarf_max_size: u64,
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub debug: bool,
}

/// CLI parsing/validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("input path does not exist: {0}")]
    InputNotFound(String),

    #[error("no inputs given")]
    NoInputs,
}

/// Parse raw CLI arguments with clap.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse a `FROM=TO` path substitution argument.
fn parse_substitution(raw: &str) -> Result<ValidatedSubstitution, ParseError> {
    let (from, to) = raw.split_once('=').ok_or_else(|| ParseError::InvalidValue {
        arg: "replace-path".to_string(),
        reason: format!("expected FROM=TO, got `{raw}`"),
    })?;
    if from.is_empty() {
        return Err(ParseError::InvalidValue {
            arg: "replace-path".to_string(),
            reason: "FROM prefix must not be empty".to_string(),
        });
    }
    Ok(ValidatedSubstitution {
        from_prefix: from.to_string(),
        to_prefix: to.to_string(),
    })
}

/// Parse a comma-separated `--stats` list.
fn parse_stats(raw: &str) -> Result<ValidatedStats, ParseError> {
    let mut stats = ValidatedStats::default();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match entry {
            "sum" => stats.sum = true,
            "mean" => stats.mean = true,
            "min" => stats.min = true,
            "max" => stats.max = true,
            "stddev" => stats.stddev = true,
            "cfvar" => stats.cfvar = true,
            other => {
                return Err(ParseError::InvalidValue {
                    arg: "stats".to_string(),
                    reason: format!("unknown statistic `{other}`"),
                })
            }
        }
    }
    Ok(stats)
}

/// Parse and validate CLI arguments in one step.
///
/// # Errors
///
/// Returns [`ParseError`] if any argument fails validation. Clap handles
/// `--help`/`--version` and exits the process before this is reached.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

/// Validate parsed CLI arguments: existence of input paths, numeric ranges,
/// and well-formed substitution/statistics lists.
pub fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    if cli.inputs.is_empty() {
        return Err(ParseError::NoInputs);
    }
    for input in &cli.inputs {
        if !input.exists() {
            return Err(ParseError::InputNotFound(input.display().to_string()));
        }
    }

    let jobs = cli.jobs.unwrap_or(1);
    if jobs == 0 || jobs > 4096 {
        return Err(ParseError::InvalidValue {
            arg: "jobs".to_string(),
            reason: "must be between 1 and 4096".to_string(),
        });
    }

    if let Some(ref dir) = cli.struct_dir {
        if !dir.exists() {
            return Err(ParseError::InvalidValue {
                arg: "struct".to_string(),
                reason: format!("directory does not exist: {}", dir.display()),
            });
        }
    }

    let replace_path = cli
        .replace_path
        .iter()
        .map(|s| parse_substitution(s))
        .collect::<Result<Vec<_>, _>>()?;

    let stats = parse_stats(&cli.stats)?;

    let dwarf_max_size = byte_unit::Byte::parse_str(&cli.dwarf_max_size, true)
        .map_err(|e| ParseError::InvalidValue {
            arg: "dwarf-max-size".to_string(),
            reason: e.to_string(),
        })?
        .as_u64();

    Ok(ValidatedCli {
        inputs: cli.inputs,
        output: cli.output,
        jobs,
        struct_dir: cli.struct_dir,
        replace_path,
        foreign: cli.foreign,
        include_traces: !cli.no_traces,
        include_sources: cli.include_sources,
        include_thread_local: cli.include_thread_local,
        stats,
        dwarf_max_size,
        config: cli.config,
        verbose: cli.verbose,
        debug: cli.debug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stats_list() {
        let stats = parse_stats("sum,mean,stddev").unwrap();
        assert!(stats.sum);
        assert!(stats.mean);
        assert!(stats.stddev);
        assert!(!stats.min);
    }

    #[test]
    fn rejects_unknown_stat() {
        let err = parse_stats("sum,bogus").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn parses_path_substitution() {
        let sub = parse_substitution("/build/foo=/src/foo").unwrap();
        assert_eq!(sub.from_prefix, "/build/foo");
        assert_eq!(sub.to_prefix, "/src/foo");
    }

    #[test]
    fn rejects_substitution_without_equals() {
        let err = parse_substitution("/build/foo").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn rejects_empty_inputs() {
        let cli = Cli {
            inputs: vec![],
            output: PathBuf::from("out"),
            jobs: None,
            struct_dir: None,
            replace_path: vec![],
            foreign: false,
            no_traces: false,
            include_sources: false,
            include_thread_local: true,
            stats: "sum".to_string(),
            dwarf_max_size: "64MB".to_string(),
            config: None,
            verbose: false,
            debug: false,
        };
        assert_eq!(validate_cli(cli).unwrap_err(), ParseError::NoInputs);
    }

    #[test]
    fn rejects_nonexistent_input() {
        let cli = Cli {
            inputs: vec![PathBuf::from("/does/not/exist/hopefully")],
            output: PathBuf::from("out"),
            jobs: None,
            struct_dir: None,
            replace_path: vec![],
            foreign: false,
            no_traces: false,
            include_sources: false,
            include_thread_local: true,
            stats: "sum".to_string(),
            dwarf_max_size: "64MB".to_string(),
            config: None,
            verbose: false,
            debug: false,
        };
        assert!(matches!(validate_cli(cli), Err(ParseError::InputNotFound(_))));
    }
}
