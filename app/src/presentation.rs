// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Wires the `profkit-bootstrap` CLI/config layer to this crate's pipeline:
//! translates a validated command line into a [`Settings`] value and
//! dispatches to [`crate::application::process`].

use profkit_bootstrap::cli::ValidatedCli;
use profkit_bootstrap::config::{LogLevel, Settings, StatKinds};
use profkit_domain::error::FatalError;

/// Runs one merge of `cli`'s input paths into its configured output
/// directory.
pub fn run(cli: ValidatedCli) -> Result<(), FatalError> {
    let settings = build_settings(&cli)?;
    crate::application::process(&settings, &cli.inputs)
}

fn build_settings(cli: &ValidatedCli) -> Result<Settings, FatalError> {
    let log_level = match (cli.debug, cli.verbose) {
        (true, _) => LogLevel::Debug,
        (false, true) => LogLevel::Verbose,
        (false, false) => LogLevel::Info,
    };

    let stats = StatKinds {
        sum: cli.stats.sum,
        mean: cli.stats.mean,
        min: cli.stats.min,
        max: cli.stats.max,
        stddev: cli.stats.stddev,
        cfvar: cli.stats.cfvar,
    };

    let mut builder = Settings::builder()
        .team_size(cli.jobs)
        .dir(cli.output.clone())
        .include_traces(cli.include_traces)
        .include_sources(cli.include_sources)
        .include_thread_local(cli.include_thread_local)
        .stats(stats)
        .dwarf_max_size(cli.dwarf_max_size)
        .foreign(cli.foreign)
        .log_level(log_level);

    if let Some(struct_dir) = &cli.struct_dir {
        builder = builder.struct_dir(struct_dir.clone());
    }
    for sub in &cli.replace_path {
        builder = builder.add_path_substitution(sub.from_prefix.clone(), sub.to_prefix.clone());
    }

    builder.build().map_err(|e| FatalError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_bootstrap::cli::{ValidatedStats, ValidatedSubstitution};
    use std::path::{Path, PathBuf};

    fn validated_cli() -> ValidatedCli {
        ValidatedCli {
            inputs: vec![PathBuf::from("measurements")],
            output: PathBuf::from("out"),
            jobs: 4,
            struct_dir: Some(PathBuf::from("structs")),
            replace_path: vec![ValidatedSubstitution { from_prefix: "/build".to_string(), to_prefix: "/src".to_string() }],
            foreign: false,
            include_traces: true,
            include_sources: false,
            include_thread_local: true,
            stats: ValidatedStats { sum: true, mean: true, min: false, max: false, stddev: false, cfvar: false },
            dwarf_max_size: 1024,
            config: None,
            verbose: true,
            debug: false,
        }
    }

    #[test]
    fn translates_every_field_onto_settings() {
        let settings = build_settings(&validated_cli()).unwrap();
        assert_eq!(settings.team_size(), 4);
        assert_eq!(settings.dir(), Path::new("out"));
        assert!(settings.include_traces());
        assert!(!settings.include_sources());
        assert_eq!(settings.struct_dir(), Some(PathBuf::from("structs").as_path()));
        assert_eq!(settings.path_substitutions().len(), 1);
        assert_eq!(settings.log_level(), LogLevel::Verbose);
        assert!(settings.stats().mean);
    }

    #[test]
    fn debug_flag_wins_over_verbose() {
        let mut cli = validated_cli();
        cli.debug = true;
        let settings = build_settings(&cli).unwrap();
        assert_eq!(settings.log_level(), LogLevel::Debug);
    }
}
