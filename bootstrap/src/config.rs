// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Bootstrap-phase configuration for a profile-processing run.
//!
//! ## Design Philosophy
//!
//! `Settings` holds **validated** configuration after:
//! 1. Loading an optional TOML config file
//! 2. Command-line argument parsing (CLI values win over file values)
//! 3. Default value application
//!
//! All configuration is immutable after creation, so it can be shared across
//! worker threads without further synchronization.
//!
//! ## Usage
//!
//! ```rust
//! use profkit_bootstrap::config::{Settings, LogLevel};
//! use std::path::PathBuf;
//!
//! let settings = Settings::builder()
//!     .team_size(8)
//!     .dir(PathBuf::from("/tmp/out"))
//!     .log_level(LogLevel::Info)
//!     .build()
//!     .expect("valid settings");
//!
//! println!("team_size = {}", settings.team_size());
//! ```

use std::path::{Path, PathBuf};

/// Log level configuration, gating `tracing` emission process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Fatal errors only; the process aborts after the message is written.
    Fatal,
    /// Unrecoverable-to-one-input errors.
    Error,
    /// Recoverable degradations (path fallback, partial classification, ...).
    Warn,
    #[default]
    /// Normal progress messages.
    Info,
    /// Chattier progress detail.
    Verbose,
    /// Per-rank diagnostic trace.
    Debug,
}

impl LogLevel {
    /// Convert to a `tracing::Level`. `Fatal` maps to `ERROR` — the abort
    /// behavior is handled by the caller, not by the tracing backend.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Fatal | LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Verbose => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// Which partial-statistic-derived variants to materialize per metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatKinds {
    pub sum: bool,
    pub mean: bool,
    pub min: bool,
    pub max: bool,
    pub stddev: bool,
    pub cfvar: bool,
}

impl Default for StatKinds {
    fn default() -> Self {
        Self {
            sum: true,
            mean: false,
            min: false,
            max: false,
            stddev: false,
            cfvar: false,
        }
    }
}

/// An ordered `(from_prefix, to_prefix)` substitution applied to resolvable
/// paths; the first entry whose `from_prefix` matches and whose substituted
/// path exists on disk wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSubstitution {
    pub from_prefix: String,
    pub to_prefix: String,
}

/// Validation failures for [`Settings`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("team_size must be at least 1")]
    ZeroTeamSize,
    #[error("output directory must not be empty")]
    EmptyOutputDir,
}

/// Immutable, validated run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    team_size: usize,
    dir: PathBuf,
    include_traces: bool,
    include_sources: bool,
    include_thread_local: bool,
    stats: StatKinds,
    dwarf_max_size: u64,
    foreign: bool,
    path_substitutions: Vec<PathSubstitution>,
    log_level: LogLevel,
    struct_dir: Option<PathBuf>,
}

impl Settings {
    /// Start building a [`Settings`] value.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn team_size(&self) -> usize {
        self.team_size
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn include_traces(&self) -> bool {
        self.include_traces
    }

    pub fn include_sources(&self) -> bool {
        self.include_sources
    }

    pub fn include_thread_local(&self) -> bool {
        self.include_thread_local
    }

    pub fn stats(&self) -> StatKinds {
        self.stats
    }

    pub fn dwarf_max_size(&self) -> u64 {
        self.dwarf_max_size
    }

    pub fn foreign(&self) -> bool {
        self.foreign
    }

    pub fn path_substitutions(&self) -> &[PathSubstitution] {
        &self.path_substitutions
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn struct_dir(&self) -> Option<&Path> {
        self.struct_dir.as_deref()
    }
}

/// Builder for [`Settings`]; mirrors the config-file-then-CLI-override
/// layering described by the bootstrap layer.
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    team_size: Option<usize>,
    dir: Option<PathBuf>,
    include_traces: bool,
    include_sources: bool,
    include_thread_local: bool,
    stats: StatKinds,
    dwarf_max_size: Option<u64>,
    foreign: bool,
    path_substitutions: Vec<PathSubstitution>,
    log_level: LogLevel,
    struct_dir: Option<PathBuf>,
}

impl SettingsBuilder {
    pub fn team_size(mut self, n: usize) -> Self {
        self.team_size = Some(n);
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn include_traces(mut self, yes: bool) -> Self {
        self.include_traces = yes;
        self
    }

    pub fn include_sources(mut self, yes: bool) -> Self {
        self.include_sources = yes;
        self
    }

    pub fn include_thread_local(mut self, yes: bool) -> Self {
        self.include_thread_local = yes;
        self
    }

    pub fn stats(mut self, stats: StatKinds) -> Self {
        self.stats = stats;
        self
    }

    pub fn dwarf_max_size(mut self, bytes: u64) -> Self {
        self.dwarf_max_size = Some(bytes);
        self
    }

    pub fn foreign(mut self, yes: bool) -> Self {
        self.foreign = yes;
        self
    }

    pub fn add_path_substitution(mut self, from_prefix: impl Into<String>, to_prefix: impl Into<String>) -> Self {
        self.path_substitutions.push(PathSubstitution {
            from_prefix: from_prefix.into(),
            to_prefix: to_prefix.into(),
        });
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn struct_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.struct_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<Settings, SettingsError> {
        let team_size = self.team_size.unwrap_or(1);
        if team_size == 0 {
            return Err(SettingsError::ZeroTeamSize);
        }
        let dir = self.dir.unwrap_or_default();
        if dir.as_os_str().is_empty() {
            return Err(SettingsError::EmptyOutputDir);
        }
        Ok(Settings {
            team_size,
            dir,
            include_traces: self.include_traces,
            include_sources: self.include_sources,
            include_thread_local: self.include_thread_local,
            stats: self.stats,
            dwarf_max_size: self.dwarf_max_size.unwrap_or(64 * 1024 * 1024),
            foreign: self.foreign,
            path_substitutions: self.path_substitutions,
            log_level: self.log_level,
            struct_dir: self.struct_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_team_size_is_one() {
        let settings = Settings::builder().dir("/tmp/out").build().unwrap();
        assert_eq!(settings.team_size(), 1);
    }

    #[test]
    fn zero_team_size_rejected() {
        let err = Settings::builder().team_size(0).dir("/tmp/out").build().unwrap_err();
        assert_eq!(err, SettingsError::ZeroTeamSize);
    }

    #[test]
    fn empty_dir_rejected() {
        let err = Settings::builder().team_size(4).build().unwrap_err();
        assert_eq!(err, SettingsError::EmptyOutputDir);
    }

    #[test]
    fn path_substitutions_preserve_order() {
        let settings = Settings::builder()
            .dir("/tmp/out")
            .add_path_substitution("/build", "/src")
            .add_path_substitution("/old", "/new")
            .build()
            .unwrap();
        assert_eq!(settings.path_substitutions()[0].from_prefix, "/build");
        assert_eq!(settings.path_substitutions()[1].from_prefix, "/old");
    }

    #[test]
    fn stat_kinds_default_is_sum_only() {
        let stats = StatKinds::default();
        assert!(stats.sum);
        assert!(!stats.mean);
        assert!(!stats.stddev);
    }
}
