// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Semantic configuration validation beyond what `Settings::builder().build()`
//! and CLI parsing already enforce. A [`Settings`] value can also be built
//! straight from a deserialized config file (bypassing the CLI's
//! existence/range checks), so this runs again before a process starts.

use std::path::PathBuf;

use profkit_bootstrap::config::Settings;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--foreign requires at least one --replace-path substitution, otherwise every path is rejected as foreign")]
    ForeignWithoutSubstitutions,

    #[error("dwarfMaxSize is zero, disabling direct (DWARF) classification for every module")]
    ZeroDwarfMaxSize,

    #[error("struct directory does not exist: {0}")]
    StructDirMissing(PathBuf),
}

/// Checks cross-field invariants `Settings::builder().build()` can't, since
/// it validates each field in isolation.
pub fn validate_config(settings: &Settings) -> Result<(), ConfigError> {
    if settings.foreign() && settings.path_substitutions().is_empty() {
        return Err(ConfigError::ForeignWithoutSubstitutions);
    }
    if settings.dwarf_max_size() == 0 {
        return Err(ConfigError::ZeroDwarfMaxSize);
    }
    if let Some(dir) = settings.struct_dir() {
        if !dir.exists() {
            return Err(ConfigError::StructDirMissing(dir.to_path_buf()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_without_substitutions_is_rejected() {
        let settings = Settings::builder().dir("/tmp/out").foreign(true).build().unwrap();
        assert_eq!(validate_config(&settings), Err(ConfigError::ForeignWithoutSubstitutions));
    }

    #[test]
    fn foreign_with_a_substitution_passes() {
        let settings = Settings::builder()
            .dir("/tmp/out")
            .foreign(true)
            .add_path_substitution("/build", "/src")
            .build()
            .unwrap();
        assert_eq!(validate_config(&settings), Ok(()));
    }

    #[test]
    fn zero_dwarf_max_size_is_rejected() {
        let settings = Settings::builder().dir("/tmp/out").dwarf_max_size(0).build().unwrap();
        assert_eq!(validate_config(&settings), Err(ConfigError::ZeroDwarfMaxSize));
    }

    #[test]
    fn missing_struct_dir_is_rejected() {
        let settings = Settings::builder().dir("/tmp/out").struct_dir("/does/not/exist/hopefully").build().unwrap();
        assert_eq!(validate_config(&settings), Err(ConfigError::StructDirMissing(PathBuf::from("/does/not/exist/hopefully"))));
    }

    #[test]
    fn default_settings_pass() {
        let settings = Settings::builder().dir("/tmp/out").build().unwrap();
        assert_eq!(validate_config(&settings), Ok(()));
    }
}
