// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Error categories for calling-context-tree profile processing, ordered by
//! the severity tiers a run distinguishes: fatal (process aborts), error
//! (one input is abandoned, the run continues), and warning (recorded and
//! the run continues unaffected).

use thiserror::Error;

/// Errors that abandon a single input (measurement directory, trace file,
/// structure file) but allow the overall run to continue with the rest.
#[derive(Error, Debug, Clone)]
pub enum ProfError {
    #[error("invalid measurement header: {0}")]
    InvalidHeader(String),

    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("malformed record at offset {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("path resolution failed: {0}")]
    PathResolution(String),

    #[error("id packing failed: {0}")]
    IdPacking(String),

    #[error("sparse database write failed: {0}")]
    DbWrite(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("xml parse error: {0}")]
    Xml(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProfError {
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    pub fn malformed_record(offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { offset, reason: reason.into() }
    }

    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    pub fn path_resolution(msg: impl Into<String>) -> Self {
        Self::PathResolution(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error should abandon only the offending input, as
    /// opposed to an input-independent internal error.
    pub fn is_per_input(&self) -> bool {
        !matches!(self, ProfError::Internal(_) | ProfError::Cancelled)
    }

    pub fn category(&self) -> &'static str {
        match self {
            ProfError::InvalidHeader(_) => "header",
            ProfError::UnsupportedVersion { .. } => "version",
            ProfError::MalformedRecord { .. } => "record",
            ProfError::Classification(_) => "classification",
            ProfError::PathResolution(_) => "path",
            ProfError::IdPacking(_) => "identifier",
            ProfError::DbWrite(_) => "database",
            ProfError::Io(_) => "io",
            ProfError::Xml(_) => "xml",
            ProfError::Cancelled => "cancellation",
            ProfError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for ProfError {
    fn from(err: std::io::Error) -> Self {
        ProfError::Io(err.to_string())
    }
}

impl From<quick_xml::Error> for ProfError {
    fn from(err: quick_xml::Error) -> Self {
        ProfError::Xml(err.to_string())
    }
}

/// Errors that abort the entire run; the process logs and exits rather
/// than attempting to continue with partial results.
#[derive(Error, Debug, Clone)]
pub enum FatalError {
    #[error("no inputs survived collation")]
    NoSurvivingInputs,

    #[error("output directory unusable: {0}")]
    OutputUnusable(String),

    #[error("rank transport failure: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl From<ProfError> for FatalError {
    fn from(err: ProfError) -> Self {
        FatalError::Other(err.to_string())
    }
}
