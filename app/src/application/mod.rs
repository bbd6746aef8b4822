// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Use cases the presentation layer dispatches to: `process` runs a full
//! merge of one or more measurement inputs into `profile.db`/`cct.db`;
//! `validate_config` checks a [`profkit_bootstrap::config::Settings`] value
//! for cross-field problems parse-time validation can't catch alone.

pub mod process;
pub mod validate_config;

pub use process::process;
pub use validate_config::validate_config;
