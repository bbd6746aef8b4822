// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A SourceFile is a program source file referenced by a classified Scope.
//! Uniqued by resolvable path, same resolution shape as [`Module`](super::module::Module).

use crate::userdata::SlotSpace;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

pub struct SourceFile {
    resolvable_path: PathBuf,
    resolved_path: OnceCell<Option<PathBuf>>,
    extensions: SlotSpace,
}

impl SourceFile {
    pub fn new(resolvable_path: impl Into<PathBuf>, extensions: SlotSpace) -> Self {
        Self { resolvable_path: resolvable_path.into(), resolved_path: OnceCell::new(), extensions }
    }

    pub fn resolvable_path(&self) -> &Path {
        &self.resolvable_path
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.get().and_then(|p| p.as_deref())
    }

    pub fn set_resolved_path(&self, path: Option<PathBuf>) -> Result<(), Option<PathBuf>> {
        self.resolved_path.set(path)
    }

    pub fn extensions(&self) -> &SlotSpace {
        &self.extensions
    }
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile").field("resolvable_path", &self.resolvable_path).finish_non_exhaustive()
    }
}
