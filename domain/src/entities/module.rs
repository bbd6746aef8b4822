// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A Module is an executable or shared library referenced by at least one
//! sampled address. Uniqued by resolvable path.

use crate::userdata::SlotSpace;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

pub struct Module {
    resolvable_path: PathBuf,
    resolved_path: OnceCell<Option<PathBuf>>,
    extensions: SlotSpace,
}

impl Module {
    pub fn new(resolvable_path: impl Into<PathBuf>, extensions: SlotSpace) -> Self {
        Self { resolvable_path: resolvable_path.into(), resolved_path: OnceCell::new(), extensions }
    }

    pub fn resolvable_path(&self) -> &Path {
        &self.resolvable_path
    }

    /// `None` once resolved means the path could not be found (or, in
    /// foreign mode, fell outside the allowlist); callers must not observe
    /// this before the resolved-path finalizer runs.
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.get().and_then(|p| p.as_deref())
    }

    pub fn set_resolved_path(&self, path: Option<PathBuf>) -> Result<(), Option<PathBuf>> {
        self.resolved_path.set(path)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_path.get().is_some()
    }

    pub fn extensions(&self) -> &SlotSpace {
        &self.extensions
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module").field("resolvable_path", &self.resolvable_path).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::userdata::SlotRegistry;

    fn empty_slots() -> SlotSpace {
        SlotRegistry::new().freeze().create()
    }

    #[test]
    fn resolved_path_is_unset_until_finalizer_runs() {
        let module = Module::new("/usr/bin/app", empty_slots());
        assert!(!module.is_resolved());
        module.set_resolved_path(Some(PathBuf::from("/usr/bin/app"))).unwrap();
        assert!(module.is_resolved());
        assert_eq!(module.resolved_path(), Some(Path::new("/usr/bin/app")));
    }

    #[test]
    fn second_set_is_rejected() {
        let module = Module::new("/usr/bin/app", empty_slots());
        module.set_resolved_path(None).unwrap();
        assert!(module.set_resolved_path(Some(PathBuf::from("/x"))).is_err());
    }
}
