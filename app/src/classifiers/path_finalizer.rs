// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Resolved-path assignment for Modules and Files: tries each configured
//! `(from_prefix, to_prefix)` substitution in order, taking the first
//! candidate that exists on disk. In *foreign* mode, a candidate outside the
//! substitutions' target prefixes is treated as nonexistent even if a file
//! happens to sit there.

use profkit_bootstrap::config::PathSubstitution;
use profkit_domain::dataclass::ExtensionClass;
use profkit_domain::entities::{Module, SourceFile};
use profkit_domain::traits::Finalizer;
use std::path::{Path, PathBuf};

pub struct PathFinalizer {
    substitutions: Vec<PathSubstitution>,
    foreign: bool,
}

impl PathFinalizer {
    pub fn new(substitutions: Vec<PathSubstitution>, foreign: bool) -> Self {
        Self { substitutions, foreign }
    }

    pub fn resolve_module(&self, module: &Module) {
        let resolved = self.resolve(module.resolvable_path());
        let _ = module.set_resolved_path(resolved);
    }

    pub fn resolve_file(&self, file: &SourceFile) {
        let resolved = self.resolve(file.resolvable_path());
        let _ = file.set_resolved_path(resolved);
    }

    fn resolve(&self, resolvable: &Path) -> Option<PathBuf> {
        let original = resolvable.to_string_lossy().into_owned();
        for sub in &self.substitutions {
            if let Some(rest) = original.strip_prefix(sub.from_prefix.as_str()) {
                let candidate = PathBuf::from(format!("{}{}", sub.to_prefix, rest));
                if self.accept(&candidate) {
                    return Some(candidate);
                }
            }
        }
        self.accept(resolvable).then(|| resolvable.to_path_buf())
    }

    fn accept(&self, path: &Path) -> bool {
        if self.foreign && !self.allowed(path) {
            return false;
        }
        path.exists()
    }

    /// In foreign mode, a path is only trusted if it falls under one of the
    /// configured substitution targets; paths that never passed through a
    /// substitution (i.e. had no matching `from_prefix`) are foreign.
    fn allowed(&self, path: &Path) -> bool {
        self.substitutions.iter().any(|sub| path.starts_with(&sub.to_prefix))
    }
}

impl Finalizer for PathFinalizer {
    fn provides(&self) -> ExtensionClass {
        ExtensionClass::RESOLVED_PATH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profkit_domain::userdata::SlotRegistry;

    fn empty_slots() -> profkit_domain::userdata::SlotSpace {
        SlotRegistry::new().freeze().create()
    }

    #[test]
    fn substitution_redirects_to_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("app.so");
        std::fs::write(&real, b"").unwrap();

        let finalizer = PathFinalizer::new(
            vec![PathSubstitution { from_prefix: "/build".to_string(), to_prefix: dir.path().to_string_lossy().into_owned() }],
            false,
        );
        let module = Module::new("/build/app.so", empty_slots());
        finalizer.resolve_module(&module);
        assert_eq!(module.resolved_path(), Some(real.as_path()));
    }

    #[test]
    fn unmatched_prefix_falls_back_to_original_path_check() {
        let finalizer = PathFinalizer::new(vec![], false);
        let module = Module::new("/nonexistent/path/app.so", empty_slots());
        finalizer.resolve_module(&module);
        assert_eq!(module.resolved_path(), None);
    }

    #[test]
    fn foreign_mode_rejects_paths_outside_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.so"), b"").unwrap();
        // No substitution targets this directory, so even though the
        // original resolvable path exists, foreign mode must reject it.
        let finalizer = PathFinalizer::new(vec![], true);
        let module = Module::new(dir.path().join("app.so"), empty_slots());
        finalizer.resolve_module(&module);
        assert_eq!(module.resolved_path(), None);
    }
}
