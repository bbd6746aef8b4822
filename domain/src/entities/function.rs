// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A Function is a callable identified by classification (struct file,
//! logical module stanza, or DWARF fallback).

use crate::entities::source_file::SourceFile;
use crate::userdata::SlotSpace;
use std::sync::Arc;

use super::module::Module;

/// `(file, line)` source location attached to a Function when known.
#[derive(Clone)]
pub struct SourceLocation {
    pub file: Arc<SourceFile>,
    pub line: u32,
}

pub struct Function {
    module: Arc<Module>,
    entry_offset: Option<u64>,
    display_name: String,
    source_location: Option<SourceLocation>,
    extensions: SlotSpace,
}

impl Function {
    pub fn new(
        module: Arc<Module>,
        entry_offset: Option<u64>,
        display_name: impl Into<String>,
        source_location: Option<SourceLocation>,
        extensions: SlotSpace,
    ) -> Self {
        Self { module, entry_offset, display_name: display_name.into(), source_location, extensions }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn entry_offset(&self) -> Option<u64> {
        self.entry_offset
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn source_location(&self) -> Option<&SourceLocation> {
        self.source_location.as_ref()
    }

    pub fn extensions(&self) -> &SlotSpace {
        &self.extensions
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("display_name", &self.display_name)
            .field("entry_offset", &self.entry_offset)
            .finish_non_exhaustive()
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
    fn function_without_source_location() {
        let module = Arc::new(Module::new("/lib/libfoo.so", empty_slots()));
        let func = Function::new(module, Some(0x1000), "foo", None, empty_slots());
        assert_eq!(func.display_name(), "foo");
        assert!(func.source_location().is_none());
    }
}
