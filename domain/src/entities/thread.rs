// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A Thread is a profiled execution entity keyed by its [`IdentifierTuple`]
//! across distributed ranks.

use crate::identifier_tuple::IdentifierTuple;
use crate::ids::ThreadId;
use crate::userdata::SlotSpace;
use once_cell::sync::OnceCell;

pub struct Thread {
    id_tuple: IdentifierTuple,
    id: OnceCell<ThreadId>,
    extensions: SlotSpace,
}

impl Thread {
    pub fn new(id_tuple: IdentifierTuple, extensions: SlotSpace) -> Self {
        Self { id_tuple, id: OnceCell::new(), extensions }
    }

    pub fn id_tuple(&self) -> &IdentifierTuple {
        &self.id_tuple
    }

    pub fn id(&self) -> Option<ThreadId> {
        self.id.get().copied()
    }

    pub fn set_id(&self, id: ThreadId) -> ThreadId {
        *self.id.get_or_init(|| id)
    }

    pub fn extensions(&self) -> &SlotSpace {
        &self.extensions
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread").field("id_tuple", &self.id_tuple).field("id", &self.id.get()).finish_non_exhaustive()
    }
}
