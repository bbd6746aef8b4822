// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Binary encoding for [`Scope`]/[`NestedScope`] values carried in the
//! packed identifier blob. All integers are big-endian, matching the sparse
//! DB writer's on-disk convention.
//!
//! The top-level key a packer record is filed under (the `scope` half of
//! `notify_context_expansion(from, scope, to)`) is restricted by
//! [`Scope::is_packable`] to `unknown` / `placeholder` / `point`; those three
//! encode to a fixed 16-byte `(discriminator, offset)` pair. Chain entries
//! (the classifier-produced scopes spliced between `from` and `to`) may be
//! any scope kind and use the tagged encoding in [`encode_nested_scope`] /
//! [`decode_nested_scope`].

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use profkit_domain::ids::{FileId, FunctionId, ModuleId};
use profkit_domain::scope::{NestedScope, PlaceholderKind, Relation, Scope};
use std::io::{self, Read, Write};

/// Sentinel discriminator for [`Scope::Unknown`].
pub const DISC_UNKNOWN: u64 = 0xF0F1_F2F3_0000_0000;
/// Sentinel discriminator for [`Scope::Placeholder`].
pub const DISC_PLACEHOLDER: u64 = 0xF3F2_F1F0_0000_0000;

/// Encodes the packable top-level `(from, scope)` key as a `(discriminator,
/// offset)` pair. Panics if `scope` is not [`Scope::is_packable`] — callers
/// must only reach this for scopes the packer actually observes at
/// `notify_context_expansion`.
pub fn encode_scope_key(scope: Scope) -> (u64, u64) {
    match scope {
        Scope::Unknown => (DISC_UNKNOWN, 0),
        Scope::Placeholder(kind) => (DISC_PLACEHOLDER, placeholder_payload(kind)),
        Scope::Point { module, offset } => (module.get() as u64, offset),
        other => panic!("scope {other:?} is not packable"),
    }
}

fn placeholder_payload(kind: PlaceholderKind) -> u64 {
    match kind {
        PlaceholderKind::Unknown(v) => v,
        PlaceholderKind::GpuKernel(v) => v,
        PlaceholderKind::Other(v) => v,
    }
}

fn placeholder_kind_from(tag: u8, payload: u64) -> PlaceholderKind {
    match tag {
        0 => PlaceholderKind::Unknown(payload),
        1 => PlaceholderKind::GpuKernel(payload),
        _ => PlaceholderKind::Other(payload),
    }
}

/// Decodes a `(discriminator, offset)` pair back into the top-level key
/// scope. The module id on a `Point` key is only meaningful relative to the
/// blob's module table, which the caller must have already replayed.
pub fn decode_scope_key(discriminator: u64, offset: u64) -> Scope {
    match discriminator {
        DISC_UNKNOWN => Scope::Unknown,
        DISC_PLACEHOLDER => Scope::Placeholder(PlaceholderKind::Other(offset)),
        module => Scope::Point { module: ModuleId::new(module as u32), offset },
    }
}

const RELATION_ENCLOSURE: u8 = 0;
const RELATION_INLINED_CALL: u8 = 1;
const RELATION_CALL: u8 = 2;

fn encode_relation(relation: Relation) -> u8 {
    match relation {
        Relation::Enclosure => RELATION_ENCLOSURE,
        Relation::InlinedCall => RELATION_INLINED_CALL,
        Relation::Call => RELATION_CALL,
    }
}

fn decode_relation(tag: u8) -> io::Result<Relation> {
    match tag {
        RELATION_ENCLOSURE => Ok(Relation::Enclosure),
        RELATION_INLINED_CALL => Ok(Relation::InlinedCall),
        RELATION_CALL => Ok(Relation::Call),
        other => Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown relation tag {other}"))),
    }
}

const TAG_UNKNOWN: u8 = 0;
const TAG_PLACEHOLDER: u8 = 1;
const TAG_POINT: u8 = 2;
const TAG_FUNCTION: u8 = 3;
const TAG_LINE: u8 = 4;
const TAG_LOOP: u8 = 5;
const TAG_GLOBAL: u8 = 6;

/// Writes one `(Relation, Scope)` chain entry: `[relation:u8][tag:u8]
/// [payload...]`. The payload width depends on `tag` and is fixed per kind,
/// so [`decode_nested_scope`] never needs a length prefix.
pub fn encode_nested_scope<W: Write>(w: &mut W, edge: NestedScope) -> io::Result<()> {
    w.write_u8(encode_relation(edge.relation))?;
    match edge.scope {
        Scope::Global => w.write_u8(TAG_GLOBAL),
        Scope::Unknown => w.write_u8(TAG_UNKNOWN),
        Scope::Placeholder(kind) => {
            w.write_u8(TAG_PLACEHOLDER)?;
            let (kind_tag, payload) = match kind {
                PlaceholderKind::Unknown(v) => (0u8, v),
                PlaceholderKind::GpuKernel(v) => (1u8, v),
                PlaceholderKind::Other(v) => (2u8, v),
            };
            w.write_u8(kind_tag)?;
            w.write_u64::<BE>(payload)
        }
        Scope::Point { module, offset } => {
            w.write_u8(TAG_POINT)?;
            w.write_u32::<BE>(module.get())?;
            w.write_u64::<BE>(offset)
        }
        Scope::Function(function) => {
            w.write_u8(TAG_FUNCTION)?;
            w.write_u32::<BE>(function.get())
        }
        Scope::Line { file, line } => {
            w.write_u8(TAG_LINE)?;
            w.write_u32::<BE>(file.get())?;
            w.write_u32::<BE>(line)
        }
        Scope::Loop { file, line } => {
            w.write_u8(TAG_LOOP)?;
            w.write_u32::<BE>(file.get())?;
            w.write_u32::<BE>(line)
        }
    }
}

/// Reads one chain entry written by [`encode_nested_scope`].
pub fn decode_nested_scope<R: Read>(r: &mut R) -> io::Result<NestedScope> {
    let relation = decode_relation(r.read_u8()?)?;
    let tag = r.read_u8()?;
    let scope = match tag {
        TAG_GLOBAL => Scope::Global,
        TAG_UNKNOWN => Scope::Unknown,
        TAG_PLACEHOLDER => {
            let kind_tag = r.read_u8()?;
            let payload = r.read_u64::<BE>()?;
            Scope::Placeholder(placeholder_kind_from(kind_tag, payload))
        }
        TAG_POINT => {
            let module = ModuleId::new(r.read_u32::<BE>()?);
            let offset = r.read_u64::<BE>()?;
            Scope::Point { module, offset }
        }
        TAG_FUNCTION => Scope::Function(FunctionId::new(r.read_u32::<BE>()?)),
        TAG_LINE => {
            let file = FileId::new(r.read_u32::<BE>()?);
            let line = r.read_u32::<BE>()?;
            Scope::Line { file, line }
        }
        TAG_LOOP => {
            let file = FileId::new(r.read_u32::<BE>()?);
            let line = r.read_u32::<BE>()?;
            Scope::Loop { file, line }
        }
        other => return Err(io::Error::new(io::ErrorKind::InvalidData, format!("unknown scope tag {other}"))),
    };
    Ok(NestedScope::new(relation, scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_placeholder_sentinels_match_spec_constants() {
        assert_eq!(encode_scope_key(Scope::Unknown).0, 0xF0F1_F2F3_0000_0000);
        assert_eq!(encode_scope_key(Scope::Placeholder(PlaceholderKind::Unknown(0))).0, 0xF3F2_F1F0_0000_0000);
    }

    #[test]
    fn point_encodes_as_module_then_offset() {
        let (disc, offset) = encode_scope_key(Scope::Point { module: ModuleId::new(7), offset: 0x4000 });
        assert_eq!(disc, 7);
        assert_eq!(offset, 0x4000);
    }

    #[test]
    #[should_panic]
    fn function_scope_is_not_a_packable_key() {
        encode_scope_key(Scope::Function(FunctionId::new(0)));
    }

    #[test]
    fn nested_scope_roundtrips_through_every_tag() {
        let cases = vec![
            NestedScope::call(Scope::Unknown),
            NestedScope::call(Scope::Global),
            NestedScope::call(Scope::Placeholder(PlaceholderKind::GpuKernel(99))),
            NestedScope::call(Scope::Point { module: ModuleId::new(3), offset: 0x10 }),
            NestedScope::enclosure(Scope::Function(FunctionId::new(42))),
            NestedScope::enclosure(Scope::Line { file: FileId::new(1), line: 17 }),
            NestedScope::inlined_call(Scope::Loop { file: FileId::new(2), line: 30 }),
        ];
        for edge in cases {
            let mut buf = Vec::new();
            encode_nested_scope(&mut buf, edge).unwrap();
            let mut cursor = &buf[..];
            let decoded = decode_nested_scope(&mut cursor).unwrap();
            assert_eq!(decoded, edge);
            assert!(cursor.is_empty(), "encoding must be exactly self-delimiting");
        }
    }
}
