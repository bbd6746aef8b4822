// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Wire encoding for the profile-identifier tuple dictionary: a `u16`
//! entry count followed by `(kind, interpretation, physical, logical)`
//! quadruples.

use std::io::Read;

use profkit_domain::error::ProfError;
use profkit_domain::identifier_tuple::{IdTupleInterpretation, IdTupleKind, IdentifierTuple, IdentifierTupleEntry};

use crate::source::header::{read_u64, ByteOrderMarker};
use byteorder::{ReadBytesExt, BE, LE};

fn kind_from_tag(tag: u8) -> Result<IdTupleKind, ProfError> {
    Ok(match tag {
        0 => IdTupleKind::Summary,
        1 => IdTupleKind::Node,
        2 => IdTupleKind::Rank,
        3 => IdTupleKind::Thread,
        4 => IdTupleKind::GpuDevice,
        5 => IdTupleKind::GpuContext,
        6 => IdTupleKind::GpuStream,
        7 => IdTupleKind::Core,
        other => return Err(ProfError::invalid_header(format!("unknown id-tuple kind tag {other}"))),
    })
}

fn interpretation_from_tag(tag: u8) -> Result<IdTupleInterpretation, ProfError> {
    Ok(match tag {
        0 => IdTupleInterpretation::BothValid,
        1 => IdTupleInterpretation::LogicLocal,
        2 => IdTupleInterpretation::LogicGlobal,
        3 => IdTupleInterpretation::LogicOnly,
        other => return Err(ProfError::invalid_header(format!("unknown id-tuple interpretation tag {other}"))),
    })
}

pub fn read_identifier_tuple<R: Read>(r: &mut R, marker: ByteOrderMarker) -> Result<IdentifierTuple, ProfError> {
    let count = match marker {
        ByteOrderMarker::Big => r.read_u16::<BE>(),
        ByteOrderMarker::Little => r.read_u16::<LE>(),
    }
    .map_err(|e| ProfError::invalid_header(e.to_string()))?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let kind = kind_from_tag(r.read_u8().map_err(|e| ProfError::invalid_header(e.to_string()))?)?;
        let interpretation = interpretation_from_tag(r.read_u8().map_err(|e| ProfError::invalid_header(e.to_string()))?)?;
        let physical_index = read_u64(r, marker)?;
        let logical_index = read_u64(r, marker)?;
        entries.push(IdentifierTupleEntry { kind, physical_index, logical_index, interpretation });
    }
    Ok(IdentifierTuple::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    #[test]
    fn reads_entries_back_in_order() {
        let mut buf = Vec::new();
        buf.write_u16::<BE>(2).unwrap();
        buf.write_u8(1).unwrap(); // Node
        buf.write_u8(0).unwrap(); // BothValid
        buf.write_u64::<BE>(7).unwrap();
        buf.write_u64::<BE>(7).unwrap();
        buf.write_u8(3).unwrap(); // Thread
        buf.write_u8(0).unwrap();
        buf.write_u64::<BE>(2).unwrap();
        buf.write_u64::<BE>(2).unwrap();

        let mut cursor = Cursor::new(buf);
        let tuple = read_identifier_tuple(&mut cursor, ByteOrderMarker::Big).unwrap();
        assert_eq!(tuple.entries().len(), 2);
        assert_eq!(tuple.entries()[0].kind, IdTupleKind::Node);
        assert_eq!(tuple.entries()[1].kind, IdTupleKind::Thread);
    }
}
