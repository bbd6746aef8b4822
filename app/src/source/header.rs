// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Header framing shared by the v4.0 and legacy 2.0/3.0 measurement
//! formats: magic, version, byte-order marker, and the name/value list
//! that carries program name/path, `PATH`, and job id.

use std::io::Read;

use byteorder::{ReadBytesExt, BE, LE};
use profkit_domain::error::ProfError;

pub const MAGIC: &[u8; 8] = b"PROFMEAS";

/// Which endianness the rest of the file (after the marker byte) is
/// written in. Every Source reader written by this crate emits big-endian;
/// the marker exists because the original measurement format is portable
/// across architectures and readers must not assume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderMarker {
    Big,
    Little,
}

#[derive(Debug, Clone, Copy)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
}

impl FormatVersion {
    pub fn is_legacy(self) -> bool {
        self.major == 2 || self.major == 3
    }

    pub fn is_current(self) -> bool {
        self.major == 4
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameValueHeader {
    pub program_name: String,
    pub program_path: String,
    pub env_path: String,
    pub job_id: String,
}

pub fn read_nul_terminated<R: Read>(r: &mut R) -> Result<String, ProfError> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte).map_err(|e| ProfError::invalid_header(format!("truncated string: {e}")))?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|e| ProfError::invalid_header(format!("non-utf8 string: {e}")))
}

/// Reads `MAGIC`, the two-byte `(major, minor)` version, and the
/// byte-order marker (`'B'`/`'L'`). Every field after this call uses
/// `marker`'s endianness.
pub fn read_prelude<R: Read>(r: &mut R) -> Result<(FormatVersion, ByteOrderMarker), ProfError> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic).map_err(|e| ProfError::invalid_header(format!("truncated magic: {e}")))?;
    if &magic != MAGIC {
        return Err(ProfError::invalid_header("bad magic"));
    }
    let major = r.read_u8().map_err(|e| ProfError::invalid_header(e.to_string()))?;
    let minor = r.read_u8().map_err(|e| ProfError::invalid_header(e.to_string()))?;
    let marker = r.read_u8().map_err(|e| ProfError::invalid_header(e.to_string()))?;
    let marker = match marker {
        b'B' => ByteOrderMarker::Big,
        b'L' => ByteOrderMarker::Little,
        other => return Err(ProfError::invalid_header(format!("unknown byte-order marker {other:#x}"))),
    };
    let version = FormatVersion { major, minor };
    if !version.is_legacy() && !version.is_current() {
        return Err(ProfError::UnsupportedVersion { major, minor });
    }
    Ok((version, marker))
}

pub fn read_u32<R: Read>(r: &mut R, marker: ByteOrderMarker) -> Result<u32, ProfError> {
    match marker {
        ByteOrderMarker::Big => r.read_u32::<BE>(),
        ByteOrderMarker::Little => r.read_u32::<LE>(),
    }
    .map_err(|e| ProfError::malformed_record(0, e.to_string()))
}

pub fn read_u64<R: Read>(r: &mut R, marker: ByteOrderMarker) -> Result<u64, ProfError> {
    match marker {
        ByteOrderMarker::Big => r.read_u64::<BE>(),
        ByteOrderMarker::Little => r.read_u64::<LE>(),
    }
    .map_err(|e| ProfError::malformed_record(0, e.to_string()))
}

pub fn read_f64<R: Read>(r: &mut R, marker: ByteOrderMarker) -> Result<f64, ProfError> {
    match marker {
        ByteOrderMarker::Big => r.read_f64::<BE>(),
        ByteOrderMarker::Little => r.read_f64::<LE>(),
    }
    .map_err(|e| ProfError::malformed_record(0, e.to_string()))
}

/// Reads the name/value list: a `u32` count, then `count` nul-terminated
/// `(key, value)` pairs. Unknown keys are ignored; `program.name`,
/// `program.path`, `env.PATH`, and `job.id` are pulled into
/// [`NameValueHeader`].
pub fn read_name_value_header<R: Read>(r: &mut R, marker: ByteOrderMarker) -> Result<NameValueHeader, ProfError> {
    let count = read_u32(r, marker)?;
    let mut header = NameValueHeader::default();
    for _ in 0..count {
        let key = read_nul_terminated(r)?;
        let value = read_nul_terminated(r)?;
        match key.as_str() {
            "program.name" => header.program_name = value,
            "program.path" => header.program_path = value,
            "env.PATH" => header.env_path = value,
            "job.id" => header.job_id = value,
            _ => {}
        }
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    #[test]
    fn prelude_roundtrips() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.write_u8(4).unwrap();
        buf.write_u8(0).unwrap();
        buf.write_u8(b'B').unwrap();
        let mut cursor = Cursor::new(buf);
        let (version, marker) = read_prelude(&mut cursor).unwrap();
        assert_eq!(version.major, 4);
        assert_eq!(marker, ByteOrderMarker::Big);
        assert!(version.is_current());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut cursor = Cursor::new(b"NOTAMAGIC\x04\x00B".to_vec());
        assert!(read_prelude(&mut cursor).is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.write_u8(9).unwrap();
        buf.write_u8(0).unwrap();
        buf.write_u8(b'B').unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(matches!(read_prelude(&mut cursor), Err(ProfError::UnsupportedVersion { major: 9, minor: 0 })));
    }

    #[test]
    fn name_value_header_picks_known_keys() {
        let mut buf = Vec::new();
        buf.write_u32::<BE>(2).unwrap();
        buf.extend_from_slice(b"program.name\0app\0");
        buf.extend_from_slice(b"job.id\042\0");
        let mut cursor = Cursor::new(buf);
        let header = read_name_value_header(&mut cursor, ByteOrderMarker::Big).unwrap();
        assert_eq!(header.program_name, "app");
        assert_eq!(header.job_id, "42");
    }
}
