// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end exercise of the `process` use case against a synthetic
//! measurement file: one legacy-format `.hpcrun` input with a single
//! global-scope node and no samples, run through the whole pipeline down
//! to the sparse DB files on disk.

use byteorder::{WriteBytesExt, BE};
use profkit_bootstrap::config::Settings;
use std::io::Write;

const MAGIC: &[u8; 8] = b"PROFMEAS";
const PLACEHOLDER: u32 = u32::MAX - 1;
const ROOT_PRIMARY: u64 = 0;

fn minimal_legacy_file() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.write_u8(3).unwrap(); // major: legacy
    buf.write_u8(0).unwrap(); // minor
    buf.write_u8(b'B').unwrap(); // big-endian marker

    buf.write_u32::<BE>(0).unwrap(); // name/value count

    buf.write_u32::<BE>(1).unwrap(); // node-id
    buf.write_u32::<BE>(0).unwrap(); // mpi-rank
    buf.write_u32::<BE>(0).unwrap(); // thread-id
    buf.write_u64::<BE>(7).unwrap(); // hostid

    buf.write_u32::<BE>(1).unwrap(); // epoch count
    buf.write_u32::<BE>(0).unwrap(); // epoch flags
    buf.write_u32::<BE>(0).unwrap(); // metric count
    buf.write_u32::<BE>(0).unwrap(); // module count

    buf.write_u64::<BE>(1).unwrap(); // node count
    buf.write_u32::<BE>(1).unwrap(); // node id
    buf.write_u32::<BE>(0).unwrap(); // parent id
    buf.write_u32::<BE>(PLACEHOLDER).unwrap(); // module id: global scope marker
    buf.write_u64::<BE>(ROOT_PRIMARY).unwrap(); // offset: global scope marker
    buf.write_u32::<BE>(0).unwrap(); // value count

    buf
}

#[test]
fn process_writes_profile_db_and_cct_db_for_a_single_input() {
    let measurements_dir = tempfile::tempdir().unwrap();
    let input_path = measurements_dir.path().join("rank0-thread0.hpcrun");
    std::fs::File::create(&input_path).unwrap().write_all(&minimal_legacy_file()).unwrap();

    let output_dir = tempfile::tempdir().unwrap();
    let settings = Settings::builder().dir(output_dir.path()).team_size(2).build().unwrap();

    profkit::application::process(&settings, &[measurements_dir.path().to_path_buf()]).unwrap();

    assert!(output_dir.path().join("profile.db").exists());
    assert!(output_dir.path().join("cct.db").exists());
}

#[test]
fn process_fails_when_no_inputs_are_found() {
    let empty_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let settings = Settings::builder().dir(output_dir.path()).build().unwrap();

    let result = profkit::application::process(&settings, &[empty_dir.path().to_path_buf()]);
    assert!(result.is_err());
}
