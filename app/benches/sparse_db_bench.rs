// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Benchmarks `process`'s end-to-end cost of merging N single-thread
//! measurement inputs into `profile.db`/`cct.db`, across a range of input
//! counts. Each input is a minimal legacy-format file (one thread, one
//! global-scope node, no samples) so the benchmark isolates per-input
//! fixed overhead (open, parse, dense-id assignment, sparse DB write)
//! rather than per-sample throughput.

use byteorder::{WriteBytesExt, BE};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use profkit_bootstrap::config::Settings;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 8] = b"PROFMEAS";
const PLACEHOLDER: u32 = u32::MAX - 1;
const ROOT_PRIMARY: u64 = 0;

fn minimal_legacy_file(node_id: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.write_u8(3).unwrap(); // major: legacy
    buf.write_u8(0).unwrap(); // minor
    buf.write_u8(b'B').unwrap(); // big-endian marker

    buf.write_u32::<BE>(0).unwrap(); // name/value count

    buf.write_u32::<BE>(node_id).unwrap(); // node-id
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

fn populate_measurements_dir(dir: &Path, input_count: u32) {
    for node_id in 0..input_count {
        let path = dir.join(format!("rank{node_id}-thread0.hpcrun"));
        std::fs::File::create(path).unwrap().write_all(&minimal_legacy_file(node_id)).unwrap();
    }
}

fn benchmark_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_inputs");

    for input_count in [1u32, 4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("team_size_4", input_count), &input_count, |b, &input_count| {
            let measurements_dir = tempfile::tempdir().unwrap();
            populate_measurements_dir(measurements_dir.path(), input_count);

            b.iter(|| {
                let output_dir = tempfile::tempdir().unwrap();
                let settings = Settings::builder().dir(output_dir.path()).team_size(4).build().unwrap();
                profkit::application::process(&settings, &[measurements_dir.path().to_path_buf()]).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_process);
criterion_main!(benches);
