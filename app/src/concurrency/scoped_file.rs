// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Scoped shared-file access: a [`SharedFile`] path-holder opened (and
//! cleared, if requested) by rank 0, synchronized across ranks with a
//! barrier, and then opened per-rank as a [`SharedFileInstance`] exposing
//! positioned reads/writes so every rank can write into disjoint regions of
//! one on-disk file without further coordination.

use profkit_domain::traits::RankTransport;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct SharedFile {
    path: PathBuf,
}

impl SharedFile {
    /// Opens (creating, and truncating if `create`) the file at `path` on
    /// rank 0 only, then calls `synchronize` so every other rank waits until
    /// rank 0's create/truncate has completed before any rank opens its own
    /// handle.
    pub fn open(transport: &dyn RankTransport, path: impl Into<PathBuf>, create: bool) -> io::Result<Self> {
        let path = path.into();
        if transport.rank() == 0 {
            let mut opts = OpenOptions::new();
            opts.read(true).write(true);
            if create {
                opts.create(true).truncate(true);
            }
            opts.open(&path)?;
        }
        Self::synchronize(transport);
        Ok(Self { path })
    }

    /// A distributed barrier: every rank blocks here until every other rank
    /// has reached this point.
    pub fn synchronize(transport: &dyn RankTransport) {
        transport.barrier();
    }

    /// Opens this rank's own handle onto the shared file.
    pub fn open_instance(&self, writable: bool) -> io::Result<SharedFileInstance> {
        let mut opts = OpenOptions::new();
        opts.read(true).write(writable);
        let file = opts.open(&self.path)?;
        Ok(SharedFileInstance { file: Arc::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One rank's handle onto a [`SharedFile`]. Positioned reads/writes don't
/// move a shared cursor, so concurrent callers (on different threads of the
/// same rank, writing to disjoint offsets) need no external locking.
#[derive(Clone)]
pub struct SharedFileInstance {
    file: Arc<File>,
}

impl SharedFileInstance {
    pub fn writeat(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        write_at(&self.file, offset, buf)
    }

    pub fn readat(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        read_at(&self.file, offset, &mut buf)?;
        Ok(buf)
    }

    pub fn set_len(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    pub fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(unix)]
fn write_at(file: &File, offset: u64, buf: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(unix)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, offset: u64, buf: &[u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0;
    while written < buf.len() {
        written += file.seek_write(&buf[written..], offset + written as u64)?;
    }
    Ok(())
}

#[cfg(windows)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut read = 0;
    while read < buf.len() {
        let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"));
        }
        read += n;
    }
    Ok(())
}
