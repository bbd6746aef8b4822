// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A monotonic counter shared across distributed ranks. On a single-rank run
//! this is a plain atomic; on a multi-rank run, rank 0 runs a background
//! server thread per peer and every other rank performs a request-reply over
//! [`RankTransport`] to claim the next value. Used for the sparse DB
//! writer's shared file-offset cursor and context-group claim counter.

use profkit_domain::traits::RankTransport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

enum Backend {
    Local(AtomicU64),
    Distributed {
        transport: Arc<dyn RankTransport>,
        tag: u32,
        /// Rank 0's local counter plus the server threads that service peers.
        counter: Arc<AtomicU64>,
        servers: Vec<JoinHandle<()>>,
    },
}

pub struct SharedAccumulator {
    backend: Backend,
}

impl SharedAccumulator {
    /// Builds a new accumulator tagged `tag`, starting at `init`. On a
    /// single-rank transport this degrades to a local atomic with no
    /// background thread, per the boundary behavior in §8.
    pub fn new(transport: Arc<dyn RankTransport>, tag: u32, init: u64) -> Self {
        if transport.world_size() <= 1 {
            return Self { backend: Backend::Local(AtomicU64::new(init)) };
        }

        if transport.rank() == 0 {
            let counter = Arc::new(AtomicU64::new(init));
            let mut servers = Vec::new();
            for peer in 1..transport.world_size() {
                let transport = Arc::clone(&transport);
                let counter = Arc::clone(&counter);
                servers.push(std::thread::spawn(move || {
                    Self::serve_peer(transport, tag, peer, counter);
                }));
            }
            Self { backend: Backend::Distributed { transport, tag, counter, servers } }
        } else {
            Self {
                backend: Backend::Distributed { transport, tag, counter: Arc::new(AtomicU64::new(0)), servers: Vec::new() },
            }
        }
    }

    /// Rank-0 server loop for one peer: receive an 8-byte big-endian delta,
    /// reply with the prior counter value, repeat. A zero-length receive
    /// (the peer closing its side) terminates the server.
    fn serve_peer(transport: Arc<dyn RankTransport>, tag: u32, peer: u32, counter: Arc<AtomicU64>) {
        loop {
            let request = match transport.recv_from(peer, tag) {
                Ok(bytes) => bytes,
                Err(_) => return,
            };
            if request.is_empty() {
                return;
            }
            let delta = u64::from_be_bytes(request[..8].try_into().expect("8-byte delta request"));
            let prior = counter.fetch_add(delta, Ordering::SeqCst);
            if transport.send_to(peer, tag, &prior.to_be_bytes()).is_err() {
                return;
            }
        }
    }

    /// Atomically claims `delta` units, returning the value before the add —
    /// the same contract as `AtomicU64::fetch_add`.
    pub fn fetch_add(&self, delta: u64) -> u64 {
        match &self.backend {
            Backend::Local(counter) => counter.fetch_add(delta, Ordering::SeqCst),
            Backend::Distributed { transport, tag, counter, .. } => {
                if transport.rank() == 0 {
                    counter.fetch_add(delta, Ordering::SeqCst)
                } else {
                    transport.send_to(0, *tag, &delta.to_be_bytes()).expect("request to rank 0");
                    let reply = transport.recv_from(0, *tag).expect("reply from rank 0");
                    u64::from_be_bytes(reply[..8].try_into().expect("8-byte reply"))
                }
            }
        }
    }

    pub fn get(&self) -> u64 {
        match &self.backend {
            Backend::Local(counter) => counter.load(Ordering::SeqCst),
            Backend::Distributed { counter, .. } => counter.load(Ordering::SeqCst),
        }
    }
}

impl Drop for SharedAccumulator {
    fn drop(&mut self) {
        if let Backend::Distributed { transport, tag, servers, .. } = &mut self.backend {
            if transport.rank() == 0 {
                for peer in 1..transport.world_size() {
                    let _ = transport.send_to(peer, *tag, &[]);
                }
                for handle in servers.drain(..) {
                    let _ = handle.join();
                }
            }
        }
    }
}
