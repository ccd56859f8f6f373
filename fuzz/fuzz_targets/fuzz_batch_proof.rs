// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use kt_tree::{evaluate_batch_proof, frontier_positions, Hash};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Tree size, a position count and that many positions, then hashes: one leaf per
    // position followed by the proof.
    if data.len() < 9 {
        return;
    }
    let t = u64::from_be_bytes(data[..8].try_into().unwrap());
    let count = usize::from(data[8] % 16);
    let rest = &data[9..];
    if rest.len() < count * 8 {
        return;
    }
    let (raw_positions, rest) = rest.split_at(count * 8);
    let positions: Vec<u64> = raw_positions
        .chunks_exact(8)
        .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
        .collect();
    let hashes: Vec<Hash> = rest
        .chunks_exact(32)
        .map(|c| Hash(c.try_into().unwrap()))
        .collect();
    if hashes.len() < count {
        return;
    }
    let (leaves, proof) = hashes.split_at(count);
    let _ = evaluate_batch_proof(t, &positions, leaves, proof);
    if let Some(&n) = positions.first() {
        let _ = frontier_positions(n, t);
    }
});
