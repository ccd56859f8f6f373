// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use kt_tree::{check_tree, Hash};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 16 {
        return;
    }
    let (sizes, rest) = data.split_at(16);
    let n = u64::from_be_bytes(sizes[..8].try_into().unwrap());
    let t = u64::from_be_bytes(sizes[8..].try_into().unwrap());
    let hashes: Vec<Hash> = rest
        .chunks_exact(32)
        .map(|c| Hash(c.try_into().unwrap()))
        .collect();
    let Some((roots, proof)) = hashes.split_first_chunk::<2>() else {
        return;
    };
    let _ = check_tree(proof, t, roots[0], n, roots[1]);
});
