// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Hiding commitments to identifier values.

use kt_tree::Hash;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const COMMITMENT_DOMAIN: &[u8] = b"kt-commitment-v1";

/// Size of a commitment opening.
pub const OPENING_SIZE: usize = 32;

/// Computes the commitment to `value` at `log_position` under `opening`.
pub fn commit(opening: &[u8; OPENING_SIZE], log_position: u64, value: &[u8]) -> Hash {
    // SHA256(domain || u64 position || opening || u32 len || value)
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(log_position.to_be_bytes());
    hasher.update(opening);
    // Values longer than u32::MAX saturate the length prefix.
    hasher.update(u32::try_from(value.len()).unwrap_or(u32::MAX).to_be_bytes());
    hasher.update(value);
    Hash(hasher.finalize().into())
}

/// Returns whether `commitment` opens to `value` at `log_position` under `opening`.
pub fn open(commitment: &Hash, opening: &[u8], log_position: u64, value: &[u8]) -> bool {
    let Ok(opening) = <&[u8; OPENING_SIZE]>::try_from(opening) else {
        return false;
    };
    commit(opening, log_position, value).0[..]
        .ct_eq(&commitment.0[..])
        .into()
}
