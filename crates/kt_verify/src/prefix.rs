// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Prefix tree proofs.
//!
//! Every log entry carries the root of a prefix tree mapping commitment indexes to version
//! counters. A proof for an index is the counter stored for it and the copath from its leaf
//! up to the root; the log leaf then binds that root to the entry's commitment.

use crate::error::PrefixError;
use crate::proto::{CommitmentIndex, PrefixSearchResult, INDEX_SIZE};
use kt_tree::{record_hash, Hash};
use sha2::{Digest, Sha256};

/// Deepest possible prefix tree: one level per bit of the index.
pub const MAX_DEPTH: usize = INDEX_SIZE * 8;

const LEAF_PREFIX: u8 = 0x02;
const NODE_PREFIX: u8 = 0x03;

/// The prefix tree root implied by a verified proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixSubRoot {
    pub root: Hash,
    pub counter: u32,
}

fn leaf_hash(index: &CommitmentIndex, counter: u32) -> Hash {
    // SHA256(0x02 || index || counter)
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(index.0);
    hasher.update(counter.to_be_bytes());
    Hash(hasher.finalize().into())
}

fn node_hash(left: &Hash, right: &Hash) -> Hash {
    // SHA256(0x03 || left || right)
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.0);
    hasher.update(right.0);
    Hash(hasher.finalize().into())
}

/// Recomputes the prefix tree root for `index` from `result`.
///
/// If `bound` is given, the proven counter must be at least `bound`.
///
/// # Errors
///
/// Returns [`PrefixError::PathLengthMismatch`] if the copath is deeper than [`MAX_DEPTH`] and
/// [`PrefixError::VersionRegression`] if the counter is below `bound`.
pub fn verify_prefix(
    index: &CommitmentIndex,
    result: &PrefixSearchResult,
    bound: Option<u32>,
) -> Result<PrefixSubRoot, PrefixError> {
    let depth = result.copath.len();
    if depth > MAX_DEPTH {
        return Err(PrefixError::PathLengthMismatch {
            len: depth,
            max: MAX_DEPTH,
        });
    }
    if let Some(bound) = bound {
        if result.counter < bound {
            return Err(PrefixError::VersionRegression {
                counter: result.counter,
                bound,
            });
        }
    }

    let mut root = leaf_hash(index, result.counter);
    for (level, sibling) in result.copath.iter().enumerate() {
        root = if index.bit(depth - 1 - level) {
            node_hash(sibling, &root)
        } else {
            node_hash(&root, sibling)
        };
    }
    Ok(PrefixSubRoot {
        root,
        counter: result.counter,
    })
}

/// The log leaf for an entry: its prefix tree root bound to its commitment.
pub fn entry_leaf_hash(sub_root: &Hash, commitment: &Hash) -> Hash {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(&sub_root.0);
    data[32..].copy_from_slice(&commitment.0);
    record_hash(&data)
}
