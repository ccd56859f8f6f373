// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Batched inclusion proofs and monitoring frontiers.
//!
//! A batch proof shows that a set of leaves is contained in a tree of size `t`. It holds one
//! hash per maximal subtree that contains none of the proven leaves, in left-to-right
//! depth-first order, so leaves that share ancestors share proof hashes.

use crate::tlog::{maxpow2, node_hash, read_exact, sub_tree_hash, sub_tree_index, Hash, HashReader, TreeError};
use std::slice;

/// A `BatchProof` is a verifiable proof that a log root contains a set of leaves.
pub type BatchProof = Vec<Hash>;

fn check_positions(t: u64, ns: &[u64]) -> Result<(), TreeError> {
    if t == 0 {
        return Err(TreeError::InvalidInput("empty tree".into()));
    }
    if ns.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TreeError::IndexesOutOfOrder);
    }
    if ns.last().is_some_and(|&n| n >= t) {
        return Err(TreeError::InvalidInput("n >= t".into()));
    }
    Ok(())
}

/// Returns the proof that the tree of size `t` contains the leaves at the strictly increasing
/// positions `ns`.
///
/// # Errors
///
/// Returns an error if the positions are unsorted or out of range, or if `read_hashes` fails.
pub fn prove_batch<R: HashReader>(t: u64, ns: &[u64], r: &R) -> Result<BatchProof, TreeError> {
    check_positions(t, ns)?;
    let indexes = batch_proof_index(0, t, ns, vec![]);
    let hashes = read_exact(r, &indexes)?;
    let (proof, _) = batch_proof(0, t, ns, hashes);
    Ok(proof)
}

fn split_at(lo: u64, hi: u64, ns: &[u64]) -> (u64, usize) {
    let (k, _) = maxpow2(hi - lo);
    (lo + k, ns.partition_point(|&n| n < lo + k))
}

// Builds the list of indexes needed to construct the batch proof for the leaves ns within
// the subtree [lo, hi).
fn batch_proof_index(lo: u64, hi: u64, ns: &[u64], need: Vec<u64>) -> Vec<u64> {
    if ns.is_empty() {
        return sub_tree_index(lo, hi, need);
    }
    if lo + 1 == hi {
        return need;
    }
    let (mid, split) = split_at(lo, hi, ns);
    let need = batch_proof_index(lo, mid, &ns[..split], need);
    batch_proof_index(mid, hi, &ns[split..], need)
}

fn batch_proof(lo: u64, hi: u64, ns: &[u64], hashes: Vec<Hash>) -> (BatchProof, Vec<Hash>) {
    if ns.is_empty() {
        let (th, hashes) = sub_tree_hash(lo, hi, &hashes);
        return (vec![th], hashes);
    }
    if lo + 1 == hi {
        // The verifier knows this leaf.
        return (vec![], hashes);
    }
    let (mid, split) = split_at(lo, hi, ns);
    let (mut proof, hashes) = batch_proof(lo, mid, &ns[..split], hashes);
    let (right, hashes) = batch_proof(mid, hi, &ns[split..], hashes);
    proof.extend(right);
    (proof, hashes)
}

/// Evaluates the batch proof `p` for the leaf hashes `leaves` at positions `ns` in a tree of
/// size `t`, returning the implied root.
///
/// # Errors
///
/// Returns [`TreeError::MalformedProof`] if `p` has too few or too many hashes, and an
/// input error if the positions are unsorted, out of range or do not pair up with `leaves`.
pub fn evaluate_batch_proof(t: u64, ns: &[u64], leaves: &[Hash], p: &[Hash]) -> Result<Hash, TreeError> {
    check_positions(t, ns)?;
    if ns.len() != leaves.len() {
        return Err(TreeError::InvalidInput(format!(
            "{} positions for {} leaves",
            ns.len(),
            leaves.len()
        )));
    }
    let mut proof = p.iter();
    let root = run_batch_proof(0, t, ns, leaves, &mut proof)?;
    if proof.next().is_some() {
        return Err(TreeError::MalformedProof("batch proof has unused hashes".into()));
    }
    Ok(root)
}

fn run_batch_proof(
    lo: u64,
    hi: u64,
    ns: &[u64],
    leaves: &[Hash],
    proof: &mut slice::Iter<'_, Hash>,
) -> Result<Hash, TreeError> {
    if ns.is_empty() {
        return proof
            .next()
            .copied()
            .ok_or_else(|| TreeError::MalformedProof("batch proof too short".into()));
    }
    if lo + 1 == hi {
        return Ok(leaves[0]);
    }
    let (mid, split) = split_at(lo, hi, ns);
    let left = run_batch_proof(lo, mid, &ns[..split], &leaves[..split], proof)?;
    let right = run_batch_proof(mid, hi, &ns[split..], &leaves[split..], proof)?;
    Ok(node_hash(left, right))
}

/// Verifies that `p` proves the leaves `leaves` at positions `ns` are contained in the tree of
/// size `t` with hash `th`.
///
/// # Errors
///
/// See [`evaluate_batch_proof`]; additionally returns [`TreeError::RootMismatch`] if the
/// proof leads to a different root.
pub fn check_batch(p: &[Hash], t: u64, th: Hash, ns: &[u64], leaves: &[Hash]) -> Result<(), TreeError> {
    if evaluate_batch_proof(t, ns, leaves, p)? == th {
        Ok(())
    } else {
        Err(TreeError::RootMismatch)
    }
}

/// Returns the frontier of leaf `n` in a tree of size `t`: for each ancestor of `n` whose
/// right sibling subtree exists, the first leaf of that sibling, bottom-up. The returned
/// positions are strictly increasing.
pub fn frontier_positions(n: u64, t: u64) -> Vec<u64> {
    let mut out = Vec::new();
    for level in 0..u64::BITS {
        if (n >> level) & 1 == 1 {
            continue;
        }
        let Some(start) = ((n >> level) + 1).checked_shl(level) else {
            break;
        };
        if start >= t {
            break;
        }
        out.push(start);
    }
    out
}
