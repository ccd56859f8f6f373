// Ported from "mod" (https://pkg.go.dev/golang.org/x/mod)
// Copyright 2009 The Go Authors
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause
//
// This ports code from the original Go project "mod" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Merkle tree hashing, stored hash layout, record proofs and consistency proofs.
//!
//! References:
//! - [tlog.go](https://cs.opensource.google/go/x/mod/+/refs/tags/v0.21.0:sumdb/tlog/tlog.go)
//! - [RFC 6962, Section 2.1](https://tools.ietf.org/html/rfc6962#section-2.1)

use base64::prelude::*;
use serde::{
    de::{self, Visitor},
    Deserialize, Serialize, Serializer,
};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// `HASH_SIZE` is the size of a Hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A Hash is a hash identifying a log entry, a prefix tree node or a tree root.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE64_STANDARD.encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct HashVisitor;

        impl Visitor<'_> for HashVisitor {
            type Value = Hash;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a base64 encoded string representing a 32-byte hash")
            }

            fn visit_str<E>(self, value: &str) -> Result<Hash, E>
            where
                E: de::Error,
            {
                Hash::parse_hash(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(HashVisitor)
    }
}

impl Hash {
    /// Returns a new Hash with contents decoded from the given base64-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not base64 or the decoded size is not `HASH_SIZE`.
    pub fn parse_hash(s: &str) -> Result<Self, TreeError> {
        let data = BASE64_STANDARD.decode(s)?;
        let len = data.len();
        Ok(Hash(data.try_into().map_err(|_| {
            TreeError::InvalidInput(format!("expected {HASH_SIZE} bytes, got {len}"))
        })?))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error("recomputed root does not match")]
    RootMismatch,
    #[error("indexes out of order")]
    IndexesOutOfOrder,
    #[error("unmet input condition: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    InvalidBase64(#[from] base64::DecodeError),
}

/// maxpow2 returns k, the maximum power of 2 smaller than n,
/// as well as l = log₂ k (so k = 1<<l).
///
/// Must be called with n > 1.
pub(crate) fn maxpow2(n: u64) -> (u64, u8) {
    // ilog2 of a u64 is at most 63.
    #[allow(clippy::cast_possible_truncation)]
    let l = (n - 1).ilog2() as u8;
    (1 << l, l)
}

/// Returns the content hash for the given record data.
pub fn record_hash(data: &[u8]) -> Hash {
    // SHA256(0x00 || data)
    // https://tools.ietf.org/html/rfc6962#section-2.1
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Returns the hash for an interior tree node with the given left and right hashes.
pub fn node_hash(left: Hash, right: Hash) -> Hash {
    // SHA256(0x01 || left || right)
    // https://tools.ietf.org/html/rfc6962#section-2.1
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left.0);
    hasher.update(right.0);
    Hash(hasher.finalize().into())
}

/// Maps the tree coordinates `(level, n)` to a dense linear ordering that can be used for hash
/// storage.
///
/// For information about the stored hash index ordering, see section 3.3 of Crosby and Wallach's
/// paper ["Efficient Data Structures for Tamper-Evident
/// Logging"](https://www.usenix.org/legacy/event/sec09/tech/full_papers/crosby.pdf).
pub fn stored_hash_index(level: u8, n: u64) -> u64 {
    // Level L's n'th hash is written right after level L+1's 2n+1'th hash.
    let mut n = n;
    for _ in 0..level {
        n = 2 * n + 1;
    }

    // Level 0's n'th hash is written at n+n/2+n/4+... (eventually n/2ⁱ hits zero).
    let mut i = 0;
    while n > 0 {
        i += n;
        n >>= 1;
    }

    i + u64::from(level)
}

/// Returns the number of stored hashes that are expected for a tree with `n` records.
pub fn stored_hash_count(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut num_hash = stored_hash_index(0, n - 1) + 1;
    let mut i = n - 1;
    while i & 1 != 0 {
        num_hash += 1;
        i >>= 1;
    }
    num_hash
}

/// Returns the hashes that must be stored when appending leaf `n` with leaf hash `h`. The
/// hashes should be stored starting at `stored_hash_index(0, n)`.
///
/// # Errors
///
/// Returns an error if `read_hashes` fails or returns the wrong number of hashes.
pub fn stored_hashes_for_record_hash<R: HashReader>(
    n: u64,
    h: Hash,
    r: &R,
) -> Result<Vec<Hash>, TreeError> {
    let mut hashes = vec![h];

    // Each trailing 1 bit in the binary representation of n completes a subtree
    // and consumes a hash from an adjacent subtree.
    #[allow(clippy::cast_possible_truncation)]
    let m = (n + 1).trailing_zeros() as u8;
    let mut indexes = vec![0_u64; m.into()];
    for i in 0..m {
        // Note that n >> i is always odd.
        indexes[usize::from(m - 1 - i)] = stored_hash_index(i, (n >> i) - 1);
    }

    let old = read_exact(r, &indexes)?;

    let mut h = h;
    for i in 0..m {
        h = node_hash(old[usize::from(m - 1 - i)], h);
        hashes.push(h);
    }

    Ok(hashes)
}

/// Like [`stored_hashes_for_record_hash`], but hashes `data` into a leaf first.
///
/// # Errors
///
/// See [`stored_hashes_for_record_hash`].
pub fn stored_hashes<R: HashReader>(n: u64, data: &[u8], r: &R) -> Result<Vec<Hash>, TreeError> {
    stored_hashes_for_record_hash(n, record_hash(data), r)
}

/// A `HashReader` can read hashes for nodes in the log's tree structure.
pub trait HashReader {
    /// Returns the hashes with the given stored hash indexes (see [`stored_hash_index`]).
    ///
    /// # Errors
    ///
    /// Must return a slice of hashes the same length as indexes, or
    /// else it must return an error.
    fn read_hashes(&self, indexes: &[u64]) -> Result<Vec<Hash>, TreeError>;
}

impl HashReader for Vec<Hash> {
    fn read_hashes(&self, indexes: &[u64]) -> Result<Vec<Hash>, TreeError> {
        indexes
            .iter()
            .map(|&index| {
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.get(i).copied())
                    .ok_or_else(|| TreeError::InvalidInput(format!("index {index} not stored")))
            })
            .collect()
    }
}

pub(crate) fn read_exact<R: HashReader>(r: &R, indexes: &[u64]) -> Result<Vec<Hash>, TreeError> {
    if indexes.is_empty() {
        return Ok(vec![]);
    }
    let hashes = r.read_hashes(indexes)?;
    if hashes.len() != indexes.len() {
        return Err(TreeError::InvalidInput(format!(
            "read_hashes returned {} hashes for {} indexes",
            hashes.len(),
            indexes.len()
        )));
    }
    Ok(hashes)
}

/// `EMPTY_HASH` is the hash of the empty tree, per RFC 6962, Section 2.1.
/// It is the hash of the empty string.
pub const EMPTY_HASH: Hash = Hash([
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
]);

/// Computes the hash for the root of the tree with `n` records, using the [`HashReader`] to obtain
/// previously stored hashes.
///
/// # Errors
///
/// Returns an error if `read_hashes` fails to read hashes.
pub fn tree_hash<R: HashReader>(n: u64, r: &R) -> Result<Hash, TreeError> {
    if n == 0 {
        return Ok(EMPTY_HASH);
    }
    let indexes = sub_tree_index(0, n, vec![]);
    let hashes = read_exact(r, &indexes)?;
    let (hash, _) = sub_tree_hash(0, n, &hashes);
    Ok(hash)
}

/// Returns the leaf ranges `[lo, hi)` of the complete (power-of-two) subtrees whose roots
/// make up a tree of size `t`, from left to right.
pub fn complete_subtrees(t: u64) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    let mut lo = 0;
    while lo < t {
        let (k, _) = maxpow2(t - lo + 1);
        out.push((lo, lo + k));
        lo += k;
    }
    out
}

/// Returns the leaf ranges of the sibling subtrees on the path from leaf `n` to the root of a
/// tree of size `t`, bottom-up. These are the subtrees whose hashes make up the audit path of
/// leaf `n`.
///
/// # Errors
///
/// Returns an error if `n >= t`.
pub fn copath_ranges(n: u64, t: u64) -> Result<Vec<(u64, u64)>, TreeError> {
    if n >= t {
        return Err(TreeError::InvalidInput("n >= t".into()));
    }
    let mut out = Vec::new();
    let (mut lo, mut hi) = (0, t);
    while lo + 1 < hi {
        let (k, _) = maxpow2(hi - lo);
        if n < lo + k {
            out.push((lo + k, hi));
            hi = lo + k;
        } else {
            out.push((lo, lo + k));
            lo += k;
        }
    }
    out.reverse();
    Ok(out)
}

/// Returns the storage indexes needed to compute the hash for the subtree containing records [lo,
/// hi), appending them to need and returning the result.  See
/// <https://tools.ietf.org/html/rfc6962#section-2.1>.
pub fn sub_tree_index(lo: u64, hi: u64, mut need: Vec<u64>) -> Vec<u64> {
    let mut lo = lo;
    while lo < hi {
        let (k, level) = maxpow2(hi - lo + 1);
        debug_assert!(lo & (k - 1) == 0, "bad math in sub_tree_index");
        need.push(stored_hash_index(level, lo >> level));
        lo += k;
    }
    need
}

// Computes the hash for the subtree containing records [lo, hi), assuming that hashes are the
// hashes corresponding to the indexes returned by sub_tree_index(lo, hi). It returns any leftover
// hashes.
pub(crate) fn sub_tree_hash(lo: u64, hi: u64, hashes: &[Hash]) -> (Hash, Vec<Hash>) {
    // Repeatedly partition the tree into a left side with 2^level nodes,
    // for as large a level as possible, and a right side with the fringe.
    let mut num_tree = 0;
    let mut lo = lo;
    while lo < hi {
        let (k, _) = maxpow2(hi - lo + 1);
        num_tree += 1;
        lo += k;
    }

    let mut h = hashes[num_tree - 1];
    for i in (0..num_tree - 1).rev() {
        h = node_hash(hashes[i], h);
    }
    (h, hashes[num_tree..].to_vec())
}

/// A `RecordProof` is a verifiable proof that a particular log root contains a particular leaf.
/// RFC 6962 calls this a “Merkle audit path.”
pub type RecordProof = Vec<Hash>;

/// Returns the proof that the tree of size `t` contains the leaf with index `n`.
///
/// # Errors
///
/// Returns an error if `n >= t` or if `read_hashes` fails to read hashes.
pub fn prove_record<R: HashReader>(t: u64, n: u64, r: &R) -> Result<RecordProof, TreeError> {
    if n >= t {
        return Err(TreeError::InvalidInput("n >= t".into()));
    }
    let indexes = leaf_proof_index(0, t, n, vec![]);
    let hashes = read_exact(r, &indexes)?;
    let (proof, _) = leaf_proof(0, t, n, hashes);
    Ok(proof)
}

fn leaf_proof_index(lo: u64, hi: u64, n: u64, mut need: Vec<u64>) -> Vec<u64> {
    if lo + 1 == hi {
        return need;
    }
    let (k, _) = maxpow2(hi - lo);
    if n < lo + k {
        need = leaf_proof_index(lo, lo + k, n, need);
        need = sub_tree_index(lo + k, hi, need);
    } else {
        need = sub_tree_index(lo, lo + k, need);
        need = leaf_proof_index(lo + k, hi, n, need);
    }
    need
}

fn leaf_proof(lo: u64, hi: u64, n: u64, mut hashes: Vec<Hash>) -> (RecordProof, Vec<Hash>) {
    if lo + 1 == hi {
        // The verifier knows the leaf hash, so we don't need to send it.
        return (vec![], hashes);
    }

    // Walk down the tree toward n, recording the hash of the path not taken.
    let mut proof: RecordProof;
    let th: Hash;
    let (k, _) = maxpow2(hi - lo);
    if n < lo + k {
        (proof, hashes) = leaf_proof(lo, lo + k, n, hashes);
        (th, hashes) = sub_tree_hash(lo + k, hi, &hashes);
    } else {
        (th, hashes) = sub_tree_hash(lo, lo + k, &hashes);
        (proof, hashes) = leaf_proof(lo + k, hi, n, hashes);
    }

    proof.push(th);
    (proof, hashes)
}

/// Verifies that `p` is a valid proof that the tree of size `t` with hash `th` has an `n`'th
/// leaf with hash `h`.
///
/// # Errors
///
/// Returns [`TreeError::MalformedProof`] if `p` has the wrong shape and
/// [`TreeError::RootMismatch`] if it does not lead to `th`.
pub fn check_record(p: &[Hash], t: u64, th: Hash, n: u64, h: Hash) -> Result<(), TreeError> {
    if n >= t {
        return Err(TreeError::InvalidInput("n >= t".into()));
    }
    let th2 = run_record_proof(p, 0, t, n, h)?;
    if th2 == th {
        Ok(())
    } else {
        Err(TreeError::RootMismatch)
    }
}

fn run_record_proof(p: &[Hash], lo: u64, hi: u64, n: u64, leaf_hash: Hash) -> Result<Hash, TreeError> {
    if lo + 1 == hi {
        if !p.is_empty() {
            return Err(TreeError::MalformedProof("audit path too long".into()));
        }
        return Ok(leaf_hash);
    }

    let Some((last, rest)) = p.split_last() else {
        return Err(TreeError::MalformedProof("audit path too short".into()));
    };

    let (k, _) = maxpow2(hi - lo);
    if n < lo + k {
        let th = run_record_proof(rest, lo, lo + k, n, leaf_hash)?;
        Ok(node_hash(th, *last))
    } else {
        let th = run_record_proof(rest, lo + k, hi, n, leaf_hash)?;
        Ok(node_hash(*last, th))
    }
}

/// A `TreeProof` is a verifiable proof that a particular log tree contains
/// as a prefix all records present in an earlier tree.
/// RFC 6962 calls this a “Merkle consistency proof.”
pub type TreeProof = Vec<Hash>;

/// Returns the proof that the tree of size `t` contains
/// as a prefix all the records from the tree of smaller size `n`.
///
/// # Errors
///
/// Returns an error if the inputs are invalid or if `read_hashes` fails to read hashes.
pub fn prove_tree<R: HashReader>(t: u64, n: u64, h: &R) -> Result<TreeProof, TreeError> {
    if !(1..=t).contains(&n) {
        return Err(TreeError::InvalidInput("1 <= n <= t".into()));
    }
    let indexes = tree_proof_index(0, t, n, vec![]);
    let hashes = read_exact(h, &indexes)?;
    let (p, _) = tree_proof(0, t, n, hashes);
    Ok(p)
}

/// Returns the number of hashes in a consistency proof from size `n` to size `t`.
///
/// # Errors
///
/// Returns an error unless `1 <= n <= t`.
pub fn tree_proof_len(n: u64, t: u64) -> Result<usize, TreeError> {
    if !(1..=t).contains(&n) {
        return Err(TreeError::InvalidInput("1 <= n <= t".into()));
    }
    let (mut lo, mut hi) = (0, t);
    let mut len = 0;
    while n != hi {
        let (k, _) = maxpow2(hi - lo);
        if n <= lo + k {
            hi = lo + k;
        } else {
            lo += k;
        }
        len += 1;
    }
    if lo != 0 {
        len += 1;
    }
    Ok(len)
}

// Builds the list of indexes needed to construct
// the sub-proof related to the subtree containing records [lo, hi).
// See https://tools.ietf.org/html/rfc6962#section-2.1.2.
fn tree_proof_index(lo: u64, hi: u64, n: u64, mut need: Vec<u64>) -> Vec<u64> {
    if n == hi {
        if lo == 0 {
            return need;
        }
        return sub_tree_index(lo, hi, need);
    }

    let (k, _) = maxpow2(hi - lo);
    if n <= lo + k {
        need = tree_proof_index(lo, lo + k, n, need);
        need = sub_tree_index(lo + k, hi, need);
    } else {
        need = sub_tree_index(lo, lo + k, need);
        need = tree_proof_index(lo + k, hi, n, need);
    }
    need
}

// Constructs the sub-proof related to the subtree containing records [lo, hi).
// It returns any leftover hashes as well.
fn tree_proof(lo: u64, hi: u64, n: u64, mut hashes: Vec<Hash>) -> (TreeProof, Vec<Hash>) {
    // Reached common ground.
    if n == hi {
        if lo == 0 {
            // This subtree corresponds exactly to the old tree.
            return (vec![], hashes);
        }
        let (th, hashes) = sub_tree_hash(lo, hi, &hashes);
        return (vec![th], hashes);
    }

    let mut p: TreeProof;
    let th: Hash;
    let (k, _) = maxpow2(hi - lo);
    if n <= lo + k {
        (p, hashes) = tree_proof(lo, lo + k, n, hashes);
        (th, hashes) = sub_tree_hash(lo + k, hi, &hashes);
    } else {
        (th, hashes) = sub_tree_hash(lo, lo + k, &hashes);
        (p, hashes) = tree_proof(lo + k, hi, n, hashes);
    }
    p.push(th);
    (p, hashes)
}

/// Verifies that `p` is a valid proof that the tree of size `t` with hash `th`
/// contains as a prefix the tree of size `n` with hash `h`.
///
/// # Errors
///
/// Returns [`TreeError::MalformedProof`] if `p` does not have the length a proof between
/// these sizes must have, and [`TreeError::RootMismatch`] if either reconstructed root
/// disagrees with the one supplied.
pub fn check_tree(p: &[Hash], t: u64, th: Hash, n: u64, h: Hash) -> Result<(), TreeError> {
    let want = tree_proof_len(n, t)?;
    if p.len() != want {
        return Err(TreeError::MalformedProof(format!(
            "consistency proof from {n} to {t} needs {want} hashes, got {}",
            p.len()
        )));
    }
    let (h2, th2) = run_tree_proof(p, 0, t, n, h)?;
    if th2 == th && h2 == h {
        Ok(())
    } else {
        Err(TreeError::RootMismatch)
    }
}

// Runs the sub-proof p related to the subtree containing records [lo, hi),
// where old is the hash of the old tree with n records.
// Running the proof means constructing and returning the implied hashes of that
// subtree in both the old and new tree.
fn run_tree_proof(p: &[Hash], lo: u64, hi: u64, n: u64, old: Hash) -> Result<(Hash, Hash), TreeError> {
    // Reached common ground.
    if n == hi {
        if lo == 0 {
            if !p.is_empty() {
                return Err(TreeError::MalformedProof("consistency proof too long".into()));
            }
            return Ok((old, old));
        }
        if p.len() != 1 {
            return Err(TreeError::MalformedProof("consistency proof too long".into()));
        }
        return Ok((p[0], p[0]));
    }

    let Some((last, rest)) = p.split_last() else {
        return Err(TreeError::MalformedProof("consistency proof too short".into()));
    };

    let (k, _) = maxpow2(hi - lo);
    if n <= lo + k {
        let (oh, th) = run_tree_proof(rest, lo, lo + k, n, old)?;
        Ok((oh, node_hash(th, *last)))
    } else {
        let (oh, th) = run_tree_proof(rest, lo + k, hi, n, old)?;
        Ok((node_hash(*last, oh), node_hash(*last, th)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds the stored hashes of a tree with `n` leaves `"leaf {i}"`.
    pub(crate) fn build_storage(n: u64) -> (Vec<Hash>, Vec<Hash>) {
        let mut storage = Vec::new();
        let mut leaves = Vec::new();
        for i in 0..n {
            let data = format!("leaf {i}");
            leaves.push(record_hash(data.as_bytes()));
            let hashes = stored_hashes(i, data.as_bytes(), &storage).unwrap();
            storage.extend(hashes);
        }
        (storage, leaves)
    }

    fn range_hash(storage: &Vec<Hash>, lo: u64, hi: u64) -> Hash {
        let hashes = storage.read_hashes(&sub_tree_index(lo, hi, vec![])).unwrap();
        sub_tree_hash(lo, hi, &hashes).0
    }

    #[test]
    fn test_tree() {
        let (storage, leaves) = build_storage(70);
        let mut trees = Vec::new();

        for i in 0..70u64 {
            assert_eq!(
                stored_hash_count(i + 1),
                stored_hash_index(0, i) + 1 + u64::from((i + 1).trailing_zeros())
            );
            let th = tree_hash(i + 1, &storage).unwrap();
            trees.push(th);

            // Leaf proofs for every leaf so far, each corrupted hash rejected.
            for j in 0..=i {
                let leaf = leaves[usize::try_from(j).unwrap()];
                let mut p = prove_record(i + 1, j, &storage).unwrap();
                check_record(&p, i + 1, th, j, leaf).unwrap();

                for k in 0..p.len() {
                    p[k].0[0] ^= 1;
                    assert_eq!(
                        check_record(&p, i + 1, th, j, leaf),
                        Err(TreeError::RootMismatch),
                        "check_record({}, {j}) succeeded with corrupt proof hash #{k}!",
                        i + 1
                    );
                    p[k].0[0] ^= 1;
                }
            }

            // Consistency proofs from every earlier size.
            for j in 0..=i {
                let old = trees[usize::try_from(j).unwrap()];
                let mut p = prove_tree(i + 1, j + 1, &storage).unwrap();
                assert_eq!(p.len(), tree_proof_len(j + 1, i + 1).unwrap());
                check_tree(&p, i + 1, th, j + 1, old).unwrap();
                for k in 0..p.len() {
                    p[k].0[0] ^= 1;
                    assert_eq!(
                        check_tree(&p, i + 1, th, j + 1, old),
                        Err(TreeError::RootMismatch),
                        "check_tree({}, {}) succeeded with corrupt proof hash #{k}!",
                        i + 1,
                        j + 1
                    );
                    p[k].0[0] ^= 1;
                }
            }
        }
    }

    #[test]
    fn test_consistency_truncated_or_extended() {
        let (storage, _) = build_storage(13);
        let th = tree_hash(13, &storage).unwrap();
        let h = tree_hash(5, &storage).unwrap();
        let p = prove_tree(13, 5, &storage).unwrap();
        assert!(p.len() > 1);

        let truncated = &p[..p.len() - 1];
        assert!(matches!(
            check_tree(truncated, 13, th, 5, h),
            Err(TreeError::MalformedProof(_))
        ));

        let mut extended = p.clone();
        extended.push(th);
        assert!(matches!(
            check_tree(&extended, 13, th, 5, h),
            Err(TreeError::MalformedProof(_))
        ));

        let mut reordered = p.clone();
        reordered.swap(0, 1);
        assert_eq!(
            check_tree(&reordered, 13, th, 5, h),
            Err(TreeError::RootMismatch)
        );

        // Wrong old root.
        let other = tree_hash(6, &storage).unwrap();
        assert_eq!(
            check_tree(&p, 13, th, 5, other),
            Err(TreeError::RootMismatch)
        );
    }

    #[test]
    fn test_consistency_same_size() {
        let (storage, _) = build_storage(8);
        let th = tree_hash(8, &storage).unwrap();
        assert!(prove_tree(8, 8, &storage).unwrap().is_empty());
        check_tree(&[], 8, th, 8, th).unwrap();
        assert!(matches!(
            check_tree(&[th], 8, th, 8, th),
            Err(TreeError::MalformedProof(_))
        ));
        assert!(matches!(
            check_tree(&[], 8, th, 9, th),
            Err(TreeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tree_proof_len_known_values() {
        // 2 -> 4 shares the left half; only the right half is sent.
        assert_eq!(tree_proof_len(2, 4).unwrap(), 1);
        assert_eq!(tree_proof_len(1, 4).unwrap(), 2);
        assert_eq!(tree_proof_len(3, 4).unwrap(), 3);
        assert_eq!(tree_proof_len(4, 4).unwrap(), 0);
        assert_eq!(tree_proof_len(3, 7).unwrap(), 4);
    }

    #[test]
    fn test_complete_subtrees() {
        assert!(complete_subtrees(0).is_empty());
        assert_eq!(complete_subtrees(1), vec![(0, 1)]);
        assert_eq!(complete_subtrees(8), vec![(0, 8)]);
        assert_eq!(complete_subtrees(13), vec![(0, 8), (8, 12), (12, 13)]);

        let (storage, _) = build_storage(13);
        let roots: Vec<Hash> = complete_subtrees(13)
            .into_iter()
            .map(|(lo, hi)| range_hash(&storage, lo, hi))
            .collect();
        let folded = roots
            .iter()
            .rev()
            .copied()
            .reduce(|right, left| node_hash(left, right))
            .unwrap();
        assert_eq!(folded, tree_hash(13, &storage).unwrap());
    }

    #[test]
    fn test_copath_ranges_match_record_proof() {
        let (storage, _) = build_storage(21);
        for t in 1..=21 {
            for n in 0..t {
                let ranges = copath_ranges(n, t).unwrap();
                let proof = prove_record(t, n, &storage).unwrap();
                assert_eq!(ranges.len(), proof.len());
                for (&(lo, hi), h) in ranges.iter().zip(&proof) {
                    assert_eq!(range_hash(&storage, lo, hi), *h, "t={t} n={n} [{lo},{hi})");
                }
            }
        }
        assert!(copath_ranges(3, 3).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let h = tree_hash(0, &Vec::new()).unwrap();
        assert_eq!(h, EMPTY_HASH);
    }

    #[test]
    fn test_hash_serde() {
        let h = record_hash(b"hello");
        let json = serde_json::to_string(&h).unwrap();
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
        assert!(serde_json::from_str::<Hash>("\"AAAA\"").is_err());
    }
}
