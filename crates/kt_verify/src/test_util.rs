// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! In-memory key transparency log and signing keys for tests.

use crate::commitment::{commit, OPENING_SIZE};
use crate::config::PublicConfig;
use crate::error::Signer;
use crate::prefix::{entry_leaf_hash, verify_prefix};
use crate::proto::{
    AuditorTreeHead, CommitmentIndex, CondensedTreeSearchResponse, FullTreeHead, MonitorProof,
    PrefixSearchResult, ProofStep, SearchKey, SearchProof, TreeHead, UpdateValue, INDEX_SIZE,
};
use crate::search::midpoint;
use crate::tree_head::tree_head_message;
use crate::vrf::VrfSecretKey;
use ed25519_dalek::{Signer as _, SigningKey};
use kt_tree::{prove_batch, prove_tree, record_hash, stored_hashes_for_record_hash, tree_hash, Hash};
use std::cmp::Ordering;

/// Evaluation time used throughout the tests: 2025-10-09T08:53:20Z.
pub const NOW: i64 = 1_760_000_000_000;

/// Fixed service, auditor and VRF keys.
pub struct TestKeys {
    pub service: SigningKey,
    pub auditor: SigningKey,
    pub vrf: VrfSecretKey,
}

impl TestKeys {
    pub fn new() -> Self {
        Self {
            service: SigningKey::from_bytes(&[0x11; 32]),
            auditor: SigningKey::from_bytes(&[0x22; 32]),
            vrf: VrfSecretKey::from_seed(&[0x33; 32]),
        }
    }

    pub fn config(&self) -> PublicConfig {
        PublicConfig::new(
            "kt.example.com/log",
            self.service.verifying_key(),
            self.vrf.public_key(),
            None,
        )
    }

    pub fn config_with_auditor(&self) -> PublicConfig {
        PublicConfig {
            auditor_key: Some(self.auditor.verifying_key()),
            ..self.config()
        }
    }

    fn sign(
        key: &SigningKey,
        config: &PublicConfig,
        signer: Signer,
        tree_size: u64,
        timestamp: i64,
        root: &Hash,
    ) -> Vec<u8> {
        let msg = tree_head_message(config, signer, tree_size, timestamp, root);
        key.sign(&msg).to_bytes().to_vec()
    }

    /// A service-signed tree head with no consistency proofs and no auditor head.
    pub fn full_tree_head(
        &self,
        config: &PublicConfig,
        tree_size: u64,
        timestamp: i64,
        root: Hash,
    ) -> FullTreeHead {
        FullTreeHead {
            tree_head: TreeHead {
                tree_size,
                timestamp,
                root,
                signature: Self::sign(&self.service, config, Signer::Service, tree_size, timestamp, &root),
            },
            consistency_to_last: vec![],
            consistency_to_distinguished: vec![],
            auditor_tree_head: None,
        }
    }

    /// An auditor head signed over `signed_root`, carrying `root_value` and no proof.
    pub fn auditor_tree_head(
        &self,
        config: &PublicConfig,
        tree_size: u64,
        timestamp: i64,
        signed_root: Hash,
        root_value: Option<Hash>,
    ) -> AuditorTreeHead {
        AuditorTreeHead {
            tree_head: TreeHead {
                tree_size,
                timestamp,
                root: signed_root,
                signature: Self::sign(&self.auditor, config, Signer::Auditor, tree_size, timestamp, &signed_root),
            },
            root_value,
            consistency: vec![],
        }
    }

    /// The VRF proof for `key` and the index it resolves to.
    pub fn vrf_index(&self, key: &SearchKey) -> (Vec<u8>, CommitmentIndex) {
        let proof = self.vrf.prove(&key.to_bytes()).unwrap();
        let index = crate::vrf::resolve(&self.vrf.public_key(), &key.to_bytes(), &proof).unwrap();
        (proof.to_vec(), index)
    }
}

/// One entry of a [`TestLog`] with everything needed to prove it.
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub index: CommitmentIndex,
    pub counter: u32,
    pub value: Vec<u8>,
    pub opening: [u8; OPENING_SIZE],
    pub copath: Vec<Hash>,
    pub commitment: Hash,
}

/// A log sorted by commitment index whose stored hashes are kept in memory.
pub struct TestLog {
    entries: Vec<TestEntry>,
    storage: Vec<Hash>,
}

impl TestLog {
    /// Builds a log from `(index, value)` pairs sorted by index. Repeated indexes become
    /// successive versions.
    pub fn new(sorted: Vec<(CommitmentIndex, Vec<u8>)>) -> Self {
        let mut entries: Vec<TestEntry> = Vec::with_capacity(sorted.len());
        let mut storage = Vec::new();
        for (pos, (index, value)) in sorted.into_iter().enumerate() {
            let pos = pos as u64;
            let counter = match entries.last() {
                Some(prev) if prev.index == index => prev.counter + 1,
                Some(prev) => {
                    assert!(prev.index < index, "entries must be sorted");
                    0
                }
                None => 0,
            };
            let mut opening = [0x5a; OPENING_SIZE];
            opening[..8].copy_from_slice(&pos.to_be_bytes());
            let copath = (0..pos % 5)
                .map(|j| record_hash(format!("prefix node {pos} {j}").as_bytes()))
                .collect();
            let entry = TestEntry {
                index,
                counter,
                commitment: commit(&opening, pos, &value),
                value,
                opening,
                copath,
            };
            let leaf = Self::leaf(&entry);
            storage.extend(stored_hashes_for_record_hash(pos, leaf, &storage).unwrap());
            entries.push(entry);
        }
        Self { entries, storage }
    }

    /// A log of `n` distinct identifiers, each with a single version.
    pub fn with_size(n: u64) -> Self {
        Self::new(
            (0..n)
                .map(|i| {
                    let mut index = [0u8; INDEX_SIZE];
                    index[..8].copy_from_slice(&((i + 1) << 8).to_be_bytes());
                    (CommitmentIndex(index), format!("value {i}").into_bytes())
                })
                .collect(),
        )
    }

    /// A log whose indexes repeat the given byte across all 32 bytes.
    pub fn from_versions(bytes: &[u8]) -> Self {
        Self::new(
            bytes
                .iter()
                .enumerate()
                .map(|(i, &b)| (CommitmentIndex([b; INDEX_SIZE]), format!("value {i}").into_bytes()))
                .collect(),
        )
    }

    fn leaf(entry: &TestEntry) -> Hash {
        let sub_root = verify_prefix(&entry.index, &Self::prefix(entry), None).unwrap();
        entry_leaf_hash(&sub_root.root, &entry.commitment)
    }

    fn prefix(entry: &TestEntry) -> PrefixSearchResult {
        PrefixSearchResult {
            copath: entry.copath.clone(),
            counter: entry.counter,
        }
    }

    pub fn entry(&self, pos: u64) -> &TestEntry {
        &self.entries[pos as usize]
    }

    pub fn root(&self, size: u64) -> Hash {
        tree_hash(size, &self.storage).unwrap()
    }

    pub fn consistency(&self, old: u64, new: u64) -> Vec<Hash> {
        prove_tree(new, old, &self.storage).unwrap()
    }

    pub fn step(&self, pos: u64) -> ProofStep {
        let entry = self.entry(pos);
        ProofStep {
            index: entry.index,
            prefix: Self::prefix(entry),
            commitment: entry.commitment,
        }
    }

    /// Batch inclusion proof for `positions`, in any order and with repeats.
    pub fn batch_inclusion(&self, positions: &[u64], size: u64) -> Vec<Hash> {
        let mut positions = positions.to_vec();
        positions.sort_unstable();
        positions.dedup();
        prove_batch(size, &positions, &self.storage).unwrap()
    }

    /// Replays a binary search for `target` over the first `size` entries, returning the
    /// visited positions and the position found, if any.
    pub fn search_path(&self, target: &CommitmentIndex, size: u64) -> (Vec<u64>, Option<u64>) {
        let (mut lo, mut hi) = (0, size);
        let mut visited = Vec::new();
        while lo < hi {
            let mid = midpoint(lo, hi);
            visited.push(mid);
            let entry = self.entry(mid);
            match entry.index.cmp(target) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal if entry.counter == 0 => return (visited, Some(mid)),
                Ordering::Equal => hi = mid,
            }
        }
        (visited, None)
    }

    pub fn search_proof(&self, target: &CommitmentIndex, size: u64) -> SearchProof {
        let (visited, found) = self.search_path(target, size);
        SearchProof {
            pos: found.unwrap_or(0),
            steps: visited.iter().map(|&p| self.step(p)).collect(),
            inclusion: self.batch_inclusion(&visited, size),
        }
    }

    /// The full per-identifier response for an identifier present in the log.
    pub fn condensed(&self, vrf_proof: Vec<u8>, target: &CommitmentIndex, size: u64) -> CondensedTreeSearchResponse {
        let search = self.search_proof(target, size);
        let entry = self.entry(search.pos);
        CondensedTreeSearchResponse {
            vrf_proof,
            opening: entry.opening.to_vec(),
            value: UpdateValue {
                value: entry.value.clone(),
            },
            search,
        }
    }

    pub fn monitor_proof(&self, pos: u64, size: u64) -> MonitorProof {
        MonitorProof {
            steps: crate::monitor::monitored_positions(pos, size)
                .into_iter()
                .map(|p| self.step(p))
                .collect(),
        }
    }
}
