// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Request and response structures exchanged with a key transparency service.
//!
//! Byte strings are encoded as standard base64 in JSON. Optional fields stay optional: an
//! absent value is never the same thing as an empty one.

use kt_tree::Hash;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::fmt;

/// Size of a commitment index and of a commitment opening.
pub const INDEX_SIZE: usize = 32;

/// A VRF-derived position of an identifier in the log's sort order.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitmentIndex(#[serde_as(as = "Base64")] pub [u8; INDEX_SIZE]);

impl CommitmentIndex {
    /// Returns bit `i` of the index, counting from the most significant bit of the first byte.
    pub fn bit(&self, i: usize) -> bool {
        (self.0[i / 8] >> (7 - i % 8)) & 1 == 1
    }
}

impl fmt::Display for CommitmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CommitmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentIndex({self})")
    }
}

/// The identifiers a log binds values to.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKey {
    Aci(#[serde_as(as = "Base64")] [u8; 16]),
    E164(String),
    UsernameHash(#[serde_as(as = "Base64")] [u8; 32]),
    Distinguished,
}

impl SearchKey {
    /// The VRF input for this identifier.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SearchKey::Aci(aci) => [b"a".as_slice(), aci.as_slice()].concat(),
            SearchKey::E164(e164) => [b"n".as_slice(), e164.as_bytes()].concat(),
            SearchKey::UsernameHash(hash) => [b"u".as_slice(), hash.as_slice()].concat(),
            SearchKey::Distinguished => b"distinguished".to_vec(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeHead {
    pub tree_size: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub root: Hash,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorTreeHead {
    pub tree_head: TreeHead,
    /// The auditor's root when it lags the service's tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_value: Option<Hash>,
    /// Consistency proof from the auditor's size to the service's size.
    #[serde(default)]
    pub consistency: Vec<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTreeHead {
    pub tree_head: TreeHead,
    #[serde(default)]
    pub consistency_to_last: Vec<Hash>,
    #[serde(default)]
    pub consistency_to_distinguished: Vec<Hash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditor_tree_head: Option<AuditorTreeHead>,
}

/// Tree sizes the caller has already verified and wants consistency proofs from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinguished: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixSearchResult {
    /// Sibling hashes from the leaf up to the root.
    pub copath: Vec<Hash>,
    pub counter: u32,
}

/// A log entry visited by a search or monitoring proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// The commitment index of the identifier this entry belongs to.
    pub index: CommitmentIndex,
    pub prefix: PrefixSearchResult,
    pub commitment: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProof {
    pub pos: u64,
    pub steps: Vec<ProofStep>,
    pub inclusion: Vec<Hash>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateValue {
    #[serde_as(as = "Base64")]
    pub value: Vec<u8>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondensedTreeSearchResponse {
    #[serde_as(as = "Base64")]
    pub vrf_proof: Vec<u8>,
    pub search: SearchProof,
    #[serde_as(as = "Base64")]
    pub opening: Vec<u8>,
    pub value: UpdateValue,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde_as(as = "Base64")]
    pub aci: [u8; 16],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e164: Option<String>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_hash: Option<[u8; 32]>,
    #[serde(default)]
    pub consistency: ConsistencyParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub tree_head: FullTreeHead,
    pub aci: CondensedTreeSearchResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e164: Option<CondensedTreeSearchResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_hash: Option<CondensedTreeSearchResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedRequest {
    #[serde(default)]
    pub consistency: ConsistencyParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinguishedResponse {
    pub tree_head: FullTreeHead,
    pub distinguished: CondensedTreeSearchResponse,
}

/// A previously verified entry the caller keeps watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorKey {
    pub search_key: SearchKey,
    pub entry_position: u64,
    pub commitment_index: CommitmentIndex,
    pub counter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRequest {
    pub keys: Vec<MonitorKey>,
    #[serde(default)]
    pub consistency: ConsistencyParameters,
}

/// The monitored entry followed by the entries on its frontier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorProof {
    pub steps: Vec<ProofStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorResponse {
    pub tree_head: FullTreeHead,
    pub proofs: Vec<MonitorProof>,
    pub inclusion: Vec<Hash>,
}

/// A tree head that passed verification. This is what callers persist between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedTreeHead {
    pub tree_size: u64,
    pub timestamp: i64,
    pub root: Hash,
}

impl From<&TreeHead> for VerifiedTreeHead {
    fn from(head: &TreeHead) -> Self {
        Self {
            tree_size: head.tree_size,
            timestamp: head.timestamp,
            root: head.root,
        }
    }
}

/// An identifier's value, proven to be its first log entry in the verified tree.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedValue {
    pub search_key: SearchKey,
    pub index: CommitmentIndex,
    pub position: u64,
    #[serde_as(as = "Base64")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub aci: VerifiedValue,
    pub e164: Option<VerifiedValue>,
    pub username_hash: Option<VerifiedValue>,
    pub tree_head: VerifiedTreeHead,
}

/// The newest state of a monitored identifier seen on its frontier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredKey {
    pub search_key: SearchKey,
    pub entry_position: u64,
    pub latest_counter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorResult {
    pub keys: Vec<MonitoredKey>,
    pub tree_head: VerifiedTreeHead,
}
