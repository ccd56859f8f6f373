// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use kt_tree::TreeError;
use std::fmt;
use thiserror::Error;

/// The key that produced a signature over a tree head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    Service,
    Auditor,
}

impl fmt::Display for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signer::Service => "service",
            Signer::Auditor => "auditor",
        })
    }
}

/// The baseline a consistency check was run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyTarget {
    Last,
    Distinguished,
    Auditor,
}

impl fmt::Display for ConsistencyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsistencyTarget::Last => "last",
            ConsistencyTarget::Distinguished => "distinguished",
            ConsistencyTarget::Auditor => "auditor",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VrfError {
    #[error("invalid VRF proof")]
    InvalidVrfProof,
    #[error("malformed VRF public key")]
    MalformedPublicKey,
    #[error("could not hash input to the curve")]
    HashToCurve,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("prefix tree copath has {len} entries, at most {max} allowed")]
    PathLengthMismatch { len: usize, max: usize },
    #[error("prefix tree counter {counter} is below the known counter {bound}")]
    VersionRegression { counter: u32, bound: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search path inconsistent: {0}")]
    PathInconsistent(String),
    #[error("position {pos} out of range for tree of size {tree_size}")]
    PositionOutOfRange { pos: u64, tree_size: u64 },
    #[error("counter {counter} at position {position} does not exceed counter {earlier} found before it")]
    VersionRegression {
        position: u64,
        counter: u32,
        earlier: u32,
    },
    #[error("identifier not found, insertion point {insertion_point}")]
    NotFound { insertion_point: u64 },
    #[error("prefix proof at position {position}: {source}")]
    Prefix { position: u64, source: PrefixError },
}

/// Every way a key transparency response can fail verification. All of them are terminal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error("prefix tree copath has {len} entries, at most {max} allowed")]
    PrefixPathLengthMismatch { len: usize, max: usize },
    #[error("monitoring frontier incomplete: expected {expected} steps, got {got}")]
    FrontierIncomplete { expected: usize, got: usize },
    #[error("required field missing: {0}")]
    MissingField(&'static str),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("bad {0} tree head signature")]
    BadSignature(Signer),
    #[error("invalid VRF proof")]
    InvalidVrfProof,
    #[error("commitment does not open to the returned value")]
    CommitmentMismatch,
    #[error("recomputed root does not match")]
    RootMismatch,
    #[error("inclusion proof does not lead to the signed root")]
    InclusionMismatch,
    #[error("conflicting leaf hashes for log position {position}")]
    PrefixRootMismatch { position: u64 },

    #[error("consistency check against {which} tree head failed: {reason}")]
    ConsistencyCheckFailed {
        which: ConsistencyTarget,
        reason: String,
    },
    #[error("{signer} tree head timestamp {timestamp} is outside the accepted window at {now}")]
    StaleTreeHead {
        signer: Signer,
        timestamp: i64,
        now: i64,
    },
    #[error("tree head is not monotonic: {0}")]
    NonMonotonicTreeHead(String),

    #[error("search path inconsistent: {0}")]
    SearchPathInconsistent(String),
    #[error("position {pos} out of range for tree of size {tree_size}")]
    PositionOutOfRange { pos: u64, tree_size: u64 },
    #[error("version regression at position {position}: counter {counter} conflicts with known counter {known}")]
    VersionRegression {
        position: u64,
        counter: u32,
        known: u32,
    },
    #[error("identifier not found, insertion point {insertion_point}")]
    NotFound { insertion_point: u64 },
}

/// Coarse classification of a [`VerificationError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    Cryptographic,
    Consistency,
    Logical,
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedProof(_)
            | Self::PrefixPathLengthMismatch { .. }
            | Self::FrontierIncomplete { .. }
            | Self::MissingField(_)
            | Self::InvalidRequest(_) => ErrorKind::MalformedInput,
            Self::BadSignature(_)
            | Self::InvalidVrfProof
            | Self::CommitmentMismatch
            | Self::RootMismatch
            | Self::InclusionMismatch
            | Self::PrefixRootMismatch { .. } => ErrorKind::Cryptographic,
            Self::ConsistencyCheckFailed { .. }
            | Self::StaleTreeHead { .. }
            | Self::NonMonotonicTreeHead(_) => ErrorKind::Consistency,
            Self::SearchPathInconsistent(_)
            | Self::PositionOutOfRange { .. }
            | Self::VersionRegression { .. }
            | Self::NotFound { .. } => ErrorKind::Logical,
        }
    }

    /// Attributes a prefix proof failure to the log position whose proof failed.
    pub(crate) fn prefix_at(e: PrefixError, position: u64) -> Self {
        match e {
            PrefixError::PathLengthMismatch { len, max } => {
                Self::PrefixPathLengthMismatch { len, max }
            }
            PrefixError::VersionRegression { counter, bound } => Self::VersionRegression {
                position,
                counter,
                known: bound,
            },
        }
    }

    pub(crate) fn consistency(which: ConsistencyTarget, reason: impl fmt::Display) -> Self {
        Self::ConsistencyCheckFailed {
            which,
            reason: reason.to_string(),
        }
    }
}

impl From<TreeError> for VerificationError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::RootMismatch => Self::RootMismatch,
            other => Self::MalformedProof(other.to_string()),
        }
    }
}

impl From<VrfError> for VerificationError {
    fn from(e: VrfError) -> Self {
        match e {
            VrfError::MalformedPublicKey => Self::InvalidRequest(e.to_string()),
            VrfError::InvalidVrfProof | VrfError::HashToCurve => Self::InvalidVrfProof,
        }
    }
}

impl From<SearchError> for VerificationError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::PathInconsistent(s) => Self::SearchPathInconsistent(s),
            SearchError::PositionOutOfRange { pos, tree_size } => {
                Self::PositionOutOfRange { pos, tree_size }
            }
            SearchError::VersionRegression {
                position,
                counter,
                earlier,
            } => Self::VersionRegression {
                position,
                counter,
                known: earlier,
            },
            SearchError::NotFound { insertion_point } => Self::NotFound { insertion_point },
            SearchError::Prefix { position, source } => Self::prefix_at(source, position),
        }
    }
}
