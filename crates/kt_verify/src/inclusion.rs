// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Batched inclusion of every log entry a response touched.

use crate::error::VerificationError;
use crate::search::TouchedLeaf;
use kt_tree::{evaluate_batch_proof, Hash, TreeError};
use std::collections::BTreeMap;

/// Leaf hashes implied by a response's proof steps, keyed by log position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafSet {
    leaves: BTreeMap<u64, Hash>,
}

impl LeafSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the leaf at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::PrefixRootMismatch`] if a different leaf was already
    /// recorded at the same position.
    pub fn insert(&mut self, touched: TouchedLeaf) -> Result<(), VerificationError> {
        match self.leaves.insert(touched.position, touched.leaf) {
            Some(previous) if previous != touched.leaf => Err(VerificationError::PrefixRootMismatch {
                position: touched.position,
            }),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Checks that `proof` proves every recorded leaf is included in the tree of size
    /// `tree_size` with root `root`.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::InclusionMismatch`] if the proof leads elsewhere and
    /// [`VerificationError::MalformedProof`] if it has the wrong shape.
    pub fn verify(&self, tree_size: u64, root: &Hash, proof: &[Hash]) -> Result<(), VerificationError> {
        let (positions, leaves): (Vec<u64>, Vec<Hash>) =
            self.leaves.iter().map(|(&pos, &leaf)| (pos, leaf)).unzip();
        match evaluate_batch_proof(tree_size, &positions, &leaves, proof) {
            Ok(computed) if computed == *root => Ok(()),
            Ok(_) | Err(TreeError::RootMismatch) => Err(VerificationError::InclusionMismatch),
            Err(e) => Err(VerificationError::MalformedProof(format!("inclusion proof: {e}"))),
        }
    }
}
