// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Binary search proofs.
//!
//! The log is sorted by commitment index, and successive versions of one identifier occupy
//! consecutive entries with increasing counters. A search proof lists the entries a binary
//! search for an index visits; replaying the search shows where the identifier's first entry
//! sits.

use crate::error::SearchError;
use crate::prefix::{entry_leaf_hash, verify_prefix};
use crate::proto::{CommitmentIndex, ProofStep};
use kt_tree::Hash;
use std::cmp::Ordering;

/// A log entry touched by a proof, with the leaf hash its proof step implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchedLeaf {
    pub position: u64,
    pub leaf: Hash,
}

/// The result of replaying a search proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Position of the identifier's first entry.
    pub position: u64,
    /// Index into the proof's steps of the entry at `position`.
    pub step: usize,
    /// Every entry the search visited, in visiting order.
    pub touched: Vec<TouchedLeaf>,
}

/// Returns the position a binary search over `[lo, hi)` visits next.
pub fn midpoint(lo: u64, hi: u64) -> u64 {
    lo + (hi - lo) / 2
}

/// Replays the binary search for `target` in a log of `tree_size` entries and checks that it
/// ends at `claimed_pos`.
///
/// # Errors
///
/// Returns [`SearchError::PositionOutOfRange`] if `claimed_pos` is outside the tree,
/// [`SearchError::NotFound`] if the steps show the identifier is absent,
/// [`SearchError::VersionRegression`] if counters do not decrease towards the first entry,
/// and [`SearchError::PathInconsistent`] if the steps do not describe exactly one search
/// ending at `claimed_pos`.
pub fn verify_search(
    steps: &[ProofStep],
    target: &CommitmentIndex,
    tree_size: u64,
    claimed_pos: u64,
) -> Result<SearchOutcome, SearchError> {
    if claimed_pos >= tree_size {
        return Err(SearchError::PositionOutOfRange {
            pos: claimed_pos,
            tree_size,
        });
    }

    let (mut lo, mut hi) = (0, tree_size);
    let mut touched = Vec::with_capacity(steps.len());
    let mut latest_match: Option<(u64, u32)> = None;
    let mut found = None;

    for (i, step) in steps.iter().enumerate() {
        if found.is_some() {
            return Err(SearchError::PathInconsistent(format!(
                "{} steps after the search terminated",
                steps.len() - i
            )));
        }
        if lo >= hi {
            return Err(SearchError::PathInconsistent(format!(
                "{} steps after the search interval emptied",
                steps.len() - i
            )));
        }
        let position = midpoint(lo, hi);
        let sub_root = verify_prefix(&step.index, &step.prefix, None)
            .map_err(|source| SearchError::Prefix { position, source })?;
        touched.push(TouchedLeaf {
            position,
            leaf: entry_leaf_hash(&sub_root.root, &step.commitment),
        });

        match step.index.cmp(target) {
            Ordering::Less => lo = position + 1,
            Ordering::Greater => hi = position,
            Ordering::Equal => {
                // Moving left, each version of the identifier must be older than the last.
                if let Some((later, later_counter)) = latest_match {
                    if later_counter <= sub_root.counter {
                        return Err(SearchError::VersionRegression {
                            position: later,
                            counter: later_counter,
                            earlier: sub_root.counter,
                        });
                    }
                }
                latest_match = Some((position, sub_root.counter));
                if sub_root.counter == 0 {
                    found = Some((position, i));
                } else {
                    hi = position;
                }
            }
        }
    }

    match (found, latest_match) {
        (Some((position, step)), _) if position == claimed_pos => Ok(SearchOutcome {
            position,
            step,
            touched,
        }),
        (Some((position, _)), _) => Err(SearchError::PathInconsistent(format!(
            "search ends at {position}, response claims {claimed_pos}"
        ))),
        (None, _) if lo < hi => Err(SearchError::PathInconsistent(
            "steps end before the search terminated".into(),
        )),
        (None, Some((position, counter))) => Err(SearchError::PathInconsistent(format!(
            "counter {counter} at {position} has no first version before it"
        ))),
        (None, None) => Err(SearchError::NotFound { insertion_point: lo }),
    }
}
