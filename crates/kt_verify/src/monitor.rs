// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Monitoring proofs.
//!
//! Once an identifier's entry is known, the caller watches it by checking the entry itself
//! and the first entry of every right sibling subtree on its path to the root (its frontier).
//! Any later version of the identifier must surface on the frontier with a higher counter,
//! and nothing on the frontier may sort before the identifier.

use crate::error::{SearchError, VerificationError};
use crate::inclusion::LeafSet;
use crate::prefix::{entry_leaf_hash, verify_prefix};
use crate::proto::{MonitorKey, MonitorProof, MonitoredKey};
use crate::search::TouchedLeaf;
use kt_tree::frontier_positions;
use std::cmp::Ordering;

/// Returns the log positions a monitoring proof for `entry_position` must cover, the entry
/// itself first.
pub fn monitored_positions(entry_position: u64, tree_size: u64) -> Vec<u64> {
    let mut positions = vec![entry_position];
    positions.extend(frontier_positions(entry_position, tree_size));
    positions
}

/// Checks the monitoring proof for `key` in a tree of `tree_size` entries, recording every
/// leaf it implies in `leaves`.
///
/// # Errors
///
/// Returns [`VerificationError::PositionOutOfRange`] if the entry is not in the tree,
/// [`VerificationError::FrontierIncomplete`] if steps are missing,
/// [`VerificationError::MalformedProof`] if there are extra steps,
/// [`VerificationError::VersionRegression`] if a later version does not raise the counter,
/// [`VerificationError::SearchPathInconsistent`] if the entry or its frontier is out of order,
/// and [`VerificationError::PrefixRootMismatch`] if a leaf conflicts with one already recorded.
pub fn verify_monitor_proof(
    key: &MonitorKey,
    proof: &MonitorProof,
    tree_size: u64,
    leaves: &mut LeafSet,
) -> Result<MonitoredKey, VerificationError> {
    if key.entry_position >= tree_size {
        return Err(SearchError::PositionOutOfRange {
            pos: key.entry_position,
            tree_size,
        }
        .into());
    }
    let positions = monitored_positions(key.entry_position, tree_size);
    match proof.steps.len().cmp(&positions.len()) {
        Ordering::Less => {
            return Err(VerificationError::FrontierIncomplete {
                expected: positions.len(),
                got: proof.steps.len(),
            })
        }
        Ordering::Greater => {
            return Err(VerificationError::MalformedProof(format!(
                "monitoring proof has {} steps, frontier has {}",
                proof.steps.len(),
                positions.len()
            )))
        }
        Ordering::Equal => {}
    }

    let mut latest_counter = key.counter;
    // Frontier positions increase, so their indexes never decrease.
    let mut max_index = key.commitment_index;
    for (i, (&position, step)) in positions.iter().zip(&proof.steps).enumerate() {
        if step.index < max_index {
            return Err(VerificationError::SearchPathInconsistent(format!(
                "entry at {position} sorts before an earlier entry on the frontier"
            )));
        }
        let same = step.index == key.commitment_index;
        if i == 0 && !same {
            return Err(VerificationError::SearchPathInconsistent(format!(
                "entry at {position} belongs to another identifier"
            )));
        }
        let sub_root = verify_prefix(&step.index, &step.prefix, same.then_some(latest_counter))
            .map_err(|e| VerificationError::prefix_at(e, position))?;
        if i == 0 && sub_root.counter != key.counter {
            return Err(VerificationError::SearchPathInconsistent(format!(
                "entry at {position} has counter {}, expected {}",
                sub_root.counter, key.counter
            )));
        }
        if same && i > 0 {
            // A later version must carry a strictly higher counter.
            if sub_root.counter == latest_counter {
                return Err(VerificationError::VersionRegression {
                    position,
                    counter: sub_root.counter,
                    known: latest_counter,
                });
            }
            latest_counter = sub_root.counter;
        }
        max_index = step.index;
        leaves.insert(TouchedLeaf {
            position,
            leaf: entry_leaf_hash(&sub_root.root, &step.commitment),
        })?;
    }

    Ok(MonitoredKey {
        search_key: key.search_key.clone(),
        entry_position: key.entry_position,
        latest_counter,
    })
}
