// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Consistency between an authenticated tree head and every tree the caller, or the
//! auditor, saw before.

use crate::config::{LastSeen, PublicConfig};
use crate::error::{ConsistencyTarget, VerificationError};
use crate::proto::{FullTreeHead, VerifiedTreeHead};
use crate::tree_head::AuthenticatedHead;
use kt_tree::{check_tree, Hash};
use log::debug;

/// A tree head known to extend every tree the caller and the auditor have seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistentHead {
    pub head: VerifiedTreeHead,
}

fn check_baseline(
    which: ConsistencyTarget,
    baseline: Option<VerifiedTreeHead>,
    proof: &[Hash],
    head: &VerifiedTreeHead,
) -> Result<(), VerificationError> {
    let Some(baseline) = baseline else {
        if proof.is_empty() {
            return Ok(());
        }
        return Err(VerificationError::consistency(
            which,
            "proof supplied without a baseline",
        ));
    };

    if baseline.tree_size > head.tree_size {
        return Err(VerificationError::NonMonotonicTreeHead(format!(
            "tree size {} is smaller than {which} tree size {}",
            head.tree_size, baseline.tree_size
        )));
    }
    if baseline.tree_size == head.tree_size || baseline.tree_size == 0 {
        if !proof.is_empty() {
            return Err(VerificationError::consistency(
                which,
                format!("unexpected proof from size {}", baseline.tree_size),
            ));
        }
        if baseline.tree_size == head.tree_size && baseline.root != head.root {
            return Err(VerificationError::consistency(
                which,
                format!("root changed at size {}", head.tree_size),
            ));
        }
        return Ok(());
    }

    check_tree(
        proof,
        head.tree_size,
        head.root,
        baseline.tree_size,
        baseline.root,
    )
    .map_err(|e| VerificationError::consistency(which, e))
}

/// Checks the consistency proofs in `full` against the caller's state and the auditor's view.
///
/// # Errors
///
/// Returns [`VerificationError::ConsistencyCheckFailed`] naming the baseline whose check
/// failed.
pub fn verify_consistency(
    authenticated: AuthenticatedHead,
    full: &FullTreeHead,
    last_seen: &LastSeen,
    config: &PublicConfig,
) -> Result<ConsistentHead, VerificationError> {
    let head = authenticated.head;
    check_baseline(
        ConsistencyTarget::Last,
        last_seen.last,
        &full.consistency_to_last,
        &head,
    )?;
    check_baseline(
        ConsistencyTarget::Distinguished,
        last_seen.distinguished,
        &full.consistency_to_distinguished,
        &head,
    )?;

    if let (Some(auditor), Some(auditor_head)) =
        (authenticated.auditor, full.auditor_tree_head.as_ref())
    {
        let which = ConsistencyTarget::Auditor;
        if auditor.tree_size > head.tree_size {
            return Err(VerificationError::consistency(
                which,
                format!(
                    "auditor size {} exceeds service size {}",
                    auditor.tree_size, head.tree_size
                ),
            ));
        }
        let lag = head.tree_size - auditor.tree_size;
        if lag > config.max_auditor_lag {
            return Err(VerificationError::consistency(
                which,
                format!("auditor lags by {lag} entries"),
            ));
        }
        if lag == 0 {
            if auditor_head.root_value.is_some() || !auditor_head.consistency.is_empty() {
                return Err(VerificationError::consistency(
                    which,
                    "root value or proof supplied for an auditor that is caught up",
                ));
            }
        } else {
            check_tree(
                &auditor_head.consistency,
                head.tree_size,
                head.root,
                auditor.tree_size,
                auditor.root,
            )
            .map_err(|e| VerificationError::consistency(which, e))?;
        }
        debug!("auditor tree at size {} is consistent", auditor.tree_size);
    }

    Ok(ConsistentHead { head })
}
