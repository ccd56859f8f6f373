// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! End-to-end verification of service responses.
//!
//! Each response runs through the same stages: the tree head is authenticated, proven
//! consistent with what the caller saw before, and then every identifier in the response is
//! resolved through the VRF, located by its search proof, opened against its commitment and
//! proven included in the authenticated tree. Any failure rejects the whole response.

use crate::commitment;
use crate::config::TrustState;
use crate::consistency::{verify_consistency, ConsistentHead};
use crate::error::VerificationError;
use crate::inclusion::LeafSet;
use crate::monitor::verify_monitor_proof;
use crate::proto::{
    CommitmentIndex, CondensedTreeSearchResponse, ConsistencyParameters, DistinguishedRequest,
    DistinguishedResponse, FullTreeHead, MonitorRequest, MonitorResponse, MonitorResult,
    SearchKey, SearchRequest, SearchResponse, SearchResult, VerifiedTreeHead, VerifiedValue,
};
use crate::search::{self, SearchOutcome};
use crate::tree_head::verify_tree_head;
use crate::vrf;
use itertools::Itertools;
use log::{debug, warn};

fn verify_full_tree_head(
    requested: &ConsistencyParameters,
    full: &FullTreeHead,
    trust: &TrustState<'_>,
) -> Result<ConsistentHead, VerificationError> {
    let authenticated = verify_tree_head(requested, full, trust)?;
    verify_consistency(authenticated, full, &trust.last_seen, trust.config)
}

/// An identifier whose commitment index the VRF proof established.
struct ResolvedIdentifier<'a> {
    search_key: SearchKey,
    index: CommitmentIndex,
    response: &'a CondensedTreeSearchResponse,
}

/// An identifier whose first log entry the search proof located.
struct SearchedIdentifier<'a> {
    resolved: ResolvedIdentifier<'a>,
    outcome: SearchOutcome,
}

/// An identifier whose value opened the commitment at its first log entry.
struct OpenedIdentifier<'a> {
    value: VerifiedValue,
    leaves: LeafSet,
    inclusion: &'a [kt_tree::Hash],
}

impl<'a> ResolvedIdentifier<'a> {
    fn resolve(
        trust: &TrustState<'_>,
        search_key: SearchKey,
        response: &'a CondensedTreeSearchResponse,
    ) -> Result<Self, VerificationError> {
        let index = vrf::resolve(&trust.config.vrf_key, &search_key.to_bytes(), &response.vrf_proof)?;
        debug!("{search_key:?} resolved to index {index}");
        Ok(Self {
            search_key,
            index,
            response,
        })
    }

    fn search(self, head: &ConsistentHead) -> Result<SearchedIdentifier<'a>, VerificationError> {
        let proof = &self.response.search;
        let outcome = search::verify_search(&proof.steps, &self.index, head.head.tree_size, proof.pos)?;
        Ok(SearchedIdentifier {
            resolved: self,
            outcome,
        })
    }
}

impl<'a> SearchedIdentifier<'a> {
    fn open(self) -> Result<OpenedIdentifier<'a>, VerificationError> {
        let response = self.resolved.response;
        let step = response.search.steps.get(self.outcome.step).ok_or_else(|| {
            VerificationError::MalformedProof("search outcome refers to a missing step".into())
        })?;
        if !commitment::open(
            &step.commitment,
            &response.opening,
            self.outcome.position,
            &response.value.value,
        ) {
            return Err(VerificationError::CommitmentMismatch);
        }

        let mut leaves = LeafSet::new();
        for touched in self.outcome.touched {
            leaves.insert(touched)?;
        }
        Ok(OpenedIdentifier {
            value: VerifiedValue {
                search_key: self.resolved.search_key,
                index: self.resolved.index,
                position: self.outcome.position,
                value: response.value.value.clone(),
            },
            leaves,
            inclusion: &response.search.inclusion,
        })
    }
}

impl OpenedIdentifier<'_> {
    fn verify_inclusion(self, head: &ConsistentHead) -> Result<VerifiedValue, VerificationError> {
        self.leaves
            .verify(head.head.tree_size, &head.head.root, self.inclusion)?;
        debug!(
            "{:?} verified at position {}",
            self.value.search_key, self.value.position
        );
        Ok(self.value)
    }
}

fn verify_identifier(
    trust: &TrustState<'_>,
    head: &ConsistentHead,
    search_key: SearchKey,
    response: &CondensedTreeSearchResponse,
) -> Result<VerifiedValue, VerificationError> {
    ResolvedIdentifier::resolve(trust, search_key, response)?
        .search(head)?
        .open()?
        .verify_inclusion(head)
}

fn verify_optional(
    trust: &TrustState<'_>,
    head: &ConsistentHead,
    name: &str,
    requested: Option<SearchKey>,
    response: Option<&CondensedTreeSearchResponse>,
) -> Result<Option<VerifiedValue>, VerificationError> {
    match (requested, response) {
        (Some(key), Some(response)) => verify_identifier(trust, head, key, response).map(Some),
        // The service may decline to reveal an identifier the caller is not eligible for.
        (Some(_), None) => Ok(None),
        (None, Some(_)) => Err(VerificationError::MalformedProof(format!(
            "response contains an unrequested {name} result"
        ))),
        (None, None) => Ok(None),
    }
}

fn reject(what: &'static str) -> impl Fn(&VerificationError) {
    move |e| warn!("{what} response rejected ({:?}): {e}", e.kind())
}

/// Verifies a response for the distinguished key, returning the tree head the caller should
/// record as both its last and distinguished head.
///
/// # Errors
///
/// Returns a [`VerificationError`] describing the first check that failed.
pub fn verify_distinguished(
    request: &DistinguishedRequest,
    response: &DistinguishedResponse,
    trust: &TrustState<'_>,
) -> Result<VerifiedTreeHead, VerificationError> {
    let run = || -> Result<VerifiedTreeHead, VerificationError> {
        let head = verify_full_tree_head(&request.consistency, &response.tree_head, trust)?;
        verify_identifier(trust, &head, SearchKey::Distinguished, &response.distinguished)?;
        Ok(head.head)
    };
    run().inspect_err(reject("distinguished"))
}

/// Verifies a search response, returning the value bound to each requested identifier.
///
/// # Errors
///
/// Returns a [`VerificationError`] describing the first check that failed.
pub fn verify_search(
    request: &SearchRequest,
    response: &SearchResponse,
    trust: &TrustState<'_>,
) -> Result<SearchResult, VerificationError> {
    let run = || -> Result<SearchResult, VerificationError> {
        let head = verify_full_tree_head(&request.consistency, &response.tree_head, trust)?;
        let aci = verify_identifier(trust, &head, SearchKey::Aci(request.aci), &response.aci)?;
        let e164 = verify_optional(
            trust,
            &head,
            "e164",
            request.e164.clone().map(SearchKey::E164),
            response.e164.as_ref(),
        )?;
        let username_hash = verify_optional(
            trust,
            &head,
            "username hash",
            request.username_hash.map(SearchKey::UsernameHash),
            response.username_hash.as_ref(),
        )?;
        Ok(SearchResult {
            aci,
            e164,
            username_hash,
            tree_head: head.head,
        })
    };
    run().inspect_err(reject("search"))
}

/// Verifies a monitoring response for the entries in `request`.
///
/// # Errors
///
/// Returns a [`VerificationError`] describing the first check that failed.
pub fn verify_monitor(
    request: &MonitorRequest,
    response: &MonitorResponse,
    trust: &TrustState<'_>,
) -> Result<MonitorResult, VerificationError> {
    let run = || -> Result<MonitorResult, VerificationError> {
        let head = verify_full_tree_head(&request.consistency, &response.tree_head, trust)?;
        if request.keys.len() != response.proofs.len() {
            return Err(VerificationError::MalformedProof(format!(
                "{} monitoring proofs for {} keys",
                response.proofs.len(),
                request.keys.len()
            )));
        }
        let mut leaves = LeafSet::new();
        let keys = request
            .keys
            .iter()
            .zip_eq(&response.proofs)
            .map(|(key, proof)| verify_monitor_proof(key, proof, head.head.tree_size, &mut leaves))
            .collect::<Result<Vec<_>, _>>()?;
        leaves.verify(head.head.tree_size, &head.head.root, &response.inclusion)?;
        debug!("{} monitored keys verified", keys.len());
        Ok(MonitorResult {
            keys,
            tree_head: head.head,
        })
    };
    run().inspect_err(reject("monitor"))
}
