// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Pinned trust configuration and the caller state verification runs against.

use crate::proto::{ConsistencyParameters, VerifiedTreeHead};
use crate::vrf::VrfPublicKey;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on how old a service tree head may be.
pub const DEFAULT_MAX_TREE_HEAD_AGE: Duration = Duration::from_secs(24 * 60 * 60);
/// Default bound on how old an auditor tree head may be.
pub const DEFAULT_MAX_AUDITOR_TREE_HEAD_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Default bound on how far in the future a tree head timestamp may be.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);
/// Default bound on how many entries the auditor may lag the service.
pub const DEFAULT_MAX_AUDITOR_LAG: u64 = 10_000_000;

/// Key material and policy fixed for the lifetime of a client. Loaded once, never mutated.
#[derive(Debug, Clone)]
pub struct PublicConfig {
    pub log_id: String,
    pub service_key: Ed25519VerifyingKey,
    pub vrf_key: VrfPublicKey,
    /// Present when the deployment has a third-party auditor.
    pub auditor_key: Option<Ed25519VerifyingKey>,
    pub max_tree_head_age: Duration,
    pub max_auditor_tree_head_age: Duration,
    pub max_clock_skew: Duration,
    pub max_auditor_lag: u64,
}

impl PublicConfig {
    /// Returns a config with the default freshness and lag bounds.
    pub fn new(
        log_id: impl Into<String>,
        service_key: Ed25519VerifyingKey,
        vrf_key: VrfPublicKey,
        auditor_key: Option<Ed25519VerifyingKey>,
    ) -> Self {
        Self {
            log_id: log_id.into(),
            service_key,
            vrf_key,
            auditor_key,
            max_tree_head_age: DEFAULT_MAX_TREE_HEAD_AGE,
            max_auditor_tree_head_age: DEFAULT_MAX_AUDITOR_TREE_HEAD_AGE,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
            max_auditor_lag: DEFAULT_MAX_AUDITOR_LAG,
        }
    }
}

/// Tree heads the caller verified before. Persisted by the caller after every accepted
/// response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSeen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<VerifiedTreeHead>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinguished: Option<VerifiedTreeHead>,
}

impl LastSeen {
    /// The consistency parameters a request made from this state must carry.
    pub fn consistency_parameters(&self) -> ConsistencyParameters {
        ConsistencyParameters {
            last: self.last.map(|h| h.tree_size),
            distinguished: self.distinguished.map(|h| h.tree_size),
        }
    }

    /// Returns the state after accepting `head` from a search or monitor response.
    #[must_use]
    pub fn accept(self, head: VerifiedTreeHead) -> Self {
        Self {
            last: Some(head),
            ..self
        }
    }

    /// Returns the state after accepting `head` from a distinguished-key response.
    #[must_use]
    pub fn accept_distinguished(self, head: VerifiedTreeHead) -> Self {
        Self {
            last: Some(head),
            distinguished: Some(head),
        }
    }
}

/// Everything verification needs besides the request and response.
#[derive(Debug, Clone)]
pub struct TrustState<'a> {
    pub config: &'a PublicConfig,
    pub last_seen: LastSeen,
    /// Evaluation time, in milliseconds since the Unix epoch.
    pub now: i64,
}

pub(crate) fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
