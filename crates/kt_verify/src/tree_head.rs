// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Tree head authentication: request/state agreement, monotonicity, freshness and
//! signatures from the service and, when configured, the third-party auditor.

use crate::config::{duration_millis, LastSeen, PublicConfig, TrustState};
use crate::error::{Signer, VerificationError};
use crate::proto::{ConsistencyParameters, FullTreeHead, TreeHead, VerifiedTreeHead};
use ed25519_dalek::{Signature, Verifier as Ed25519Verifier, VerifyingKey as Ed25519VerifyingKey};
use kt_tree::Hash;
use log::debug;
use std::time::Duration;

const TREE_HEAD_DOMAIN: &[u8] = b"kt-tree-head-v1";

/// A service tree head whose signature, freshness and monotonicity have been checked, along
/// with the auditor's view of the tree when an auditor is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedHead {
    pub head: VerifiedTreeHead,
    pub auditor: Option<VerifiedTreeHead>,
}

/// Returns the message `signer` signs for a tree head.
///
/// ```text
/// "kt-tree-head-v1"
/// u16 log_id_len || log_id
/// u8 signer (0 service, 1 auditor)
/// service_key[32] || vrf_key[32]
/// u8 has_auditor || auditor_key[32] (if present)
/// u64 tree_size || i64 timestamp || root[32]
/// ```
pub fn tree_head_message(
    config: &PublicConfig,
    signer: Signer,
    tree_size: u64,
    timestamp: i64,
    root: &Hash,
) -> Vec<u8> {
    let log_id = config.log_id.as_bytes();
    let log_id = &log_id[..log_id.len().min(usize::from(u16::MAX))];

    let mut msg = Vec::with_capacity(TREE_HEAD_DOMAIN.len() + log_id.len() + 160);
    msg.extend_from_slice(TREE_HEAD_DOMAIN);
    msg.extend_from_slice(&u16::try_from(log_id.len()).unwrap_or(u16::MAX).to_be_bytes());
    msg.extend_from_slice(log_id);
    msg.push(match signer {
        Signer::Service => 0,
        Signer::Auditor => 1,
    });
    msg.extend_from_slice(config.service_key.as_bytes());
    msg.extend_from_slice(&config.vrf_key.to_bytes());
    match &config.auditor_key {
        Some(key) => {
            msg.push(1);
            msg.extend_from_slice(key.as_bytes());
        }
        None => msg.push(0),
    }
    msg.extend_from_slice(&tree_size.to_be_bytes());
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.extend_from_slice(&root.0);
    msg
}

fn verify_signature(
    config: &PublicConfig,
    key: &Ed25519VerifyingKey,
    signer: Signer,
    head: &TreeHead,
    root: &Hash,
) -> Result<(), VerificationError> {
    let Ok(sig_bytes) = <[u8; 64]>::try_from(head.signature.as_slice()) else {
        return Err(VerificationError::BadSignature(signer));
    };
    let msg = tree_head_message(config, signer, head.tree_size, head.timestamp, root);
    key.verify(&msg, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| VerificationError::BadSignature(signer))
}

fn check_freshness(
    signer: Signer,
    timestamp: i64,
    now: i64,
    max_age: Duration,
    max_skew: Duration,
) -> Result<(), VerificationError> {
    let age = now.saturating_sub(timestamp);
    if age > duration_millis(max_age) || age < -duration_millis(max_skew) {
        return Err(VerificationError::StaleTreeHead {
            signer,
            timestamp,
            now,
        });
    }
    Ok(())
}

fn check_monotonic(head: &TreeHead, last_seen: &LastSeen) -> Result<(), VerificationError> {
    for (name, seen) in [("last", last_seen.last), ("distinguished", last_seen.distinguished)] {
        let Some(seen) = seen else {
            continue;
        };
        if head.tree_size < seen.tree_size {
            return Err(VerificationError::NonMonotonicTreeHead(format!(
                "tree size {} is smaller than {name} tree size {}",
                head.tree_size, seen.tree_size
            )));
        }
        if head.timestamp < seen.timestamp {
            return Err(VerificationError::NonMonotonicTreeHead(format!(
                "timestamp {} is earlier than {name} timestamp {}",
                head.timestamp, seen.timestamp
            )));
        }
        if head.tree_size == seen.tree_size && head.timestamp != seen.timestamp {
            return Err(VerificationError::NonMonotonicTreeHead(format!(
                "tree size {} was already signed with timestamp {}",
                seen.tree_size, seen.timestamp
            )));
        }
    }
    Ok(())
}

/// Authenticates the tree heads in `full`.
///
/// # Errors
///
/// Returns [`VerificationError::InvalidRequest`] if `requested` disagrees with the caller's
/// state, [`VerificationError::NonMonotonicTreeHead`] if the head goes backwards,
/// [`VerificationError::StaleTreeHead`] if a head is too old or too far in the future,
/// [`VerificationError::BadSignature`] if a signature does not verify,
/// [`VerificationError::MalformedProof`] if the auditor's head carries a root other than the
/// one it signs and [`VerificationError::MissingField`] if the auditor's head or root is absent.
pub fn verify_tree_head(
    requested: &ConsistencyParameters,
    full: &FullTreeHead,
    trust: &TrustState<'_>,
) -> Result<AuthenticatedHead, VerificationError> {
    let config = trust.config;
    let expected = trust.last_seen.consistency_parameters();
    if *requested != expected {
        return Err(VerificationError::InvalidRequest(format!(
            "request asks for consistency with {requested:?}, caller state holds {expected:?}"
        )));
    }

    let head = &full.tree_head;
    check_monotonic(head, &trust.last_seen)?;
    check_freshness(
        Signer::Service,
        head.timestamp,
        trust.now,
        config.max_tree_head_age,
        config.max_clock_skew,
    )?;
    verify_signature(config, &config.service_key, Signer::Service, head, &head.root)?;
    debug!("service tree head verified: size {}", head.tree_size);

    let auditor = match &config.auditor_key {
        None => None,
        Some(key) => {
            let auditor = full
                .auditor_tree_head
                .as_ref()
                .ok_or(VerificationError::MissingField("auditor_tree_head"))?;
            let auditor_head = &auditor.tree_head;
            let root = if auditor_head.tree_size < head.tree_size {
                auditor
                    .root_value
                    .ok_or(VerificationError::MissingField("root_value"))?
            } else {
                auditor.root_value.unwrap_or(head.root)
            };
            check_freshness(
                Signer::Auditor,
                auditor_head.timestamp,
                trust.now,
                config.max_auditor_tree_head_age,
                config.max_clock_skew,
            )?;
            verify_signature(config, key, Signer::Auditor, auditor_head, &root)?;
            if auditor_head.root != root {
                return Err(VerificationError::MalformedProof(
                    "auditor tree head root differs from the root it signs".into(),
                ));
            }
            debug!("auditor tree head verified: size {}", auditor_head.tree_size);
            Some(VerifiedTreeHead {
                tree_size: auditor_head.tree_size,
                timestamp: auditor_head.timestamp,
                root,
            })
        }
    };

    Ok(AuthenticatedHead {
        head: VerifiedTreeHead::from(head),
        auditor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{TestKeys, NOW};

    #[test]
    fn test_valid_head() {
        let keys = TestKeys::new();
        let config = keys.config();
        let full = keys.full_tree_head(&config, 10, NOW - 1000, Hash([1; 32]));
        let trust = TrustState {
            config: &config,
            last_seen: LastSeen::default(),
            now: NOW,
        };
        let auth = verify_tree_head(&ConsistencyParameters::default(), &full, &trust).unwrap();
        assert_eq!(auth.head.tree_size, 10);
        assert_eq!(auth.auditor, None);
    }

    #[test]
    fn test_signature_covers_every_field() {
        let keys = TestKeys::new();
        let config = keys.config();
        let trust = TrustState {
            config: &config,
            last_seen: LastSeen::default(),
            now: NOW,
        };
        let full = keys.full_tree_head(&config, 10, NOW - 1000, Hash([1; 32]));
        let params = ConsistencyParameters::default();

        let mut tampered = full.clone();
        tampered.tree_head.tree_size = 11;
        assert_eq!(
            verify_tree_head(&params, &tampered, &trust),
            Err(VerificationError::BadSignature(Signer::Service))
        );
        let mut tampered = full.clone();
        tampered.tree_head.timestamp += 1;
        assert_eq!(
            verify_tree_head(&params, &tampered, &trust),
            Err(VerificationError::BadSignature(Signer::Service))
        );
        let mut tampered = full.clone();
        tampered.tree_head.root.0[0] ^= 1;
        assert_eq!(
            verify_tree_head(&params, &tampered, &trust),
            Err(VerificationError::BadSignature(Signer::Service))
        );
        let mut tampered = full.clone();
        tampered.tree_head.signature.pop();
        assert_eq!(
            verify_tree_head(&params, &tampered, &trust),
            Err(VerificationError::BadSignature(Signer::Service))
        );

        // A signature for another log does not carry over.
        let mut other = keys.config();
        other.log_id = "another log".into();
        let trust = TrustState {
            config: &other,
            ..trust
        };
        assert_eq!(
            verify_tree_head(&params, &full, &trust),
            Err(VerificationError::BadSignature(Signer::Service))
        );
    }

    #[test]
    fn test_freshness_window() {
        let keys = TestKeys::new();
        let config = keys.config();
        let trust = TrustState {
            config: &config,
            last_seen: LastSeen::default(),
            now: NOW,
        };
        let params = ConsistencyParameters::default();
        let day = duration_millis(config.max_tree_head_age);
        let skew = duration_millis(config.max_clock_skew);

        for ok in [NOW - day, NOW, NOW + skew] {
            let full = keys.full_tree_head(&config, 3, ok, Hash([2; 32]));
            verify_tree_head(&params, &full, &trust).unwrap();
        }
        for stale in [NOW - day - 1, NOW + skew + 1] {
            let full = keys.full_tree_head(&config, 3, stale, Hash([2; 32]));
            assert!(matches!(
                verify_tree_head(&params, &full, &trust),
                Err(VerificationError::StaleTreeHead {
                    signer: Signer::Service,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_monotonicity() {
        let keys = TestKeys::new();
        let config = keys.config();
        let seen = VerifiedTreeHead {
            tree_size: 10,
            timestamp: NOW - 5000,
            root: Hash([3; 32]),
        };
        let trust = TrustState {
            config: &config,
            last_seen: LastSeen {
                last: Some(seen),
                distinguished: None,
            },
            now: NOW,
        };
        let params = trust.last_seen.consistency_parameters();

        let smaller = keys.full_tree_head(&config, 9, NOW - 1000, Hash([4; 32]));
        assert!(matches!(
            verify_tree_head(&params, &smaller, &trust),
            Err(VerificationError::NonMonotonicTreeHead(_))
        ));
        let earlier = keys.full_tree_head(&config, 11, NOW - 6000, Hash([4; 32]));
        assert!(matches!(
            verify_tree_head(&params, &earlier, &trust),
            Err(VerificationError::NonMonotonicTreeHead(_))
        ));
        let resigned = keys.full_tree_head(&config, 10, NOW - 1000, Hash([3; 32]));
        assert!(matches!(
            verify_tree_head(&params, &resigned, &trust),
            Err(VerificationError::NonMonotonicTreeHead(_))
        ));
        let same = keys.full_tree_head(&config, 10, NOW - 5000, Hash([3; 32]));
        verify_tree_head(&params, &same, &trust).unwrap();
        let grown = keys.full_tree_head(&config, 12, NOW - 1000, Hash([4; 32]));
        verify_tree_head(&params, &grown, &trust).unwrap();
    }

    #[test]
    fn test_request_must_match_state() {
        let keys = TestKeys::new();
        let config = keys.config();
        let trust = TrustState {
            config: &config,
            last_seen: LastSeen::default(),
            now: NOW,
        };
        let full = keys.full_tree_head(&config, 3, NOW, Hash([2; 32]));
        let params = ConsistencyParameters {
            last: Some(2),
            distinguished: None,
        };
        assert!(matches!(
            verify_tree_head(&params, &full, &trust),
            Err(VerificationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_auditor_head() {
        let keys = TestKeys::new();
        let config = keys.config_with_auditor();
        let trust = TrustState {
            config: &config,
            last_seen: LastSeen::default(),
            now: NOW,
        };
        let params = ConsistencyParameters::default();
        let service_root = Hash([5; 32]);
        let auditor_root = Hash([6; 32]);

        let mut full = keys.full_tree_head(&config, 8, NOW, service_root);
        assert_eq!(
            verify_tree_head(&params, &full, &trust),
            Err(VerificationError::MissingField("auditor_tree_head"))
        );

        full.auditor_tree_head = Some(keys.auditor_tree_head(&config, 6, NOW, auditor_root, Some(auditor_root)));
        let auth = verify_tree_head(&params, &full, &trust).unwrap();
        assert_eq!(auth.auditor.map(|a| a.root), Some(auditor_root));

        // Lagging without a root cannot be checked.
        let mut missing = full.clone();
        missing.auditor_tree_head.as_mut().unwrap().root_value = None;
        assert_eq!(
            verify_tree_head(&params, &missing, &trust),
            Err(VerificationError::MissingField("root_value"))
        );

        // The auditor signs over its own view of the root.
        let mut swapped = full.clone();
        swapped.auditor_tree_head.as_mut().unwrap().root_value = Some(service_root);
        assert_eq!(
            verify_tree_head(&params, &swapped, &trust),
            Err(VerificationError::BadSignature(Signer::Auditor))
        );

        // The root on the wire must be the root that was signed.
        let mut mislabeled = full.clone();
        mislabeled.auditor_tree_head.as_mut().unwrap().tree_head.root = service_root;
        assert!(matches!(
            verify_tree_head(&params, &mislabeled, &trust),
            Err(VerificationError::MalformedProof(_))
        ));

        // A caught-up auditor signs the service root.
        full.auditor_tree_head = Some(keys.auditor_tree_head(&config, 8, NOW, service_root, None));
        let auth = verify_tree_head(&params, &full, &trust).unwrap();
        assert_eq!(auth.auditor.map(|a| a.root), Some(service_root));

        let week = duration_millis(config.max_auditor_tree_head_age);
        full.auditor_tree_head = Some(keys.auditor_tree_head(&config, 8, NOW - week - 1, service_root, None));
        assert!(matches!(
            verify_tree_head(&params, &full, &trust),
            Err(VerificationError::StaleTreeHead {
                signer: Signer::Auditor,
                ..
            })
        ));
    }
}
