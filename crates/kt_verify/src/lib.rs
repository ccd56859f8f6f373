// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! # kt verify
//!
//! Client-side verification of key transparency responses. A log binds identifiers (ACIs,
//! phone numbers, username hashes and a distinguished key) to values. Given a pinned
//! [`PublicConfig`] and the tree heads the caller saw before, the verifier checks that a
//! response:
//!
//! - carries fresh, monotonic tree heads signed by the service and, if configured, an auditor;
//! - is consistent with every tree head the caller or the auditor accepted before;
//! - resolves each identifier through the VRF, locates its first entry with a binary search
//!   proof and opens that entry's commitment to the returned value;
//! - proves every log entry it touched is included in the signed tree.
//!
//! Verification is a pure function of the request, the response and a [`TrustState`]. It
//! never reads the clock and never retries: every failure is a terminal
//! [`VerificationError`].

pub mod commitment;
pub mod config;
pub mod consistency;
pub mod error;
pub mod inclusion;
pub mod monitor;
pub mod prefix;
pub mod proto;
pub mod search;
pub mod tree_head;
pub mod verify;
pub mod vrf;

#[cfg(test)]
mod test_util;

pub use config::{LastSeen, PublicConfig, TrustState};
pub use error::{ErrorKind, VerificationError};
pub use kt_tree::Hash;
pub use proto::*;
pub use verify::{verify_distinguished, verify_monitor, verify_search};
pub use vrf::VrfPublicKey;
