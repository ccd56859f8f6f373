// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

// Verifier configuration, in a separate crate so tooling can read it without the verifier.
use serde::Deserialize;
use serde_with::{base64::Base64, serde_as};

#[serde_as]
#[derive(Deserialize, Debug)]
pub struct AppConfig {
    pub logging_level: Option<String>,
    pub log_id: String,
    #[serde_as(as = "Base64")]
    pub service_public_key: [u8; 32],
    #[serde_as(as = "Base64")]
    pub vrf_public_key: [u8; 32],
    #[serde_as(as = "Option<Base64>")]
    #[serde(default)]
    pub auditor_public_key: Option<[u8; 32]>,
    #[serde(default = "default_max_tree_head_age_secs")]
    pub max_tree_head_age_secs: u64,
    #[serde(default = "default_max_auditor_tree_head_age_secs")]
    pub max_auditor_tree_head_age_secs: u64,
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,
    #[serde(default = "default_max_auditor_lag")]
    pub max_auditor_lag: u64,
}

fn default_max_tree_head_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_auditor_tree_head_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_clock_skew_secs() -> u64 {
    60
}

// Entries the auditor may trail the service by before its view is considered useless.
fn default_max_auditor_lag() -> u64 {
    10_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf: AppConfig = serde_json::from_str(
            r#"{
                "log_id": "kt.example.com/log",
                "service_public_key": "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=",
                "vrf_public_key": "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo="
            }"#,
        )
        .unwrap();
        assert_eq!(conf.logging_level, None);
        assert_eq!(conf.auditor_public_key, None);
        assert_eq!(conf.max_tree_head_age_secs, 86_400);
        assert_eq!(conf.max_auditor_tree_head_age_secs, 604_800);
        assert_eq!(conf.max_clock_skew_secs, 60);
        assert_eq!(conf.max_auditor_lag, 10_000_000);
        assert_eq!(conf.service_public_key[0], 0xd7);
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(serde_json::from_str::<AppConfig>(
            r#"{"log_id": "l", "service_public_key": "AAAA", "vrf_public_key": "AAAA"}"#
        )
        .is_err());
    }
}
