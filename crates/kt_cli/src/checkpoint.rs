// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Loading the pinned configuration and persisting the tree heads accepted so far.

use anyhow::{anyhow, Context, Result};
use config::AppConfig;
use ed25519_dalek::VerifyingKey;
use kt_verify::{LastSeen, PublicConfig, VrfPublicKey};
use serde::de::DeserializeOwned;
use serde_json::{from_str, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = include_str!("../config.schema.json");

/// Parses `contents` as an [`AppConfig`] after validating it against the schema.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let json: Value = from_str(contents).context("failed to deserialize JSON config")?;
    let schema: Value = from_str(SCHEMA).context("failed to deserialize JSON schema")?;
    jsonschema::validate(&schema, &json)
        .map_err(|e| anyhow!("config does not match schema 'config.schema.json': {e}"))?;
    serde_json::from_value(json).context("failed to deserialize JSON config")
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config file '{}'", path.display()))
}

/// Builds the immutable verifier configuration, rejecting unusable keys.
pub fn public_config(conf: &AppConfig) -> Result<PublicConfig> {
    let service_key = VerifyingKey::from_bytes(&conf.service_public_key)
        .context("invalid service public key")?;
    let vrf_key = VrfPublicKey::from_bytes(&conf.vrf_public_key).context("invalid VRF public key")?;
    let auditor_key = conf
        .auditor_public_key
        .as_ref()
        .map(VerifyingKey::from_bytes)
        .transpose()
        .context("invalid auditor public key")?;
    Ok(PublicConfig {
        max_tree_head_age: Duration::from_secs(conf.max_tree_head_age_secs),
        max_auditor_tree_head_age: Duration::from_secs(conf.max_auditor_tree_head_age_secs),
        max_clock_skew: Duration::from_secs(conf.max_clock_skew_secs),
        max_auditor_lag: conf.max_auditor_lag,
        ..PublicConfig::new(conf.log_id.clone(), service_key, vrf_key, auditor_key)
    })
}

/// Reads the caller state. A missing file is a client that has not verified anything yet.
pub fn load_state(path: &Path) -> Result<LastSeen> {
    match fs::read_to_string(path) {
        Ok(contents) => from_str(&contents)
            .with_context(|| format!("failed to deserialize state file '{}'", path.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(LastSeen::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read state file '{}'", path.display())),
    }
}

/// Replaces the caller state. The new state is written next to the old one and renamed over
/// it, so a crash leaves either the old or the new state.
pub fn save_state(path: &Path, state: &LastSeen) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(state)?)
        .with_context(|| format!("failed to write state file '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace state file '{}'", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    from_str(&contents).with_context(|| format!("failed to deserialize '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt_verify::{Hash, VerifiedTreeHead};

    #[test]
    fn test_example_config() {
        let conf = parse_config(include_str!("../config.example.json")).unwrap();
        let config = public_config(&conf).unwrap();
        assert_eq!(config.log_id, "kt.example.com/log");
        assert!(config.auditor_key.is_some());
        assert_eq!(config.max_clock_skew, Duration::from_secs(30));
        assert_eq!(config.max_tree_head_age, Duration::from_secs(86_400));
    }

    #[test]
    fn test_schema_rejects_unknown_fields() {
        let err = parse_config(
            r#"{
                "log_id": "kt.example.com/log",
                "service_public_key": "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=",
                "vrf_public_key": "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=",
                "max_tree_head_age": 10
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn test_small_order_vrf_key_rejected() {
        let mut conf = parse_config(include_str!("../config.example.json")).unwrap();
        // The identity point.
        conf.vrf_public_key = [0; 32];
        conf.vrf_public_key[0] = 1;
        assert!(public_config(&conf).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let dir = std::env::temp_dir().join(format!("kt-cli-state-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");
        assert_eq!(load_state(&path).unwrap(), LastSeen::default());

        let head = VerifiedTreeHead {
            tree_size: 42,
            timestamp: 1_760_000_000_000,
            root: Hash([7; 32]),
        };
        let state = LastSeen::default().accept_distinguished(head);
        save_state(&path, &state).unwrap();
        assert_eq!(load_state(&path).unwrap(), state);
        fs::remove_dir_all(&dir).unwrap();
    }
}
