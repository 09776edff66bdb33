// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Core configuration root.
//!
//! Callers hand the core a [`CoreConfig`] (typically parsed from TOML);
//! `validate` enforces the cross-subsystem invariants, most importantly
//! that the validator's age window never exceeds the gossip engine's
//! validity window.

use crate::clients::freebird::FreebirdConfig;
use crate::clients::witness::WitnessConfig;
use crate::gossip::engine::GossipConfig;
use crate::validator::ValidatorConfig;
use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML syntax or schema problem.
    #[error("parse config")]
    Parse,
    /// No witness gateway configured.
    #[error("no witness gateways configured")]
    NoGateways,
    /// No Freebird issuer configured.
    #[error("no freebird issuers configured")]
    NoIssuers,
    /// Quorum larger than the gateway set.
    #[error("quorum exceeds gateway count")]
    QuorumTooLarge,
    /// Validator age window exceeds the gossip validity window.
    #[error("validator window exceeds gossip validity window")]
    WindowMismatch,
    /// Confidence threshold outside `[0, 1]`.
    #[error("min_confidence outside [0, 1]")]
    BadConfidence,
    /// Gossip score thresholds are inconsistent.
    #[error("inconsistent gossip score bounds")]
    BadScoreBounds,
}

/// Root configuration for the protocol core.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct CoreConfig {
    /// Freebird issuance client.
    #[serde(default)]
    pub freebird: FreebirdConfig,
    /// Witness federation client.
    #[serde(default)]
    pub witness: WitnessConfig,
    /// Nullifier gossip engine.
    #[serde(default)]
    pub gossip: GossipConfig,
    /// Transfer validator.
    #[serde(default)]
    pub validator: ValidatorConfig,
}

impl CoreConfig {
    /// Parse from a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|_| ConfigError::Parse)
    }

    /// Enforce cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.witness.gateways.is_empty() {
            return Err(ConfigError::NoGateways);
        }
        if self.freebird.issuers.is_empty() {
            return Err(ConfigError::NoIssuers);
        }
        if let Some(q) = self.witness.quorum {
            if q == 0 || q > self.witness.gateways.len() {
                return Err(ConfigError::QuorumTooLarge);
            }
        }
        if self.validator.max_token_age_ms > self.gossip.max_nullifier_age_ms {
            return Err(ConfigError::WindowMismatch);
        }
        if !(0.0..=1.0).contains(&self.validator.min_confidence) {
            return Err(ConfigError::BadConfidence);
        }
        if self.gossip.score_min >= self.gossip.score_max
            || self.gossip.peer_score_threshold < self.gossip.score_min
            || self.gossip.peer_score_threshold > self.gossip.score_max
        {
            return Err(ConfigError::BadScoreBounds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [freebird]
        issuers = ["http://localhost:9101"]

        [witness]
        gateways = ["http://localhost:9201", "http://localhost:9202"]
    "#;

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let cfg = CoreConfig::from_toml_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.gossip.peer_score_threshold, -50);
        assert_eq!(cfg.gossip.max_timestamp_future_sec, 5);
        assert_eq!(cfg.validator.wait_time_ms, 5_000);
        assert_eq!(
            cfg.validator.max_token_age_ms,
            cfg.gossip.max_nullifier_age_ms
        );
    }

    #[test]
    fn window_coupling_is_enforced() {
        let mut cfg = CoreConfig::from_toml_str(MINIMAL).unwrap();
        cfg.validator.max_token_age_ms = cfg.gossip.max_nullifier_age_ms + 1;
        assert_eq!(cfg.validate(), Err(ConfigError::WindowMismatch));
    }

    #[test]
    fn quorum_must_fit_the_gateway_set() {
        let mut cfg = CoreConfig::from_toml_str(MINIMAL).unwrap();
        cfg.witness.quorum = Some(3);
        assert_eq!(cfg.validate(), Err(ConfigError::QuorumTooLarge));
        cfg.witness.quorum = Some(2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_endpoints_rejected() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::NoGateways));
    }

    #[test]
    fn loads_from_a_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("core.toml");
        std::fs::write(&path, MINIMAL).expect("write");
        let raw = std::fs::read_to_string(&path).expect("read");
        let cfg = CoreConfig::from_toml_str(&raw).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.witness.gateways.len(), 2);
    }
}
