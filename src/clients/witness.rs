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

//! Witness federation client: threshold timestamping, attestation
//! verification, and quorum-voted nullifier lookups.
//!
//! The client talks to one or more gateways. Timestamps fan out to all of
//! them and take the first success; verification tries gateways in order
//! and falls back to local BLS verification from the retained raw payload;
//! nullifier lookups poll every gateway and vote.
//!
//! Attestation timestamps are seconds on the wire and milliseconds
//! internally; the conversion happens here and nowhere else.

use crate::crypto::{bls, pow};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Witness client errors.
#[derive(Debug, Error)]
pub enum WitnessError {
    /// No gateway produced a usable response.
    #[error("all witness gateways failed")]
    AllGatewaysFailed,
    /// A gateway answered with a payload the client cannot interpret.
    #[error("gateway returned malformed payload")]
    MalformedPayload,
    /// The client was constructed without any gateway.
    #[error("no witness gateways configured")]
    NoGateways,
    /// HTTP client construction failed.
    #[error("http client")]
    Http,
    /// Proof-of-work solver task failed.
    #[error("proof-of-work task failed")]
    Pow,
}

/// Witness-federation-signed record of `(hash, timestamp, …)`.
///
/// Invariant: `signatures.len() == witness_ids.len()`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attestation {
    /// Hex hash that was timestamped.
    pub hash: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// Per-witness signatures (hex). For the aggregated wire shape this is
    /// the single aggregate repeated once.
    pub signatures: Vec<String>,
    /// Witness identifiers, index-aligned with `signatures`.
    pub witness_ids: Vec<String>,
    /// The gateway's original signed payload; required for local BLS
    /// verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl Attestation {
    /// Structural invariant: non-empty signature columns, index-aligned
    /// except for the aggregated shape (one signature, many signers).
    pub fn is_well_formed(&self) -> bool {
        if self.signatures.is_empty() || self.witness_ids.is_empty() {
            return false;
        }
        self.signatures.len() == self.witness_ids.len() || self.signatures.len() == 1
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Witness client configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct WitnessConfig {
    /// Gateway base URLs.
    pub gateways: Vec<String>,
    /// Quorum threshold for nullifier votes. Default: `ceil(N/2)`.
    #[serde(default)]
    pub quorum: Option<usize>,
    /// Proof-of-work difficulty in bits demanded by the gateways (0 = off).
    #[serde(default)]
    pub pow_difficulty: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            gateways: Vec::new(),
            quorum: None,
            pow_difficulty: 0,
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Cached `/v1/config` data for one gateway.
#[derive(Clone, Debug)]
struct GatewayInfo {
    network_id: String,
    threshold: usize,
    /// Witness id -> hex-encoded compressed G1 public key.
    pubkeys: HashMap<String, String>,
}

#[derive(Deserialize)]
struct GatewayConfigWire {
    network_id: String,
    threshold: usize,
    #[serde(default)]
    witnesses: Vec<WitnessEntryWire>,
}

#[derive(Deserialize)]
struct WitnessEntryWire {
    id: String,
    #[serde(default)]
    #[allow(dead_code)]
    endpoint: Option<String>,
    #[serde(default)]
    pubkey: Option<String>,
}

#[derive(Serialize)]
struct TimestampRequest<'a> {
    hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    difficulty: Option<u32>,
}

/// HTTP client for the witness federation.
pub struct WitnessClient {
    http: reqwest::Client,
    cfg: WitnessConfig,
    gateways: RwLock<HashMap<String, GatewayInfo>>,
}

impl WitnessClient {
    /// Build a client. Fails without at least one gateway.
    pub fn new(cfg: WitnessConfig) -> Result<Self, WitnessError> {
        if cfg.gateways.is_empty() {
            return Err(WitnessError::NoGateways);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|_| WitnessError::Http)?;
        Ok(Self {
            http,
            cfg,
            gateways: RwLock::new(HashMap::new()),
        })
    }

    /// Quorum threshold: configured value or `ceil(N/2)`.
    pub fn quorum(&self) -> usize {
        self.cfg
            .quorum
            .unwrap_or((self.cfg.gateways.len() + 1) / 2)
            .max(1)
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    async fn gateway_info(&self, base: &str) -> Result<GatewayInfo, WitnessError> {
        if let Some(info) = self.gateways.read().await.get(base) {
            return Ok(info.clone());
        }
        let wire: GatewayConfigWire = self
            .http
            .get(Self::url(base, "/v1/config"))
            .send()
            .await
            .map_err(|_| WitnessError::AllGatewaysFailed)?
            .error_for_status()
            .map_err(|_| WitnessError::AllGatewaysFailed)?
            .json()
            .await
            .map_err(|_| WitnessError::MalformedPayload)?;
        let info = GatewayInfo {
            network_id: wire.network_id,
            threshold: wire.threshold.max(1),
            pubkeys: wire
                .witnesses
                .into_iter()
                .filter_map(|w| w.pubkey.map(|pk| (w.id, pk)))
                .collect(),
        };
        self.gateways
            .write()
            .await
            .insert(base.to_string(), info.clone());
        Ok(info)
    }

    async fn timestamp_once(&self, base: &str, body: &Value) -> Result<Attestation, WitnessError> {
        let resp: Value = self
            .http
            .post(Self::url(base, "/v1/timestamp"))
            .json(body)
            .send()
            .await
            .map_err(|_| WitnessError::AllGatewaysFailed)?
            .error_for_status()
            .map_err(|_| WitnessError::AllGatewaysFailed)?
            .json()
            .await
            .map_err(|_| WitnessError::MalformedPayload)?;
        let raw = resp
            .get("attestation")
            .cloned()
            .ok_or(WitnessError::MalformedPayload)?;
        normalize_attestation(raw)
    }

    /// Request a threshold timestamp over `hash_hex`.
    ///
    /// Solves proof-of-work first when the gateways demand it, fans the
    /// request out to every gateway, and returns the first success.
    pub async fn timestamp(&self, hash_hex: &str) -> Result<Attestation, WitnessError> {
        let (nonce, difficulty) = if self.cfg.pow_difficulty > 0 {
            let challenge = hash_hex.to_string();
            let bits = self.cfg.pow_difficulty;
            let nonce =
                tokio::task::spawn_blocking(move || pow::solve_proof_of_work(&challenge, bits))
                    .await
                    .map_err(|_| WitnessError::Pow)?;
            (Some(nonce), Some(bits))
        } else {
            (None, None)
        };
        let body = serde_json::to_value(TimestampRequest {
            hash: hash_hex,
            nonce,
            difficulty,
        })
        .map_err(|_| WitnessError::MalformedPayload)?;

        type AttFut<'a> =
            Pin<Box<dyn std::future::Future<Output = Result<Attestation, WitnessError>> + Send + 'a>>;
        let futs: Vec<AttFut<'_>> = self
            .cfg
            .gateways
            .iter()
            .map(|gw| {
                let body = body.clone();
                let fut: AttFut<'_> =
                    Box::pin(async move { self.timestamp_once(gw, &body).await });
                fut
            })
            .collect();
        match futures::future::select_ok(futs).await {
            Ok((att, _rest)) => Ok(att),
            Err(_) => Err(WitnessError::AllGatewaysFailed),
        }
    }

    /// Verify an attestation: each gateway's `/v1/verify` in turn, then
    /// local BLS verification from the retained raw payload.
    pub async fn verify(&self, attestation: &Attestation) -> Result<bool, WitnessError> {
        if !attestation.is_well_formed() {
            return Ok(false);
        }
        let wire = wire_attestation(attestation);
        for gw in &self.cfg.gateways {
            let resp = self
                .http
                .post(Self::url(gw, "/v1/verify"))
                .json(&serde_json::json!({ "attestation": wire }))
                .send()
                .await;
            let Ok(resp) = resp else { continue };
            let Ok(resp) = resp.error_for_status() else { continue };
            let Ok(v) = resp.json::<Value>().await else { continue };
            if let Some(valid) = v.get("valid").and_then(Value::as_bool) {
                return Ok(valid);
            }
        }
        debug!("all gateways failed to verify; trying local BLS");
        self.verify_local(attestation).await
    }

    /// Local BLS verification from `raw` and cached gateway pubkeys.
    async fn verify_local(&self, attestation: &Attestation) -> Result<bool, WitnessError> {
        let Some(raw) = attestation.raw.as_ref() else {
            return Err(WitnessError::AllGatewaysFailed);
        };
        // Pubkeys come from gateway config; without at least one reachable
        // (or previously cached) gateway there is nothing to verify against.
        let mut info = None;
        for gw in &self.cfg.gateways {
            if let Ok(i) = self.gateway_info(gw).await {
                info = Some(i);
                break;
            }
        }
        let Some(info) = info else {
            return Err(WitnessError::AllGatewaysFailed);
        };

        let Ok(hash_bytes) = hex::decode(&attestation.hash) else {
            return Ok(false);
        };
        let Some(ts_secs) = raw.get("timestamp").and_then(Value::as_u64) else {
            return Ok(false);
        };
        let sequence = raw.get("sequence").and_then(Value::as_u64).unwrap_or(0);
        let network_id = raw
            .get("network_id")
            .and_then(Value::as_str)
            .unwrap_or(&info.network_id);
        let message = bls::attestation_message(&hash_bytes, ts_secs, network_id, sequence);

        let mut pubkeys = Vec::with_capacity(attestation.witness_ids.len());
        for id in &attestation.witness_ids {
            let Some(pk_hex) = info.pubkeys.get(id) else {
                warn!(witness = %id, "no cached public key for witness");
                return Ok(false);
            };
            let Ok(pk) = hex::decode(pk_hex) else {
                return Ok(false);
            };
            pubkeys.push(pk);
        }

        let signature = if raw.get("signature").and_then(Value::as_str).is_some() {
            // Aggregated shape: a single aggregate signature.
            let Ok(sig) = hex::decode(raw["signature"].as_str().unwrap_or_default()) else {
                return Ok(false);
            };
            sig
        } else {
            let mut sigs = Vec::with_capacity(attestation.signatures.len());
            for s in &attestation.signatures {
                let Ok(sig) = hex::decode(s) else {
                    return Ok(false);
                };
                sigs.push(sig);
            }
            match bls::aggregate_signatures(&sigs) {
                Ok(agg) => agg.to_vec(),
                Err(_) => return Ok(false),
            }
        };

        match bls::verify_aggregate(&pubkeys, &signature, &message) {
            Ok(ok) => Ok(ok),
            Err(_) => Ok(false),
        }
    }

    async fn gateway_seen(&self, base: &str, nullifier_hex: &str) -> Option<bool> {
        let info = self.gateway_info(base).await.ok()?;
        let resp = self
            .http
            .get(Self::url(base, &format!("/v1/timestamp/{nullifier_hex}")))
            .send()
            .await
            .ok()?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Some(false);
        }
        if !resp.status().is_success() {
            return None;
        }
        let v: Value = resp.json().await.ok()?;
        let att = v.get("attestation")?;
        let sig_count = if let Some(arr) = att.get("signatures").and_then(Value::as_array) {
            arr.len()
        } else if let Some(signers) = att.get("signers").and_then(Value::as_array) {
            signers.len()
        } else {
            0
        };
        Some(sig_count >= info.threshold)
    }

    /// Quorum-voted double-spend check.
    ///
    /// `1.0` when at least `quorum` gateways have the nullifier with enough
    /// signatures, `0.0` when at least `quorum` agree it is absent, `0.5`
    /// on a split (possible censorship). Gateways that error cast no vote.
    pub async fn check_nullifier(&self, nullifier_hex: &str) -> Result<f32, WitnessError> {
        let votes = join_all(
            self.cfg
                .gateways
                .iter()
                .map(|gw| self.gateway_seen(gw, nullifier_hex)),
        )
        .await;
        let responses = votes.iter().flatten().count();
        if responses == 0 {
            warn!("all witness gateways failed; cannot verify nullifier");
            return Ok(0.0);
        }
        let seen = votes.iter().flatten().filter(|v| **v).count();
        let unseen = responses - seen;
        let q = self.quorum();
        if seen >= q {
            Ok(1.0)
        } else if unseen >= q {
            Ok(0.0)
        } else {
            Ok(0.5)
        }
    }

    /// Number of configured gateways (validator confidence input).
    pub fn federation_depth(&self) -> usize {
        self.cfg.gateways.len()
    }
}

/// Normalize either wire shape into an [`Attestation`], converting the
/// wire's seconds to internal milliseconds and retaining the payload.
pub fn normalize_attestation(raw: Value) -> Result<Attestation, WitnessError> {
    let hash = raw
        .get("hash")
        .and_then(Value::as_str)
        .ok_or(WitnessError::MalformedPayload)?
        .to_string();
    let ts_secs = raw
        .get("timestamp")
        .and_then(Value::as_u64)
        .ok_or(WitnessError::MalformedPayload)?;

    let (signatures, witness_ids) = if let Some(arr) =
        raw.get("signatures").and_then(Value::as_array)
    {
        // Multi-signature shape: [{witness_id, signature}, …]
        let mut sigs = Vec::with_capacity(arr.len());
        let mut ids = Vec::with_capacity(arr.len());
        for entry in arr {
            let sig = entry
                .get("signature")
                .and_then(Value::as_str)
                .ok_or(WitnessError::MalformedPayload)?;
            let id = entry
                .get("witness_id")
                .and_then(Value::as_str)
                .ok_or(WitnessError::MalformedPayload)?;
            sigs.push(sig.to_string());
            ids.push(id.to_string());
        }
        (sigs, ids)
    } else if let (Some(sig), Some(signers)) = (
        raw.get("signature").and_then(Value::as_str),
        raw.get("signers").and_then(Value::as_array),
    ) {
        // Aggregated shape: one signature over the same message by all signers.
        let ids: Option<Vec<String>> = signers
            .iter()
            .map(|s| s.as_str().map(str::to_string))
            .collect();
        let ids = ids.ok_or(WitnessError::MalformedPayload)?;
        (vec![sig.to_string()], ids)
    } else {
        return Err(WitnessError::MalformedPayload);
    };

    Ok(Attestation {
        hash,
        timestamp: ts_secs.saturating_mul(1000),
        signatures,
        witness_ids,
        raw: Some(raw),
    })
}

/// Gateway-facing attestation shape (seconds on the wire). Uses the raw
/// payload verbatim when it is available.
fn wire_attestation(att: &Attestation) -> Value {
    if let Some(raw) = &att.raw {
        return raw.clone();
    }
    let signatures: Vec<Value> = att
        .signatures
        .iter()
        .zip(&att.witness_ids)
        .map(|(sig, id)| serde_json::json!({ "witness_id": id, "signature": sig }))
        .collect();
    serde_json::json!({
        "hash": att.hash,
        "timestamp": att.timestamp / 1000,
        "signatures": signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_multisig_shape() {
        let raw = serde_json::json!({
            "hash": "ab",
            "timestamp": 7,
            "signatures": [
                {"witness_id": "w1", "signature": "s1"},
                {"witness_id": "w2", "signature": "s2"},
            ],
        });
        let att = normalize_attestation(raw).unwrap();
        assert_eq!(att.timestamp, 7_000);
        assert_eq!(att.witness_ids, vec!["w1", "w2"]);
        assert_eq!(att.signatures, vec!["s1", "s2"]);
        assert!(att.is_well_formed());
        assert!(att.raw.is_some());
    }

    #[test]
    fn normalizes_aggregated_shape() {
        let raw = serde_json::json!({
            "hash": "cd",
            "timestamp": 1,
            "signature": "agg",
            "signers": ["w1", "w2", "w3"],
        });
        let att = normalize_attestation(raw).unwrap();
        assert_eq!(att.signatures.len(), 1);
        assert_eq!(att.witness_ids.len(), 3);
    }

    #[test]
    fn rejects_shapeless_payload() {
        let raw = serde_json::json!({ "hash": "ab", "timestamp": 1 });
        assert!(normalize_attestation(raw).is_err());
    }

    #[test]
    fn quorum_defaults_to_majority() {
        let client = WitnessClient::new(WitnessConfig {
            gateways: vec!["http://a".into(), "http://b".into(), "http://c".into()],
            ..WitnessConfig::default()
        })
        .unwrap();
        assert_eq!(client.quorum(), 2);
    }
}
