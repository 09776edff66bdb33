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

//! Freebird issuance client: VOPRF blinding, token issuance with DLEQ
//! verification, and ownership proofs.
//!
//! The protocol is single-issuer with redundancy: endpoints are tried in
//! order and the first issuer whose DLEQ proof verifies wins. The client
//! never fabricates VOPRF outputs; when no issuer is reachable the
//! operation fails (unless the `insecure-fallback` feature *and* the
//! config opt-in are both enabled, which degrades blinding to a plain
//! hash commitment).

use crate::crypto::{schnorr, voprf, CryptoError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use futures::future::join_all;
use p256::Scalar;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Freebird client errors.
#[derive(Debug, Error)]
pub enum FreebirdError {
    /// No configured issuer produced a verified result.
    #[error("no issuer reachable")]
    NoIssuerAvailable,
    /// Verifier endpoint unreachable or unusable.
    #[error("verifier unreachable")]
    VerifierUnreachable,
    /// No verifier URL configured.
    #[error("no verifier configured")]
    NoVerifier,
    /// Issuer answered with a payload the client cannot interpret.
    #[error("issuer returned malformed payload")]
    MalformedPayload,
    /// HTTP client construction failed.
    #[error("http client")]
    Http,
    /// Internal state lock poisoned.
    #[error("internal state")]
    State,
    /// Crypto primitive failure.
    #[error("crypto")]
    Crypto(#[from] CryptoError),
}

fn default_context() -> String {
    "freebird:v1".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Freebird client configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct FreebirdConfig {
    /// Issuer base URLs, tried in order.
    pub issuers: Vec<String>,
    /// Token verifier base URL.
    #[serde(default)]
    pub verifier_url: Option<String>,
    /// Issuing context mixed into hash-to-curve and the DLEQ transcript.
    #[serde(default = "default_context")]
    pub context: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Permit hash-substitute blinding when no issuer responds. Only
    /// honored when the crate is built with `insecure-fallback`.
    #[cfg(feature = "insecure-fallback")]
    #[serde(default)]
    pub allow_fallback_blind: bool,
}

impl Default for FreebirdConfig {
    fn default() -> Self {
        Self {
            issuers: Vec::new(),
            verifier_url: None,
            context: default_context(),
            request_timeout_ms: default_timeout_ms(),
            #[cfg(feature = "insecure-fallback")]
            allow_fallback_blind: false,
        }
    }
}

/// Published issuer metadata from `/.well-known/issuer`.
#[derive(Clone, Debug)]
struct IssuerInfo {
    /// Compressed P-256 VOPRF public key.
    pubkey: Vec<u8>,
    epoch: Option<u64>,
    issuer_id: Option<String>,
}

/// HTTP client for the Freebird issuance service.
pub struct FreebirdClient {
    http: reqwest::Client,
    cfg: FreebirdConfig,
    issuers: RwLock<HashMap<String, IssuerInfo>>,
    /// Blinding factors keyed by the blinded element bytes.
    blindings: Mutex<HashMap<Vec<u8>, Scalar>>,
}

impl FreebirdClient {
    /// Build a client. Fails without at least one issuer endpoint.
    pub fn new(cfg: FreebirdConfig) -> Result<Self, FreebirdError> {
        if cfg.issuers.is_empty() {
            return Err(FreebirdError::NoIssuerAvailable);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|_| FreebirdError::Http)?;
        Ok(Self {
            http,
            cfg,
            issuers: RwLock::new(HashMap::new()),
            blindings: Mutex::new(HashMap::new()),
        })
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    async fn probe_issuer(&self, base: &str) -> Option<IssuerInfo> {
        let meta: Value = self
            .http
            .get(Self::url(base, "/.well-known/issuer"))
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?
            .json()
            .await
            .ok()?;
        let pubkey_b64 = meta.get("voprf")?.get("pubkey")?.as_str()?;
        let pubkey = URL_SAFE_NO_PAD.decode(pubkey_b64).ok()?;
        if pubkey.len() != 33 {
            warn!(issuer = %base, "issuer pubkey is not a compressed P-256 point");
            return None;
        }
        Some(IssuerInfo {
            pubkey,
            epoch: meta.get("epoch").and_then(Value::as_u64),
            issuer_id: meta
                .get("issuer_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Probe all issuers concurrently on first use; fail if none respond.
    async fn ensure_issuers(&self) -> Result<(), FreebirdError> {
        if !self.issuers.read().await.is_empty() {
            return Ok(());
        }
        let probes = join_all(self.cfg.issuers.iter().map(|base| async move {
            (base.clone(), self.probe_issuer(base).await)
        }))
        .await;
        let mut cache = self.issuers.write().await;
        for (base, info) in probes {
            if let Some(info) = info {
                cache.insert(base, info);
            }
        }
        if cache.is_empty() {
            return Err(FreebirdError::NoIssuerAvailable);
        }
        Ok(())
    }

    /// Blind an input for oblivious evaluation and stash the factor.
    ///
    /// The returned commitment is the 33-byte compressed blinded element.
    pub async fn blind(&self, input: &[u8]) -> Result<Vec<u8>, FreebirdError> {
        if let Err(err) = self.ensure_issuers().await {
            #[cfg(feature = "insecure-fallback")]
            if self.cfg.allow_fallback_blind {
                warn!("no issuer reachable; degrading to hash-substitute blinding");
                return Ok(crate::crypto::hashing::sha256(input).to_vec());
            }
            return Err(err);
        }
        let blinding = voprf::blind(input, self.cfg.context.as_bytes())?;
        self.blindings
            .lock()
            .map_err(|_| FreebirdError::State)?
            .insert(blinding.blinded.to_vec(), blinding.factor);
        Ok(blinding.blinded.to_vec())
    }

    /// Obtain an issued token for a blinded element.
    ///
    /// Issuers are tried in configuration order; only a 130-byte token
    /// whose DLEQ proof verifies against that issuer's published key is
    /// accepted. The blind state is dropped on success.
    pub async fn issue_token(&self, blinded: &[u8]) -> Result<Vec<u8>, FreebirdError> {
        self.ensure_issuers().await?;
        let blinded_b64 = URL_SAFE_NO_PAD.encode(blinded);
        let body = serde_json::json!({
            "blinded_element_b64": blinded_b64,
            "sybil_proof": { "type": "none" },
        });
        let cache = self.issuers.read().await.clone();
        for base in &self.cfg.issuers {
            let Some(info) = cache.get(base) else { continue };
            let resp = self
                .http
                .post(Self::url(base, "/v1/oprf/issue"))
                .json(&body)
                .send()
                .await;
            let Ok(resp) = resp else { continue };
            let Ok(resp) = resp.error_for_status() else { continue };
            let Ok(v) = resp.json::<Value>().await else { continue };
            let Some(token_b64) = v.get("token").and_then(Value::as_str) else {
                continue;
            };
            let Ok(token) = URL_SAFE_NO_PAD.decode(token_b64) else {
                warn!(issuer = %base, "unparseable issued token");
                continue;
            };
            match voprf::verify_issued_token(&token, &info.pubkey, self.cfg.context.as_bytes()) {
                Ok(true) => {
                    self.blindings
                        .lock()
                        .map_err(|_| FreebirdError::State)?
                        .remove(blinded);
                    debug!(issuer = %base, "issued token verified");
                    return Ok(token);
                }
                _ => {
                    warn!(issuer = %base, "DLEQ proof rejected; trying next issuer");
                }
            }
        }
        Err(FreebirdError::NoIssuerAvailable)
    }

    /// Ask the verifier service whether an issued token is valid.
    pub async fn verify_token(&self, token: &[u8]) -> Result<bool, FreebirdError> {
        let verifier = self
            .cfg
            .verifier_url
            .as_deref()
            .ok_or(FreebirdError::NoVerifier)?;
        let cache = self.issuers.read().await;
        let info = self
            .cfg
            .issuers
            .iter()
            .find_map(|base| cache.get(base));
        let body = serde_json::json!({
            "token_b64": URL_SAFE_NO_PAD.encode(token),
            "issuer_id": info.and_then(|i| i.issuer_id.clone()),
            "epoch": info.and_then(|i| i.epoch),
        });
        drop(cache);
        let v: Value = self
            .http
            .post(Self::url(verifier, "/v1/verify"))
            .json(&body)
            .send()
            .await
            .map_err(|_| FreebirdError::VerifierUnreachable)?
            .error_for_status()
            .map_err(|_| FreebirdError::VerifierUnreachable)?
            .json()
            .await
            .map_err(|_| FreebirdError::MalformedPayload)?;
        v.get("ok")
            .and_then(Value::as_bool)
            .ok_or(FreebirdError::MalformedPayload)
    }

    /// Create a 98-byte Schnorr ownership proof. Local, no connectivity.
    pub fn create_ownership_proof(
        &self,
        secret: &[u8],
        binding: &[u8],
    ) -> Result<[u8; schnorr::OWNERSHIP_PROOF_LEN], FreebirdError> {
        Ok(schnorr::create_ownership_proof(secret, binding)?)
    }

    /// Verify a 98-byte ownership proof. Local, no connectivity.
    pub fn verify_ownership_proof(&self, proof: &[u8], binding: &[u8]) -> bool {
        schnorr::verify_ownership_proof(proof, binding)
    }

    /// Number of blinding factors awaiting issuance.
    pub fn pending_blindings(&self) -> usize {
        self.blindings.lock().map(|m| m.len()).unwrap_or(0)
    }
}
