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

//! Probabilistic transfer validation.
//!
//! Tiered checks, cheapest first: the age gate, the local gossip fast
//! path, the witness quorum, the attestation itself, then a propagation
//! wait and a second gossip look. Acceptance is a confidence score, not
//! a finality proof; outbound peers weigh triple against Eclipse
//! attacks.

use crate::clients::api::{GossipApi, WitnessApi};
use crate::clients::witness::WitnessError;
use crate::monitoring::metrics::Metrics;
use crate::token::packages::TransferPackage;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Validation errors.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The transfer proof is older than the validity window.
    #[error("transfer expired")]
    Expired,
    /// The nullifier is already circulating in gossip.
    #[error("double-spend detected in gossip")]
    DoubleSpendGossip,
    /// The witness federation has already seen the nullifier.
    #[error("double-spend detected in witness")]
    DoubleSpendWitness,
    /// The package attestation failed verification or is not bound to
    /// the package bytes.
    #[error("invalid attestation")]
    InvalidAttestation,
    /// Every check passed but the confidence score is below threshold.
    #[error("confidence {0} below threshold")]
    LowConfidence(f32),
    /// The caller cancelled the validation.
    #[error("cancelled")]
    Cancelled,
    /// Validator window exceeds the gossip validity window.
    #[error("invalid configuration")]
    Config,
    /// Witness client failure.
    #[error("witness")]
    Witness(#[from] WitnessError),
}

fn d_max_token_age_ms() -> u64 {
    crate::gossip::engine::DEFAULT_VALIDITY_WINDOW_MS
}
fn d_wait_time_ms() -> u64 {
    5_000
}
fn d_min_confidence() -> f32 {
    0.5
}
fn d_gossip_threshold() -> f32 {
    0.5
}

/// Validator configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ValidatorConfig {
    /// Maximum accepted proof age; must not exceed the gossip engine's
    /// validity window.
    #[serde(default = "d_max_token_age_ms")]
    pub max_token_age_ms: u64,
    /// Propagation wait between the two gossip looks.
    #[serde(default = "d_wait_time_ms")]
    pub wait_time_ms: u64,
    /// Minimum confidence to accept.
    #[serde(default = "d_min_confidence")]
    pub min_confidence: f32,
    /// Gossip signal above which the transfer is a double-spend.
    #[serde(default = "d_gossip_threshold")]
    pub gossip_threshold: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_token_age_ms: d_max_token_age_ms(),
            wait_time_ms: d_wait_time_ms(),
            min_confidence: d_min_confidence(),
            gossip_threshold: d_gossip_threshold(),
        }
    }
}

/// A successful validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Validation {
    /// Aggregate confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Tiered transfer validator with read-only service handles.
pub struct TransferValidator {
    cfg: ValidatorConfig,
    gossip: Arc<dyn GossipApi>,
    witness: Arc<dyn WitnessApi>,
    metrics: Arc<Metrics>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl TransferValidator {
    /// Build a validator. The validator's age window must not exceed the
    /// gossip engine's validity window, or expired-but-unswept records
    /// would validate.
    pub fn new(
        cfg: ValidatorConfig,
        gossip_window_ms: u64,
        gossip: Arc<dyn GossipApi>,
        witness: Arc<dyn WitnessApi>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ValidateError> {
        if cfg.max_token_age_ms == 0
            || cfg.max_token_age_ms > gossip_window_ms
            || !(0.0..=1.0).contains(&cfg.min_confidence)
        {
            return Err(ValidateError::Config);
        }
        Ok(Self {
            cfg,
            gossip,
            witness,
            metrics,
        })
    }

    /// Full validation with the configured propagation wait.
    pub async fn validate(&self, package: &TransferPackage) -> Result<Validation, ValidateError> {
        self.run(package, self.cfg.wait_time_ms).await
    }

    /// Skip the wait and the second gossip look.
    pub async fn fast_validate(
        &self,
        package: &TransferPackage,
    ) -> Result<Validation, ValidateError> {
        self.run(package, 0).await
    }

    /// Extend the propagation wait for high-value transfers.
    pub async fn deep_validate(
        &self,
        package: &TransferPackage,
        extra_wait_ms: u64,
    ) -> Result<Validation, ValidateError> {
        self.run(package, self.cfg.wait_time_ms.saturating_add(extra_wait_ms))
            .await
    }

    /// Full validation racing a cancel signal. Cancellation does not
    /// revert anything already published.
    pub async fn validate_with_cancel(
        &self,
        package: &TransferPackage,
        mut cancel: tokio::sync::watch::Receiver<bool>,
    ) -> Result<Validation, ValidateError> {
        if *cancel.borrow() {
            return Err(ValidateError::Cancelled);
        }
        let cancelled = async move {
            loop {
                if cancel.changed().await.is_err() {
                    // Caller dropped the cancel handle; never fires.
                    std::future::pending::<()>().await;
                }
                if *cancel.borrow() {
                    return;
                }
            }
        };
        tokio::select! {
            result = self.validate(package) => result,
            _ = cancelled => Err(ValidateError::Cancelled),
        }
    }

    async fn run(
        &self,
        package: &TransferPackage,
        wait_ms: u64,
    ) -> Result<Validation, ValidateError> {
        // 1. Age gate: lazy demurrage makes stale transfers worthless.
        let now = now_ms();
        if now.saturating_sub(package.proof.timestamp) > self.cfg.max_token_age_ms {
            self.metrics.validator_rejected_total.inc();
            return Err(ValidateError::Expired);
        }

        // 2. Gossip fast path.
        let gossip_signal = self.gossip.check_nullifier(&package.nullifier);
        if gossip_signal > self.cfg.gossip_threshold {
            self.metrics.validator_rejected_total.inc();
            return Err(ValidateError::DoubleSpendGossip);
        }

        // 3. Witness federation quorum.
        let witness_signal = self.witness.check_nullifier(&package.nullifier).await?;
        if witness_signal > 0.0 {
            self.metrics.validator_rejected_total.inc();
            return Err(ValidateError::DoubleSpendWitness);
        }

        // 4. The attestation itself, bound to these package bytes.
        if package.proof.hash != package.package_hash()
            || !self.witness.verify(&package.proof).await?
        {
            self.metrics.validator_rejected_total.inc();
            return Err(ValidateError::InvalidAttestation);
        }

        // 5. Propagation wait, then a second gossip look: a concurrent
        // double-spend needs time to reach us.
        if wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            let recheck = self.gossip.check_nullifier(&package.nullifier);
            if recheck > self.cfg.gossip_threshold {
                self.metrics.validator_rejected_total.inc();
                return Err(ValidateError::DoubleSpendGossip);
            }
        }

        // 6. Confidence.
        let confidence = self.confidence(wait_ms);
        if confidence < self.cfg.min_confidence {
            warn!(confidence, "transfer below confidence threshold");
            self.metrics.validator_rejected_total.inc();
            return Err(ValidateError::LowConfidence(confidence));
        }
        self.metrics.validator_confirmed_total.inc();
        debug!(confidence, nullifier = %package.nullifier, "transfer validated");
        Ok(Validation { confidence })
    }

    fn confidence(&self, wait_ms: u64) -> f32 {
        let stats = self.gossip.peer_stats();
        let peer_score = (stats.effective_peers() / 10.0).min(0.5);
        let witness_score = (self.witness.federation_depth() as f32 / 3.0).min(0.3);
        let time_score = (wait_ms as f32 / 10_000.0).min(0.2);
        peer_score + witness_score + time_score
    }
}
