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
#![warn(missing_docs)]

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Connected gossip peers gauge.
    pub gossip_peers: IntGauge,
    /// Live seen-set records gauge.
    pub gossip_seen: IntGauge,

    /// Accepted nullifier messages.
    pub gossip_accepted_total: IntCounter,
    /// Duplicate nullifier re-sends.
    pub gossip_duplicate_total: IntCounter,
    /// Messages with invalid ownership or witness proofs.
    pub gossip_invalid_proof_total: IntCounter,
    /// Messages dropped by the per-peer rate limiter.
    pub gossip_rate_limited_total: IntCounter,
    /// Messages dropped by structural or timestamp gates.
    pub gossip_spam_dropped_total: IntCounter,
    /// Peers evicted for low score.
    pub gossip_evicted_total: IntCounter,
    /// Records removed by the expiry sweep.
    pub gossip_expired_total: IntCounter,

    /// Transfers rejected by the validator.
    pub validator_rejected_total: IntCounter,
    /// Transfers confirmed by the validator.
    pub validator_confirmed_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let gossip_peers = IntGauge::new("scarcity_gossip_peers", "Connected gossip peers")
            .map_err(|_| MetricsError::Prom)?;
        let gossip_seen = IntGauge::new("scarcity_gossip_seen", "Live nullifier records")
            .map_err(|_| MetricsError::Prom)?;

        let gossip_accepted_total =
            IntCounter::new("scarcity_gossip_accepted_total", "Accepted nullifiers")
                .map_err(|_| MetricsError::Prom)?;
        let gossip_duplicate_total =
            IntCounter::new("scarcity_gossip_duplicate_total", "Duplicate re-sends")
                .map_err(|_| MetricsError::Prom)?;
        let gossip_invalid_proof_total = IntCounter::new(
            "scarcity_gossip_invalid_proof_total",
            "Invalid ownership/witness proofs",
        )
        .map_err(|_| MetricsError::Prom)?;
        let gossip_rate_limited_total = IntCounter::new(
            "scarcity_gossip_rate_limited_total",
            "Rate-limited messages",
        )
        .map_err(|_| MetricsError::Prom)?;
        let gossip_spam_dropped_total = IntCounter::new(
            "scarcity_gossip_spam_dropped_total",
            "Structural/timestamp gate drops",
        )
        .map_err(|_| MetricsError::Prom)?;
        let gossip_evicted_total =
            IntCounter::new("scarcity_gossip_evicted_total", "Evicted peers")
                .map_err(|_| MetricsError::Prom)?;
        let gossip_expired_total =
            IntCounter::new("scarcity_gossip_expired_total", "Expired records swept")
                .map_err(|_| MetricsError::Prom)?;

        let validator_rejected_total =
            IntCounter::new("scarcity_validator_rejected_total", "Rejected transfers")
                .map_err(|_| MetricsError::Prom)?;
        let validator_confirmed_total =
            IntCounter::new("scarcity_validator_confirmed_total", "Confirmed transfers")
                .map_err(|_| MetricsError::Prom)?;

        for collector in [
            Box::new(gossip_peers.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(gossip_seen.clone()),
            Box::new(gossip_accepted_total.clone()),
            Box::new(gossip_duplicate_total.clone()),
            Box::new(gossip_invalid_proof_total.clone()),
            Box::new(gossip_rate_limited_total.clone()),
            Box::new(gossip_spam_dropped_total.clone()),
            Box::new(gossip_evicted_total.clone()),
            Box::new(gossip_expired_total.clone()),
            Box::new(validator_rejected_total.clone()),
            Box::new(validator_confirmed_total.clone()),
        ] {
            registry.register(collector).map_err(|_| MetricsError::Prom)?;
        }

        Ok(Self {
            registry,
            gossip_peers,
            gossip_seen,
            gossip_accepted_total,
            gossip_duplicate_total,
            gossip_invalid_proof_total,
            gossip_rate_limited_total,
            gossip_spam_dropped_total,
            gossip_evicted_total,
            gossip_expired_total,
            validator_rejected_total,
            validator_confirmed_total,
        })
    }
}
