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

//! The nullifier gossip engine.
//!
//! The engine is the sole writer of the seen set and the peer table; the
//! updates for one received message are applied as one logical step under
//! a single mutex, and service calls or peer fan-out never happen with
//! the lock held. Readers observe either the pre- or post-state.
//!
//! Inbound messages pass the layered defense in order: structural check,
//! timestamp bounds, per-peer leaky bucket (silent drop), ownership
//! proof, witness attestation, dedup. Failures score the sending peer
//! and may evict it, but never abort unrelated work.

use crate::clients::api::{GossipApi, WitnessApi};
use crate::clients::peer::PeerHandle;
use crate::clients::witness::Attestation;
use crate::crypto::schnorr;
use crate::gossip::messages::GossipMessage;
use crate::gossip::peers::{subnet_key, PeerRecord, PeerStats};
use crate::monitoring::metrics::Metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Rolling validity window: nullifier records (and thus transfer proofs)
/// expire after this many milliseconds. This is the lazy-demurrage knob.
pub const DEFAULT_VALIDITY_WINDOW_MS: u64 = 24 * 24 * 24 * 3600 * 1000;

/// Gossip engine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GossipError {
    /// The local producer tried to publish an already-seen nullifier.
    #[error("double-spend: nullifier already published")]
    DoubleSpendLocal,
    /// Message from a peer the engine does not own.
    #[error("unknown peer")]
    UnknownPeer,
    /// Required fields missing or not well-formed.
    #[error("malformed message")]
    Malformed,
    /// Attestation timestamp outside the accept window.
    #[error("timestamp out of bounds")]
    TimestampOutOfBounds,
    /// Ownership proof required but missing or invalid.
    #[error("missing or invalid ownership proof")]
    InvalidOwnershipProof,
    /// Witness attestation failed verification.
    #[error("invalid witness attestation")]
    InvalidAttestation,
    /// Rejected engine configuration.
    #[error("invalid configuration")]
    Config,
    /// Internal state lock poisoned.
    #[error("internal state")]
    State,
}

fn d_peer_score_threshold() -> i32 {
    -50
}
fn d_score_min() -> i32 {
    -100
}
fn d_score_max() -> i32 {
    100
}
fn d_max_timestamp_future_sec() -> u64 {
    5
}
fn d_window() -> u64 {
    DEFAULT_VALIDITY_WINDOW_MS
}
fn d_rate_burst() -> f64 {
    20.0
}
fn d_rate_refill() -> f64 {
    10.0
}
fn d_quorum_estimate() -> u32 {
    3
}
fn d_max_record_count() -> u32 {
    1_000
}
fn d_subnet_warn_fraction() -> f64 {
    1.0 / 3.0
}
fn d_sweep_interval_ms() -> u64 {
    60_000
}
fn d_spam_penalty() -> i32 {
    10
}
fn d_invalid_proof_penalty() -> i32 {
    10
}
fn d_duplicate_penalty() -> i32 {
    1
}
fn d_accept_reward() -> i32 {
    1
}

/// Gossip engine configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct GossipConfig {
    /// Peers scoring below this are disconnected and removed.
    #[serde(default = "d_peer_score_threshold")]
    pub peer_score_threshold: i32,
    /// Score clamp floor.
    #[serde(default = "d_score_min")]
    pub score_min: i32,
    /// Score clamp ceiling.
    #[serde(default = "d_score_max")]
    pub score_max: i32,
    /// Accepted clock skew into the future, seconds.
    #[serde(default = "d_max_timestamp_future_sec")]
    pub max_timestamp_future_sec: u64,
    /// Rolling validity window in milliseconds (lazy demurrage).
    #[serde(default = "d_window")]
    pub max_nullifier_age_ms: u64,
    /// Demand a valid ownership proof on every inbound nullifier.
    #[serde(default)]
    pub require_ownership_proof: bool,
    /// Leaky-bucket burst capacity, messages.
    #[serde(default = "d_rate_burst")]
    pub rate_burst: f64,
    /// Leaky-bucket refill, messages per second.
    #[serde(default = "d_rate_refill")]
    pub rate_refill_per_sec: f64,
    /// Divisor turning a record count into the fast-check signal.
    #[serde(default = "d_quorum_estimate")]
    pub quorum_estimate: u32,
    /// Upper bound on a record's re-receipt counter.
    #[serde(default = "d_max_record_count")]
    pub max_record_count: u32,
    /// Warn when one subnet holds more than this fraction of peers.
    #[serde(default = "d_subnet_warn_fraction")]
    pub subnet_warn_fraction: f64,
    /// Period of the expiry sweep task, milliseconds.
    #[serde(default = "d_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Score penalty for spammy messages (structural/timestamp failures).
    #[serde(default = "d_spam_penalty")]
    pub spam_penalty: i32,
    /// Score penalty for invalid ownership or witness proofs.
    #[serde(default = "d_invalid_proof_penalty")]
    pub invalid_proof_penalty: i32,
    /// Score penalty for duplicate re-sends.
    #[serde(default = "d_duplicate_penalty")]
    pub duplicate_penalty: i32,
    /// Score reward for an accepted nullifier.
    #[serde(default = "d_accept_reward")]
    pub accept_reward: i32,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            peer_score_threshold: d_peer_score_threshold(),
            score_min: d_score_min(),
            score_max: d_score_max(),
            max_timestamp_future_sec: d_max_timestamp_future_sec(),
            max_nullifier_age_ms: d_window(),
            require_ownership_proof: false,
            rate_burst: d_rate_burst(),
            rate_refill_per_sec: d_rate_refill(),
            quorum_estimate: d_quorum_estimate(),
            max_record_count: d_max_record_count(),
            subnet_warn_fraction: d_subnet_warn_fraction(),
            sweep_interval_ms: d_sweep_interval_ms(),
            spam_penalty: d_spam_penalty(),
            invalid_proof_penalty: d_invalid_proof_penalty(),
            duplicate_penalty: d_duplicate_penalty(),
            accept_reward: d_accept_reward(),
        }
    }
}

/// A stored nullifier sighting.
#[derive(Clone, Debug)]
pub struct NullifierRecord {
    /// Nullifier hex.
    pub nullifier: String,
    /// Witness attestation that accompanied the first sighting.
    pub proof: Attestation,
    /// Bounded count of validated sightings from distinct deliveries.
    pub count: u32,
    /// Wall-clock of first insertion, milliseconds.
    pub first_seen_ms: u64,
    /// Ownership proof bytes from the first sighting, when present.
    pub ownership_proof: Option<Vec<u8>>,
}

/// Outcome of processing one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// New nullifier stored and forwarded.
    Accepted,
    /// Already known; counted, not forwarded.
    Duplicate,
    /// Dropped by the per-peer rate limiter (silent, unscored).
    RateLimited,
    /// Ping/pong housekeeping.
    Control,
}

struct PeerEntry {
    handle: PeerHandle,
    record: PeerRecord,
}

#[derive(Default)]
struct EngineState {
    seen: HashMap<String, NullifierRecord>,
    peers: HashMap<String, PeerEntry>,
    subnets: HashMap<String, usize>,
}

/// The nullifier gossip engine.
pub struct NullifierGossip {
    cfg: GossipConfig,
    witness: Arc<dyn WitnessApi>,
    metrics: Arc<Metrics>,
    state: Mutex<EngineState>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl NullifierGossip {
    /// Build an engine; rejects inconsistent configuration.
    pub fn new(
        cfg: GossipConfig,
        witness: Arc<dyn WitnessApi>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, GossipError> {
        if cfg.score_min >= cfg.score_max
            || cfg.peer_score_threshold < cfg.score_min
            || cfg.peer_score_threshold > cfg.score_max
            || cfg.max_nullifier_age_ms == 0
            || cfg.quorum_estimate == 0
            || cfg.rate_burst <= 0.0
            || cfg.rate_refill_per_sec <= 0.0
        {
            return Err(GossipError::Config);
        }
        Ok(Self {
            cfg,
            witness,
            metrics,
            state: Mutex::new(EngineState::default()),
        })
    }

    /// The configured validity window (validators must not exceed it).
    pub fn validity_window_ms(&self) -> u64 {
        self.cfg.max_nullifier_age_ms
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, GossipError> {
        self.state.lock().map_err(|_| GossipError::State)
    }

    /// Adopt a peer handed off by the transport. A peer with the same id
    /// starts over from a fresh record.
    pub fn add_peer(&self, handle: PeerHandle) -> Result<(), GossipError> {
        let mut st = self.lock()?;
        let id = handle.id().to_string();
        if let Some(prev) = st.peers.remove(&id) {
            Self::subnet_release(&mut st, &prev.handle);
        }
        if let Some(key) = handle.remote_address().and_then(subnet_key) {
            *st.subnets.entry(key).or_insert(0) += 1;
        }
        st.peers.insert(
            id.clone(),
            PeerEntry {
                record: PeerRecord::new(self.cfg.rate_burst),
                handle,
            },
        );
        self.metrics.gossip_peers.set(st.peers.len() as i64);

        // Sybil heuristic: one subnet dominating the peer set.
        let known: usize = st.subnets.values().sum();
        if known >= 3 {
            if let Some((subnet, count)) = st.subnets.iter().max_by_key(|(_, c)| **c) {
                if *count as f64 / known as f64 > self.cfg.subnet_warn_fraction {
                    warn!(%subnet, count, known, "subnet concentration above threshold");
                }
            }
        }
        debug!(peer = %id, "peer added");
        Ok(())
    }

    /// Drop a peer (transport-initiated). Returns whether it existed.
    pub fn remove_peer(&self, peer_id: &str) -> Result<bool, GossipError> {
        let mut st = self.lock()?;
        let removed = st.peers.remove(peer_id);
        if let Some(entry) = &removed {
            Self::subnet_release(&mut st, &entry.handle);
        }
        self.metrics.gossip_peers.set(st.peers.len() as i64);
        Ok(removed.is_some())
    }

    fn subnet_release(st: &mut EngineState, handle: &PeerHandle) {
        if let Some(key) = handle.remote_address().and_then(subnet_key) {
            if let Some(count) = st.subnets.get_mut(&key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    st.subnets.remove(&key);
                }
            }
        }
    }

    /// Apply a score delta; evicts and disconnects below the threshold.
    /// Returns true when the peer was evicted.
    fn adjust_score_locked(&self, st: &mut EngineState, peer_id: &str, delta: i32) -> bool {
        let Some(entry) = st.peers.get_mut(peer_id) else {
            return false;
        };
        entry.record.score = entry
            .record
            .score
            .saturating_add(delta)
            .clamp(self.cfg.score_min, self.cfg.score_max);
        if entry.record.score < self.cfg.peer_score_threshold {
            let entry = match st.peers.remove(peer_id) {
                Some(e) => e,
                None => return false,
            };
            entry.handle.disconnect();
            Self::subnet_release(st, &entry.handle);
            self.metrics.gossip_evicted_total.inc();
            self.metrics.gossip_peers.set(st.peers.len() as i64);
            info!(peer = %peer_id, score = entry.record.score, "peer evicted");
            return true;
        }
        false
    }

    fn penalize(&self, peer_id: &str, delta: i32) {
        if let Ok(mut st) = self.state.lock() {
            self.adjust_score_locked(&mut st, peer_id, -delta);
        }
    }

    /// Publish a locally produced nullifier and fan it out to every
    /// connected peer. A second publish of the same nullifier is a local
    /// double-spend and fails.
    pub fn publish_local(
        &self,
        nullifier_hex: &str,
        proof: Attestation,
        ownership_proof: Option<Vec<u8>>,
    ) -> Result<(), GossipError> {
        let now = now_ms();
        let message = GossipMessage::Nullifier {
            nullifier: nullifier_hex.to_string(),
            proof: proof.clone(),
            timestamp: now,
            ownership_proof: ownership_proof.as_deref().map(hex::encode),
        };
        let recipients: Vec<PeerHandle> = {
            let mut st = self.lock()?;
            if st.seen.contains_key(nullifier_hex) {
                return Err(GossipError::DoubleSpendLocal);
            }
            st.seen.insert(
                nullifier_hex.to_string(),
                NullifierRecord {
                    nullifier: nullifier_hex.to_string(),
                    proof,
                    count: 1,
                    first_seen_ms: now,
                    ownership_proof,
                },
            );
            self.metrics.gossip_seen.set(st.seen.len() as i64);
            st.peers.values().map(|e| e.handle.clone()).collect()
        };
        for peer in &recipients {
            peer.send(message.clone());
        }
        debug!(nullifier = %nullifier_hex, peers = recipients.len(), "nullifier published");
        Ok(())
    }

    /// Process one message from peer `peer_id`, applying the layered
    /// defense. Gate failures score the peer and surface as errors;
    /// rate-limited drops are silent.
    pub async fn receive(
        &self,
        peer_id: &str,
        msg: &GossipMessage,
    ) -> Result<ReceiveOutcome, GossipError> {
        let now = now_ms();
        let (nullifier_hex, proof, ownership_hex) = match msg {
            GossipMessage::Ping { .. } => {
                let reply = GossipMessage::Pong { timestamp: now };
                let st = self.lock()?;
                if let Some(entry) = st.peers.get(peer_id) {
                    entry.handle.send(reply);
                }
                return Ok(ReceiveOutcome::Control);
            }
            GossipMessage::Pong { .. } => return Ok(ReceiveOutcome::Control),
            GossipMessage::Nullifier {
                nullifier,
                proof,
                ownership_proof,
                ..
            } => (nullifier, proof, ownership_proof),
        };

        {
            let st = self.lock()?;
            if !st.peers.contains_key(peer_id) {
                return Err(GossipError::UnknownPeer);
            }
        }

        // 1. Structural gate.
        let nullifier_bytes = match hex::decode(nullifier_hex) {
            Ok(b) if b.len() == 32 => b,
            _ => {
                self.metrics.gossip_spam_dropped_total.inc();
                self.penalize(peer_id, self.cfg.spam_penalty);
                return Err(GossipError::Malformed);
            }
        };
        if !proof.is_well_formed() {
            self.metrics.gossip_spam_dropped_total.inc();
            self.penalize(peer_id, self.cfg.spam_penalty);
            return Err(GossipError::Malformed);
        }

        // 2. Timestamp gate: bounded staleness and future skew.
        let lower = now.saturating_sub(self.cfg.max_nullifier_age_ms);
        let upper = now.saturating_add(self.cfg.max_timestamp_future_sec * 1000);
        if proof.timestamp < lower || proof.timestamp > upper {
            self.metrics.gossip_spam_dropped_total.inc();
            self.penalize(peer_id, self.cfg.spam_penalty);
            return Err(GossipError::TimestampOutOfBounds);
        }

        // 3. Rate-limit gate: exhausted buckets drop silently.
        {
            let mut st = self.lock()?;
            let entry = st.peers.get_mut(peer_id).ok_or(GossipError::UnknownPeer)?;
            entry.record.last_message_ms = now;
            if !entry
                .record
                .rate_allow(now, self.cfg.rate_burst, self.cfg.rate_refill_per_sec)
            {
                self.metrics.gossip_rate_limited_total.inc();
                return Ok(ReceiveOutcome::RateLimited);
            }
        }

        // 4. Ownership-proof gate.
        if self.cfg.require_ownership_proof {
            let valid = ownership_hex
                .as_deref()
                .and_then(|h| hex::decode(h).ok())
                .map(|p| schnorr::verify_ownership_proof(&p, &nullifier_bytes))
                .unwrap_or(false);
            if !valid {
                self.metrics.gossip_invalid_proof_total.inc();
                self.penalize(peer_id, self.cfg.invalid_proof_penalty);
                return Err(GossipError::InvalidOwnershipProof);
            }
        }

        // 5. Witness-proof gate (async; no lock held).
        let attested = self.witness.verify(proof).await.unwrap_or(false);
        if !attested {
            self.metrics.gossip_invalid_proof_total.inc();
            let mut st = self.lock()?;
            if let Some(entry) = st.peers.get_mut(peer_id) {
                entry.record.invalid_proofs += 1;
            }
            self.adjust_score_locked(&mut st, peer_id, -self.cfg.invalid_proof_penalty);
            return Err(GossipError::InvalidAttestation);
        }

        // 6/7. Dedup or accept; one logical step under the lock.
        let forward: Vec<PeerHandle> = {
            let mut st = self.lock()?;
            if !st.peers.contains_key(peer_id) {
                // Evicted while we awaited the witness.
                return Err(GossipError::UnknownPeer);
            }
            if let Some(record) = st.seen.get_mut(nullifier_hex) {
                record.count = record.count.saturating_add(1).min(self.cfg.max_record_count);
                if let Some(entry) = st.peers.get_mut(peer_id) {
                    entry.record.duplicates += 1;
                }
                self.adjust_score_locked(&mut st, peer_id, -self.cfg.duplicate_penalty);
                self.metrics.gossip_duplicate_total.inc();
                return Ok(ReceiveOutcome::Duplicate);
            }
            st.seen.insert(
                nullifier_hex.clone(),
                NullifierRecord {
                    nullifier: nullifier_hex.clone(),
                    proof: proof.clone(),
                    count: 1,
                    first_seen_ms: now,
                    ownership_proof: ownership_hex.as_deref().and_then(|h| hex::decode(h).ok()),
                },
            );
            self.adjust_score_locked(&mut st, peer_id, self.cfg.accept_reward);
            self.metrics.gossip_accepted_total.inc();
            self.metrics.gossip_seen.set(st.seen.len() as i64);
            st.peers
                .iter()
                .filter(|(id, _)| id.as_str() != peer_id)
                .map(|(_, e)| e.handle.clone())
                .collect()
        };
        for peer in &forward {
            peer.send(msg.clone());
        }
        Ok(ReceiveOutcome::Accepted)
    }

    /// Fast local double-spend signal: `min(1, count / quorum_estimate)`,
    /// zero when unseen.
    pub fn check_nullifier_local(&self, nullifier_hex: &str) -> f32 {
        let Ok(st) = self.state.lock() else { return 0.0 };
        match st.seen.get(nullifier_hex) {
            Some(record) => (record.count as f32 / self.cfg.quorum_estimate as f32).min(1.0),
            None => 0.0,
        }
    }

    /// Snapshot of one seen-set record.
    pub fn record(&self, nullifier_hex: &str) -> Option<NullifierRecord> {
        self.state.lock().ok()?.seen.get(nullifier_hex).cloned()
    }

    /// Snapshot of one peer's reputation record.
    pub fn peer_record(&self, peer_id: &str) -> Option<PeerRecord> {
        self.state
            .lock()
            .ok()?
            .peers
            .get(peer_id)
            .map(|e| e.record.clone())
    }

    /// Number of live seen-set records.
    pub fn seen_len(&self) -> usize {
        self.state.lock().map(|st| st.seen.len()).unwrap_or(0)
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.state.lock().map(|st| st.peers.len()).unwrap_or(0)
    }

    /// Snapshot of the subnet diversity table.
    pub fn subnet_counts(&self) -> HashMap<String, usize> {
        self.state
            .lock()
            .map(|st| st.subnets.clone())
            .unwrap_or_default()
    }

    /// Peer counts by direction.
    pub fn peer_stats_local(&self) -> PeerStats {
        let mut stats = PeerStats::default();
        if let Ok(st) = self.state.lock() {
            for entry in st.peers.values() {
                match entry.handle.direction() {
                    Some(crate::clients::peer::PeerDirection::Outbound) => stats.outbound += 1,
                    Some(crate::clients::peer::PeerDirection::Inbound) => stats.inbound += 1,
                    None => stats.unknown += 1,
                }
            }
        }
        stats
    }

    /// Drop records older than the validity window. Returns how many were
    /// removed. This, plus the timestamp gate, is lazy demurrage.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let Ok(mut st) = self.state.lock() else { return 0 };
        let before = st.seen.len();
        let window = self.cfg.max_nullifier_age_ms;
        st.seen
            .retain(|_, rec| rec.first_seen_ms.saturating_add(window) >= now_ms);
        let removed = before - st.seen.len();
        if removed > 0 {
            self.metrics.gossip_expired_total.inc_by(removed as u64);
            self.metrics.gossip_seen.set(st.seen.len() as i64);
        }
        removed
    }

    /// Spawn the periodic expiry sweep. The task runs until aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let period = Duration::from_millis(engine.cfg.sweep_interval_ms.max(1_000));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = engine.sweep_at(now_ms());
                if removed > 0 {
                    debug!(removed, "expired nullifier records swept");
                }
            }
        })
    }
}

#[async_trait]
impl GossipApi for NullifierGossip {
    async fn publish(
        &self,
        nullifier_hex: &str,
        proof: Attestation,
        ownership_proof: Option<Vec<u8>>,
    ) -> Result<(), GossipError> {
        self.publish_local(nullifier_hex, proof, ownership_proof)
    }

    fn check_nullifier(&self, nullifier_hex: &str) -> f32 {
        self.check_nullifier_local(nullifier_hex)
    }

    fn peer_stats(&self) -> PeerStats {
        self.peer_stats_local()
    }
}
