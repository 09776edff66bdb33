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

//! Per-peer reputation state, rate limiting, and subnet keys.
//!
//! Scoring is deterministic and integer-only; the engine applies the
//! deltas and clamps, this module just holds the state.

use std::net::IpAddr;

/// Mutable reputation and throttle state for one peer.
#[derive(Clone, Debug)]
pub struct PeerRecord {
    /// Reputation score, clamped to the configured range.
    pub score: i32,
    /// Count of witness attestations that failed verification.
    pub invalid_proofs: u32,
    /// Count of duplicate nullifier re-sends.
    pub duplicates: u32,
    /// Wall-clock of the last message, milliseconds.
    pub last_message_ms: u64,
    /// Leaky-bucket fill, in message tokens.
    pub rate_tokens: f64,
    rate_refilled_ms: u64,
}

impl PeerRecord {
    /// Fresh peer starting at score zero with a full bucket.
    pub fn new(burst: f64) -> Self {
        Self {
            score: 0,
            invalid_proofs: 0,
            duplicates: 0,
            last_message_ms: 0,
            rate_tokens: burst,
            rate_refilled_ms: 0,
        }
    }

    /// Take one token from the leaky bucket, refilling for elapsed time.
    /// Returns false when the bucket is empty.
    pub fn rate_allow(&mut self, now_ms: u64, burst: f64, refill_per_sec: f64) -> bool {
        if self.rate_refilled_ms == 0 {
            self.rate_refilled_ms = now_ms;
        }
        let elapsed_sec = now_ms.saturating_sub(self.rate_refilled_ms) as f64 / 1000.0;
        self.rate_tokens = (self.rate_tokens + elapsed_sec * refill_per_sec).min(burst);
        self.rate_refilled_ms = now_ms;
        if self.rate_tokens >= 1.0 {
            self.rate_tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Peer counts by connection direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// Peers we dialed.
    pub outbound: usize,
    /// Peers that dialed us.
    pub inbound: usize,
    /// Peers with no direction hint.
    pub unknown: usize,
}

impl PeerStats {
    /// Anti-Eclipse weighting: outbound connections are much harder for
    /// an attacker to occupy, so they count triple.
    pub fn effective_peers(&self) -> f32 {
        (3 * self.outbound + self.inbound + self.unknown) as f32
    }
}

/// Subnet grouping key for diversity accounting: first three octets for
/// IPv4, first three hextets (a /48) for IPv6. Unparseable addresses
/// contribute nothing.
pub fn subnet_key(addr: &str) -> Option<String> {
    let ip: IpAddr = if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
        sock.ip()
    } else {
        addr.parse().ok()?
    };
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            Some(format!("{}.{}.{}", o[0], o[1], o[2]))
        }
        IpAddr::V6(v6) => {
            let s = v6.segments();
            Some(format!("{:x}:{:x}:{:x}", s[0], s[1], s[2]))
        }
    }
}
