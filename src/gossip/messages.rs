// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Gossip wire messages.
//!
//! JSON-shaped with an explicit `type` discriminator; binary fields are
//! lowercase hex strings.

use crate::clients::witness::Attestation;
use serde::{Deserialize, Serialize};

/// A message on the gossip overlay.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GossipMessage {
    /// A published nullifier with its witness attestation.
    Nullifier {
        /// 32-byte nullifier, hex.
        nullifier: String,
        /// Witness attestation over the originating package hash.
        proof: Attestation,
        /// Sender wall-clock in milliseconds.
        timestamp: u64,
        /// 98-byte Schnorr ownership proof, hex.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ownership_proof: Option<String>,
    },
    /// Liveness probe.
    Ping {
        /// Sender wall-clock in milliseconds.
        timestamp: u64,
    },
    /// Liveness reply.
    Pong {
        /// Sender wall-clock in milliseconds.
        timestamp: u64,
    },
}

impl GossipMessage {
    /// Serialize for the wire.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse from wire bytes.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
