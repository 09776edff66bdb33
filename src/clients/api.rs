// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Object-safe service traits.
//!
//! The token machine, gossip engine, and validator hold `Arc<dyn …>`
//! handles to these rather than concrete clients, which keeps service
//! lifetimes out of token values and lets tests substitute in-memory
//! implementations.

use crate::clients::freebird::{FreebirdClient, FreebirdError};
use crate::clients::witness::{Attestation, WitnessClient, WitnessError};
use crate::gossip::engine::GossipError;
use crate::gossip::peers::PeerStats;
use async_trait::async_trait;

/// Freebird operations the token machine depends on.
#[async_trait]
pub trait FreebirdApi: Send + Sync {
    /// Blind an input for oblivious evaluation; returns the commitment
    /// bytes (33-byte compressed element).
    async fn blind(&self, input: &[u8]) -> Result<Vec<u8>, FreebirdError>;
}

/// Witness operations the core depends on.
#[async_trait]
pub trait WitnessApi: Send + Sync {
    /// Threshold-timestamp a hex hash.
    async fn timestamp(&self, hash_hex: &str) -> Result<Attestation, WitnessError>;
    /// Verify an attestation.
    async fn verify(&self, attestation: &Attestation) -> Result<bool, WitnessError>;
    /// Quorum-voted double-spend signal in `[0, 1]`.
    async fn check_nullifier(&self, nullifier_hex: &str) -> Result<f32, WitnessError>;
    /// Number of independent gateways behind this client.
    fn federation_depth(&self) -> usize;
}

/// Gossip-engine operations the token machine and validator depend on.
#[async_trait]
pub trait GossipApi: Send + Sync {
    /// Publish a locally produced nullifier and fan it out to peers.
    async fn publish(
        &self,
        nullifier_hex: &str,
        proof: Attestation,
        ownership_proof: Option<Vec<u8>>,
    ) -> Result<(), GossipError>;
    /// Fast local double-spend signal in `[0, 1]`.
    fn check_nullifier(&self, nullifier_hex: &str) -> f32;
    /// Peer counts by direction (anti-Eclipse confidence input).
    fn peer_stats(&self) -> PeerStats;
}

#[async_trait]
impl FreebirdApi for FreebirdClient {
    async fn blind(&self, input: &[u8]) -> Result<Vec<u8>, FreebirdError> {
        FreebirdClient::blind(self, input).await
    }
}

#[async_trait]
impl WitnessApi for WitnessClient {
    async fn timestamp(&self, hash_hex: &str) -> Result<Attestation, WitnessError> {
        WitnessClient::timestamp(self, hash_hex).await
    }

    async fn verify(&self, attestation: &Attestation) -> Result<bool, WitnessError> {
        WitnessClient::verify(self, attestation).await
    }

    async fn check_nullifier(&self, nullifier_hex: &str) -> Result<f32, WitnessError> {
        WitnessClient::check_nullifier(self, nullifier_hex).await
    }

    fn federation_depth(&self) -> usize {
        WitnessClient::federation_depth(self)
    }
}
