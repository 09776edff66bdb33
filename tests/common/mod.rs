// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

//! In-memory service doubles shared by the integration tests.

use async_trait::async_trait;
use scarcity::clients::api::{FreebirdApi, WitnessApi};
use scarcity::clients::freebird::FreebirdError;
use scarcity::clients::witness::{Attestation, WitnessError};
use scarcity::crypto::hashing::Digest;
use scarcity::crypto::{curve, voprf};
use scarcity::gossip::{GossipConfig, NullifierGossip};
use scarcity::monitoring::metrics::Metrics;
use scarcity::token::Services;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Witness double: remembers what it attested; verification is
/// membership in that set plus the structural invariant.
pub struct MockWitness {
    depth: usize,
    attested: Mutex<HashSet<String>>,
    seen_nullifiers: Mutex<HashSet<String>>,
}

impl MockWitness {
    pub fn new(depth: usize) -> Arc<Self> {
        Arc::new(Self {
            depth,
            attested: Mutex::new(HashSet::new()),
            seen_nullifiers: Mutex::new(HashSet::new()),
        })
    }

    /// Treat `hash` as attested without going through `timestamp`.
    pub fn allow_hash(&self, hash: &str) {
        self.attested.lock().unwrap().insert(hash.to_string());
    }

    /// Make `check_nullifier` report a federation-level double spend.
    pub fn seed_nullifier(&self, nullifier_hex: &str) {
        self.seen_nullifiers
            .lock()
            .unwrap()
            .insert(nullifier_hex.to_string());
    }
}

#[async_trait]
impl WitnessApi for MockWitness {
    async fn timestamp(&self, hash_hex: &str) -> Result<Attestation, WitnessError> {
        self.attested.lock().unwrap().insert(hash_hex.to_string());
        let ids: Vec<String> = (1..=self.depth).map(|i| format!("w{i}")).collect();
        let sigs: Vec<String> = (1..=self.depth).map(|i| format!("sig{i}")).collect();
        Ok(Attestation {
            hash: hash_hex.to_string(),
            timestamp: now_ms(),
            signatures: sigs,
            witness_ids: ids,
            raw: None,
        })
    }

    async fn verify(&self, attestation: &Attestation) -> Result<bool, WitnessError> {
        Ok(attestation.is_well_formed()
            && self.attested.lock().unwrap().contains(&attestation.hash))
    }

    async fn check_nullifier(&self, nullifier_hex: &str) -> Result<f32, WitnessError> {
        if self.seen_nullifiers.lock().unwrap().contains(nullifier_hex) {
            Ok(1.0)
        } else {
            Ok(0.0)
        }
    }

    fn federation_depth(&self) -> usize {
        self.depth
    }
}

/// Freebird double: real VOPRF blinding, no network.
pub struct MockFreebird;

#[async_trait]
impl FreebirdApi for MockFreebird {
    async fn blind(&self, input: &[u8]) -> Result<Vec<u8>, FreebirdError> {
        let blinding = voprf::blind(input, b"freebird:v1").map_err(FreebirdError::Crypto)?;
        Ok(blinding.blinded.to_vec())
    }
}

pub fn engine(witness: Arc<MockWitness>) -> Arc<NullifierGossip> {
    engine_with(witness, GossipConfig::default())
}

pub fn engine_with(witness: Arc<MockWitness>, cfg: GossipConfig) -> Arc<NullifierGossip> {
    let metrics = Arc::new(Metrics::new().unwrap());
    Arc::new(NullifierGossip::new(cfg, witness, metrics).unwrap())
}

pub fn services(witness: Arc<MockWitness>, gossip: Arc<NullifierGossip>) -> Arc<Services> {
    Arc::new(Services {
        freebird: Arc::new(MockFreebird),
        witness,
        gossip,
    })
}

/// Issuer-side oblivious evaluation with a Chaum-Pedersen DLEQ proof:
/// the 130-byte token a Freebird issuer returns for a blinded element.
pub fn dleq_issue(blinded: &[u8], issuer_secret: &p256::Scalar, ctx: &[u8]) -> Vec<u8> {
    let a = curve::decode_point(blinded).unwrap();
    let q = curve::generator() * *issuer_secret;
    let b = a * *issuer_secret;

    let nonce = curve::random_scalar().unwrap();
    let t1 = curve::generator() * nonce;
    let t2 = a * nonce;

    let mut dst = Vec::new();
    dst.extend_from_slice(voprf::DLEQ_DST_PREFIX);
    dst.extend_from_slice(ctx);

    let transcript = Digest::new()
        .bytes(&(dst.len() as u32).to_be_bytes())
        .bytes(&dst)
        .bytes(&curve::encode_point(&curve::generator()).unwrap())
        .bytes(&curve::encode_point(&q).unwrap())
        .bytes(&curve::encode_point(&a).unwrap())
        .bytes(&curve::encode_point(&b).unwrap())
        .bytes(&curve::encode_point(&t1).unwrap())
        .bytes(&curve::encode_point(&t2).unwrap())
        .finish();
    let c = curve::reduce_scalar(&transcript);
    let s = nonce + c * *issuer_secret;

    let mut token = Vec::with_capacity(voprf::ISSUED_TOKEN_LEN);
    token.extend_from_slice(&curve::encode_point(&a).unwrap());
    token.extend_from_slice(&curve::encode_point(&b).unwrap());
    token.extend_from_slice(&curve::scalar_bytes(&c));
    token.extend_from_slice(&curve::scalar_bytes(&s));
    token
}
