// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

mod common;

use common::{now_ms, MockWitness};
use scarcity::clients::api::WitnessApi;
use scarcity::clients::peer::{PeerDirection, PeerHandle};
use scarcity::clients::witness::Attestation;
use scarcity::crypto::hashing;
use scarcity::gossip::{GossipConfig, NullifierGossip};
use scarcity::monitoring::metrics::Metrics;
use scarcity::token::packages::TransferPackage;
use scarcity::validator::{TransferValidator, ValidateError, ValidatorConfig};
use std::sync::Arc;

async fn attested_package(witness: &MockWitness, timestamp_ms: u64) -> TransferPackage {
    let mut package = TransferPackage {
        token_id: hex::encode(hashing::random_bytes32().unwrap()),
        amount: 100,
        commitment: hex::encode(hashing::random_bytes32().unwrap()),
        nullifier: hex::encode(hashing::random_bytes32().unwrap()),
        proof: Attestation {
            hash: String::new(),
            timestamp: timestamp_ms,
            signatures: vec!["s1".into(), "s2".into()],
            witness_ids: vec!["w1".into(), "w2".into()],
            raw: None,
        },
        ownership_proof: None,
    };
    package.proof.hash = package.package_hash();
    witness.allow_hash(&package.proof.hash);
    package
}

fn validator(
    engine: &Arc<NullifierGossip>,
    witness: &Arc<MockWitness>,
    cfg: ValidatorConfig,
) -> TransferValidator {
    TransferValidator::new(
        cfg,
        engine.validity_window_ms(),
        engine.clone(),
        witness.clone(),
        Arc::new(Metrics::new().unwrap()),
    )
    .unwrap()
}

#[tokio::test]
async fn age_gate_boundaries() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    // Outbound peers for confidence.
    for i in 0..4 {
        let (h, _m) = PeerHandle::channel(
            format!("o{i}"),
            Some(PeerDirection::Outbound),
            None,
            8,
        );
        engine.add_peer(h).unwrap();
    }
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 0,
            ..ValidatorConfig::default()
        },
    );
    let window = engine.validity_window_ms();

    // Just inside the window.
    let fresh = attested_package(&witness, now_ms() - window + 60_000).await;
    assert!(v.fast_validate(&fresh).await.is_ok());

    // Just past it.
    let stale = attested_package(&witness, now_ms() - window - 60_000).await;
    assert!(matches!(
        v.fast_validate(&stale).await,
        Err(ValidateError::Expired)
    ));
}

#[tokio::test]
async fn gossip_fast_path_detects_double_spend() {
    let witness = MockWitness::new(3);
    // quorum_estimate 1: a single sighting saturates the signal.
    let engine = common::engine_with(
        witness.clone(),
        GossipConfig {
            quorum_estimate: 1,
            ..GossipConfig::default()
        },
    );
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 0,
            ..ValidatorConfig::default()
        },
    );

    let package = attested_package(&witness, now_ms()).await;
    let attestation = witness.timestamp("other-package").await.unwrap();
    engine
        .publish_local(&package.nullifier, attestation, None)
        .unwrap();

    assert!(matches!(
        v.fast_validate(&package).await,
        Err(ValidateError::DoubleSpendGossip)
    ));
}

#[tokio::test]
async fn witness_quorum_detects_double_spend() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 0,
            ..ValidatorConfig::default()
        },
    );

    let package = attested_package(&witness, now_ms()).await;
    witness.seed_nullifier(&package.nullifier);
    assert!(matches!(
        v.fast_validate(&package).await,
        Err(ValidateError::DoubleSpendWitness)
    ));
}

#[tokio::test]
async fn attestation_must_verify_and_bind() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 0,
            ..ValidatorConfig::default()
        },
    );

    // Valid attestation over different package bytes.
    let mut tampered = attested_package(&witness, now_ms()).await;
    tampered.amount += 1;
    assert!(matches!(
        v.fast_validate(&tampered).await,
        Err(ValidateError::InvalidAttestation)
    ));

    // Correctly bound hash the witness never attested.
    let mut unattested = attested_package(&witness, now_ms()).await;
    unattested.nullifier = hex::encode(hashing::random_bytes32().unwrap());
    unattested.proof.hash = unattested.package_hash();
    assert!(matches!(
        v.fast_validate(&unattested).await,
        Err(ValidateError::InvalidAttestation)
    ));
}

#[tokio::test]
async fn confidence_weights_outbound_peers() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    // 3 outbound + 1 unknown: effective = 10, peer score caps at 0.5.
    for i in 0..3 {
        let (h, _m) = PeerHandle::channel(
            format!("o{i}"),
            Some(PeerDirection::Outbound),
            None,
            8,
        );
        engine.add_peer(h).unwrap();
    }
    let (h, _m) = PeerHandle::channel("u", None, None, 8);
    engine.add_peer(h).unwrap();

    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 0,
            ..ValidatorConfig::default()
        },
    );
    let package = attested_package(&witness, now_ms()).await;
    let validation = v.fast_validate(&package).await.unwrap();
    // peer 0.5 + witness 0.3 (depth 3) + time 0.0
    assert!((validation.confidence - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn low_confidence_without_peers() {
    let witness = MockWitness::new(1);
    let engine = common::engine(witness.clone());
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 0,
            ..ValidatorConfig::default()
        },
    );
    let package = attested_package(&witness, now_ms()).await;
    match v.fast_validate(&package).await {
        Err(ValidateError::LowConfidence(c)) => assert!(c < 0.5),
        other => panic!("expected LowConfidence, got {other:?}"),
    }
}

#[tokio::test]
async fn deep_validate_extends_the_wait() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    for i in 0..4 {
        let (h, _m) = PeerHandle::channel(
            format!("o{i}"),
            Some(PeerDirection::Outbound),
            None,
            8,
        );
        engine.add_peer(h).unwrap();
    }
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 50,
            ..ValidatorConfig::default()
        },
    );
    let package = attested_package(&witness, now_ms()).await;
    let started = std::time::Instant::now();
    let validation = v.deep_validate(&package, 150).await.unwrap();
    assert!(started.elapsed().as_millis() >= 200);
    assert!(validation.confidence >= 0.5);
}

#[tokio::test]
async fn cancellation_interrupts_the_wait() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    let v = validator(
        &engine,
        &witness,
        ValidatorConfig {
            wait_time_ms: 30_000,
            ..ValidatorConfig::default()
        },
    );
    let package = attested_package(&witness, now_ms()).await;

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let started = std::time::Instant::now();
    let cancel_task = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let _ = cancel_tx.send(true);
    });
    let result = v.validate_with_cancel(&package, cancel_rx).await;
    cancel_task.await.unwrap();
    assert!(matches!(result, Err(ValidateError::Cancelled)));
    assert!(started.elapsed().as_secs() < 5);
}

#[test]
fn validator_window_cannot_exceed_gossip_window() {
    let witness = MockWitness::new(3);
    let engine = common::engine(witness.clone());
    let result = TransferValidator::new(
        ValidatorConfig {
            max_token_age_ms: engine.validity_window_ms() + 1,
            ..ValidatorConfig::default()
        },
        engine.validity_window_ms(),
        engine.clone(),
        witness.clone(),
        Arc::new(Metrics::new().unwrap()),
    );
    assert!(matches!(result, Err(ValidateError::Config)));
}
