// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! BLS attestation verification, including the local fallback path the
//! witness client takes when no gateway will answer `/v1/verify`.

use axum::routing::get;
use axum::{Json, Router};
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use scarcity::clients::witness::{normalize_attestation, WitnessClient, WitnessConfig};
use scarcity::crypto::bls;
use serde_json::{json, Value};

fn keypair(seed: u64) -> (Scalar, [u8; 48]) {
    let sk = Scalar::from(seed);
    let pk = G1Affine::from(G1Projective::generator() * sk).to_compressed();
    (sk, pk)
}

fn sign(message: &[u8], sk: &Scalar) -> G2Projective {
    let h = <G2Projective as HashToCurve<ExpandMsgXmd<sha2_09::Sha256>>>::hash_to_curve(
        message,
        bls::SIGNATURE_DST,
    );
    h * sk
}

#[test]
fn aggregated_signature_verifies_over_the_framed_message() {
    let hash = [0x5au8; 32];
    let message = bls::attestation_message(&hash, 1_700_000_000, "scarcity-test", 7);

    let signers: Vec<(Scalar, [u8; 48])> = vec![keypair(11), keypair(22), keypair(33)];
    let mut agg = G2Projective::identity();
    for (sk, _) in &signers {
        agg += sign(&message, sk);
    }
    let signature = G2Affine::from(agg).to_compressed();
    let pubkeys: Vec<Vec<u8>> = signers.iter().map(|(_, pk)| pk.to_vec()).collect();

    assert!(bls::verify_aggregate(&pubkeys, &signature, &message).unwrap());

    // Any framing drift breaks verification.
    let other = bls::attestation_message(&hash, 1_700_000_001, "scarcity-test", 7);
    assert!(!bls::verify_aggregate(&pubkeys, &signature, &other).unwrap());

    // A missing signer breaks the key aggregate.
    assert!(!bls::verify_aggregate(&pubkeys[..2].to_vec(), &signature, &message).unwrap());
}

#[test]
fn per_witness_signatures_aggregate_to_the_same_thing() {
    let hash = [0x21u8; 32];
    let message = bls::attestation_message(&hash, 42, "net", 0);
    let signers = [keypair(5), keypair(6)];

    let sigs: Vec<Vec<u8>> = signers
        .iter()
        .map(|(sk, _)| G2Affine::from(sign(&message, sk)).to_compressed().to_vec())
        .collect();
    let aggregated = bls::aggregate_signatures(&sigs).unwrap();
    let pubkeys: Vec<Vec<u8>> = signers.iter().map(|(_, pk)| pk.to_vec()).collect();
    assert!(bls::verify_aggregate(&pubkeys, &aggregated, &message).unwrap());
}

#[tokio::test]
async fn witness_client_falls_back_to_local_bls() {
    let signers: Vec<(Scalar, [u8; 48])> = vec![keypair(101), keypair(102), keypair(103)];

    // A gateway that publishes witness keys but refuses to verify
    // (no /v1/verify route), forcing the local path.
    let witnesses: Vec<Value> = signers
        .iter()
        .enumerate()
        .map(|(i, (_, pk))| {
            json!({"id": format!("w{}", i + 1), "endpoint": "http://w.invalid", "pubkey": hex::encode(pk)})
        })
        .collect();
    let config_body = json!({
        "network_id": "scarcity-test",
        "threshold": 2,
        "witnesses": witnesses,
    });
    let app = Router::new().route(
        "/v1/config",
        get(move || {
            let body = config_body.clone();
            async move { Json(body) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = WitnessClient::new(WitnessConfig {
        gateways: vec![format!("http://{addr}")],
        request_timeout_ms: 2_000,
        ..WitnessConfig::default()
    })
    .unwrap();

    // Build a signed attestation the way a gateway would frame it.
    let hash = [0x77u8; 32];
    let (ts_secs, sequence) = (1_700_000_123u64, 9u64);
    let message = bls::attestation_message(&hash, ts_secs, "scarcity-test", sequence);
    let mut agg = G2Projective::identity();
    for (sk, _) in &signers {
        agg += sign(&message, sk);
    }
    let raw = json!({
        "hash": hex::encode(hash),
        "timestamp": ts_secs,
        "network_id": "scarcity-test",
        "sequence": sequence,
        "signature": hex::encode(G2Affine::from(agg).to_compressed()),
        "signers": ["w1", "w2", "w3"],
    });
    let attestation = normalize_attestation(raw).unwrap();

    assert!(client.verify(&attestation).await.unwrap());

    // Tampered sequence: framing no longer matches the signature.
    let mut tampered = attestation.clone();
    if let Some(raw) = tampered.raw.as_mut() {
        raw["sequence"] = json!(10);
    }
    assert!(!client.verify(&tampered).await.unwrap());
}
