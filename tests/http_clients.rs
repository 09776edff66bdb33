// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! The real reqwest clients against in-process mock gateways.

mod common;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use scarcity::clients::freebird::{FreebirdClient, FreebirdConfig};
use scarcity::clients::witness::{WitnessClient, WitnessConfig};
use scarcity::crypto::{curve, pow};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------- witness

#[derive(Clone)]
struct Gateway {
    network_id: String,
    threshold: usize,
    aggregated: bool,
    attested: Arc<Mutex<HashMap<String, Value>>>,
    last_timestamp_body: Arc<Mutex<Option<Value>>>,
}

impl Gateway {
    fn new(threshold: usize, aggregated: bool) -> Self {
        Self {
            network_id: "scarcity-test".into(),
            threshold,
            aggregated,
            attested: Arc::new(Mutex::new(HashMap::new())),
            last_timestamp_body: Arc::new(Mutex::new(None)),
        }
    }
}

async fn gw_config(State(gw): State<Gateway>) -> Json<Value> {
    Json(json!({
        "network_id": gw.network_id,
        "threshold": gw.threshold,
        "witnesses": [
            {"id": "w1", "endpoint": "http://w1.invalid"},
            {"id": "w2", "endpoint": "http://w2.invalid"},
            {"id": "w3", "endpoint": "http://w3.invalid"},
        ],
    }))
}

async fn gw_timestamp(State(gw): State<Gateway>, Json(body): Json<Value>) -> Json<Value> {
    *gw.last_timestamp_body.lock().unwrap() = Some(body.clone());
    let hash = body["hash"].as_str().unwrap_or_default().to_string();
    let att = if gw.aggregated {
        json!({
            "hash": hash,
            "timestamp": 1_700_000_000u64,
            "signature": "aabb",
            "signers": ["w1", "w2", "w3"],
            "network_id": gw.network_id,
            "sequence": 7,
        })
    } else {
        json!({
            "hash": hash,
            "timestamp": 1_700_000_000u64,
            "signatures": [
                {"witness_id": "w1", "signature": "aa"},
                {"witness_id": "w2", "signature": "bb"},
            ],
        })
    };
    gw.attested.lock().unwrap().insert(hash, att.clone());
    Json(json!({ "attestation": att }))
}

async fn gw_lookup(State(gw): State<Gateway>, Path(hash): Path<String>) -> axum::response::Response {
    match gw.attested.lock().unwrap().get(&hash) {
        Some(att) => (StatusCode::OK, Json(json!({ "attestation": att }))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn gw_verify(State(gw): State<Gateway>, Json(body): Json<Value>) -> Json<Value> {
    let valid = body["attestation"]["hash"]
        .as_str()
        .map(|h| gw.attested.lock().unwrap().contains_key(h))
        .unwrap_or(false);
    Json(json!({ "valid": valid }))
}

async fn spawn_gateway(gw: Gateway) -> String {
    let app = Router::new()
        .route("/v1/config", get(gw_config))
        .route("/v1/timestamp", post(gw_timestamp))
        .route("/v1/timestamp/:hash", get(gw_lookup))
        .route("/v1/verify", post(gw_verify))
        .with_state(gw);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn timestamp_normalizes_the_multisig_shape() {
    let url = spawn_gateway(Gateway::new(2, false)).await;
    let client = WitnessClient::new(WitnessConfig {
        gateways: vec![url],
        ..WitnessConfig::default()
    })
    .unwrap();

    let att = client.timestamp("ab".repeat(32).as_str()).await.unwrap();
    assert_eq!(att.hash, "ab".repeat(32));
    // Wire seconds become internal milliseconds.
    assert_eq!(att.timestamp, 1_700_000_000_000);
    assert_eq!(att.signatures, vec!["aa", "bb"]);
    assert_eq!(att.witness_ids, vec!["w1", "w2"]);
    assert!(att.raw.is_some());

    // The gateway round-trips its own attestation as valid.
    assert!(client.verify(&att).await.unwrap());
}

#[tokio::test]
async fn timestamp_normalizes_the_aggregated_shape() {
    let url = spawn_gateway(Gateway::new(2, true)).await;
    let client = WitnessClient::new(WitnessConfig {
        gateways: vec![url],
        ..WitnessConfig::default()
    })
    .unwrap();

    let att = client.timestamp("cd".repeat(32).as_str()).await.unwrap();
    assert_eq!(att.signatures.len(), 1);
    assert_eq!(att.witness_ids, vec!["w1", "w2", "w3"]);
    assert!(att.is_well_formed());
}

#[tokio::test]
async fn timestamp_includes_proof_of_work_when_demanded() {
    let gw = Gateway::new(2, false);
    let body_probe = gw.last_timestamp_body.clone();
    let url = spawn_gateway(gw).await;
    let client = WitnessClient::new(WitnessConfig {
        gateways: vec![url],
        pow_difficulty: 8,
        ..WitnessConfig::default()
    })
    .unwrap();

    let hash = "ef".repeat(32);
    client.timestamp(&hash).await.unwrap();
    let body = body_probe.lock().unwrap().clone().unwrap();
    assert_eq!(body["difficulty"].as_u64(), Some(8));
    let nonce = body["nonce"].as_u64().unwrap();
    assert!(pow::verify_proof_of_work(&hash, nonce, 8));
}

#[tokio::test]
async fn check_nullifier_votes_across_gateways() {
    // Three gateways; the nullifier is attested at the first two with
    // enough signatures (threshold 2 <= 2 provided).
    let g1 = spawn_gateway(Gateway::new(2, false)).await;
    let g2 = spawn_gateway(Gateway::new(2, false)).await;
    let g3 = spawn_gateway(Gateway::new(2, false)).await;

    let nullifier = "0a".repeat(32);
    // Seed the first two gateways by timestamping through each individually.
    for gw in [&g1, &g2] {
        let single = WitnessClient::new(WitnessConfig {
            gateways: vec![gw.clone()],
            ..WitnessConfig::default()
        })
        .unwrap();
        single.timestamp(&nullifier).await.unwrap();
    }

    // 2-of-3 seen: double spend.
    let client = WitnessClient::new(WitnessConfig {
        gateways: vec![g1.clone(), g2.clone(), g3.clone()],
        ..WitnessConfig::default()
    })
    .unwrap();
    assert_eq!(client.check_nullifier(&nullifier).await.unwrap(), 1.0);

    // 0-of-3 seen: clean.
    assert_eq!(
        client.check_nullifier(&"0b".repeat(32)).await.unwrap(),
        0.0
    );

    // 1 seen, 1 unseen, 1 erroring: split vote.
    let dead = "http://127.0.0.1:1".to_string();
    let split = WitnessClient::new(WitnessConfig {
        gateways: vec![g1.clone(), g3.clone(), dead],
        quorum: Some(2),
        ..WitnessConfig::default()
    })
    .unwrap();
    assert_eq!(split.check_nullifier(&nullifier).await.unwrap(), 0.5);

    // Every gateway down: cannot verify, warn and report clean.
    let lost = WitnessClient::new(WitnessConfig {
        gateways: vec!["http://127.0.0.1:1".into(), "http://127.0.0.1:2".into()],
        request_timeout_ms: 500,
        ..WitnessConfig::default()
    })
    .unwrap();
    assert_eq!(lost.check_nullifier(&nullifier).await.unwrap(), 0.0);
}

// ---------------------------------------------------------------- freebird

#[derive(Clone)]
struct Issuer {
    secret: p256::Scalar,
    context: Vec<u8>,
}

async fn issuer_metadata(State(iss): State<Issuer>) -> Json<Value> {
    let pubkey = curve::encode_point(&(curve::generator() * iss.secret)).unwrap();
    Json(json!({
        "voprf": { "pubkey": URL_SAFE_NO_PAD.encode(pubkey) },
        "epoch": 3,
        "issuer_id": "issuer-test",
    }))
}

async fn issuer_issue(State(iss): State<Issuer>, Json(body): Json<Value>) -> Json<Value> {
    let blinded = URL_SAFE_NO_PAD
        .decode(body["blinded_element_b64"].as_str().unwrap_or_default())
        .unwrap();
    let token = common::dleq_issue(&blinded, &iss.secret, &iss.context);
    Json(json!({ "token": URL_SAFE_NO_PAD.encode(token) }))
}

async fn issuer_verify(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "ok": body["token_b64"].is_string() }))
}

async fn spawn_issuer(iss: Issuer) -> String {
    let app = Router::new()
        .route("/.well-known/issuer", get(issuer_metadata))
        .route("/v1/oprf/issue", post(issuer_issue))
        .route("/v1/verify", post(issuer_verify))
        .with_state(iss);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn blind_issue_verify_round_trip() {
    let issuer = Issuer {
        secret: curve::random_scalar().unwrap(),
        context: b"freebird:v1".to_vec(),
    };
    let url = spawn_issuer(issuer).await;
    let client = FreebirdClient::new(FreebirdConfig {
        issuers: vec![url.clone()],
        verifier_url: Some(url),
        ..FreebirdConfig::default()
    })
    .unwrap();

    let blinded = client.blind(b"recipient-public-key").await.unwrap();
    assert_eq!(blinded.len(), 33);
    assert_eq!(client.pending_blindings(), 1);

    let token = client.issue_token(&blinded).await.unwrap();
    assert_eq!(token.len(), 130);
    // Blind state is dropped once an issuer's proof verifies.
    assert_eq!(client.pending_blindings(), 0);

    assert!(client.verify_token(&token).await.unwrap());
}

#[tokio::test]
async fn issuance_skips_issuers_with_bad_proofs() {
    // First issuer signs under a key it does not publish; the client must
    // reject its proof and fall through to the honest issuer.
    let dishonest = Issuer {
        // Evaluates with a different secret than its published key by
        // advertising a context that breaks its own transcript.
        secret: curve::random_scalar().unwrap(),
        context: b"wrong-context".to_vec(),
    };
    let honest = Issuer {
        secret: curve::random_scalar().unwrap(),
        context: b"freebird:v1".to_vec(),
    };
    let bad_url = spawn_issuer(dishonest).await;
    let good_url = spawn_issuer(honest).await;

    let client = FreebirdClient::new(FreebirdConfig {
        issuers: vec![bad_url, good_url],
        ..FreebirdConfig::default()
    })
    .unwrap();
    let blinded = client.blind(b"pk").await.unwrap();
    let token = client.issue_token(&blinded).await.unwrap();
    assert_eq!(token.len(), 130);
}

#[tokio::test]
async fn unreachable_issuers_fail_closed() {
    let client = FreebirdClient::new(FreebirdConfig {
        issuers: vec!["http://127.0.0.1:1".into()],
        request_timeout_ms: 500,
        ..FreebirdConfig::default()
    })
    .unwrap();
    assert!(client.blind(b"pk").await.is_err());
}
