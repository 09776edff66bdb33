// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! Cryptographic primitives: deterministic hashing, P-256 arithmetic,
//! VOPRF blinding with DLEQ verification, Schnorr ownership proofs,
//! BLS12-381 attestation verification, and proof-of-work.

pub mod bls;
pub mod curve;
pub mod hashing;
pub mod pow;
pub mod schnorr;
pub mod voprf;

use thiserror::Error;

/// Crypto primitive errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// System RNG failure.
    #[error("rng")]
    Rng,
    /// Point bytes did not decode to a curve point.
    #[error("malformed compressed point")]
    MalformedPoint,
    /// A derived or parsed scalar was zero where zero is rejected.
    #[error("zero scalar")]
    ZeroScalar,
    /// Scalar bytes were not canonical (>= curve order).
    #[error("scalar out of range")]
    ScalarRange,
    /// Try-and-increment exhausted without hitting the curve.
    #[error("hash-to-curve failed")]
    HashToCurve,
    /// Proof or signature blob had the wrong shape.
    #[error("malformed proof")]
    MalformedProof,
}
