// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! BLS12-381 aggregated-signature verification for witness attestations.
//!
//! Minimal-signature-size variant: public keys live in G1 (48 bytes
//! compressed), signatures in G2 (96 bytes compressed). All witnesses sign
//! the same attestation message, so aggregate verification reduces to one
//! pairing check against the sum of the signer keys.

use crate::crypto::CryptoError;
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective};

/// Compressed G1 public key length.
pub const PUBKEY_LEN: usize = 48;
/// Compressed G2 signature length.
pub const SIGNATURE_LEN: usize = 96;

/// Standard ciphersuite tag the witness nodes sign under.
pub const SIGNATURE_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Attestation message framing, bit-exact with the witness nodes:
/// `hash_bytes || timestamp_u64_le || network_id_utf8 || sequence_u64_le`.
pub fn attestation_message(
    hash: &[u8],
    timestamp_secs: u64,
    network_id: &str,
    sequence: u64,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(hash.len() + 16 + network_id.len());
    out.extend_from_slice(hash);
    out.extend_from_slice(&timestamp_secs.to_le_bytes());
    out.extend_from_slice(network_id.as_bytes());
    out.extend_from_slice(&sequence.to_le_bytes());
    out
}

fn decode_pubkey(bytes: &[u8]) -> Result<G1Affine, CryptoError> {
    let arr: [u8; PUBKEY_LEN] = bytes.try_into().map_err(|_| CryptoError::MalformedPoint)?;
    let point: Option<G1Affine> = G1Affine::from_compressed(&arr).into();
    point.ok_or(CryptoError::MalformedPoint)
}

fn decode_signature(bytes: &[u8]) -> Result<G2Affine, CryptoError> {
    let arr: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| CryptoError::MalformedProof)?;
    let point: Option<G2Affine> = G2Affine::from_compressed(&arr).into();
    point.ok_or(CryptoError::MalformedProof)
}

/// Sum per-witness signatures over a shared message into one aggregate.
pub fn aggregate_signatures(signatures: &[Vec<u8>]) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
    let mut iter = signatures.iter();
    let first = iter.next().ok_or(CryptoError::MalformedProof)?;
    let mut agg = G2Projective::from(decode_signature(first)?);
    for sig in iter {
        agg += G2Projective::from(decode_signature(sig)?);
    }
    Ok(G2Affine::from(agg).to_compressed())
}

/// Verify an aggregated signature over a single message shared by all
/// signers: sum the signer keys in G1 and run the standard single-message
/// check `e(pk_sum, H(m)) == e(G1, sig)`.
pub fn verify_aggregate(
    pubkeys: &[Vec<u8>],
    signature: &[u8],
    message: &[u8],
) -> Result<bool, CryptoError> {
    let mut iter = pubkeys.iter();
    let first = iter.next().ok_or(CryptoError::MalformedPoint)?;
    let mut agg = G1Projective::from(decode_pubkey(first)?);
    for pk in iter {
        agg += G1Projective::from(decode_pubkey(pk)?);
    }
    let sig = decode_signature(signature)?;

    let hashed =
        <G2Projective as HashToCurve<ExpandMsgXmd<sha2_09::Sha256>>>::hash_to_curve(
            message,
            SIGNATURE_DST,
        );

    let lhs = pairing(&G1Affine::from(agg), &G2Affine::from(hashed));
    let rhs = pairing(&G1Affine::generator(), &sig);
    Ok(lhs == rhs)
}
