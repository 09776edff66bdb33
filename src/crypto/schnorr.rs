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

//! Schnorr-on-P-256 ownership proofs (98 bytes: `P || R || s`).
//!
//! The proving scalar is derived from the token secret, and the nonce is
//! derived deterministically from the scalar and the binding context, so a
//! fixed `(secret, binding)` pair yields a bitwise-identical proof. The
//! binding (a nullifier in every production path) stops replay across
//! contexts.

use crate::crypto::{curve, hashing, CryptoError};

/// Ownership proof wire length: 33 + 33 + 32.
pub const OWNERSHIP_PROOF_LEN: usize = 98;

const SCALAR_DOMAIN: &[u8] = b"OWNERSHIP_SCALAR";
const NONCE_DOMAIN: &[u8] = b"SCHNORR_NONCE";
const CHALLENGE_DOMAIN: &[u8] = b"SCHNORR_OWNERSHIP";

fn ownership_scalar(secret: &[u8]) -> Result<p256::Scalar, CryptoError> {
    let digest = hashing::Digest::new()
        .bytes(SCALAR_DOMAIN)
        .bytes(secret)
        .finish();
    curve::reduce_scalar_nonzero(&digest)
}

fn challenge(r_bytes: &[u8; 33], p_bytes: &[u8; 33], binding: &[u8]) -> p256::Scalar {
    let digest = hashing::Digest::new()
        .bytes(CHALLENGE_DOMAIN)
        .bytes(r_bytes)
        .bytes(p_bytes)
        .bytes(binding)
        .finish();
    curve::reduce_scalar(&digest)
}

/// Prove knowledge of `secret` bound to `binding`.
pub fn create_ownership_proof(
    secret: &[u8],
    binding: &[u8],
) -> Result<[u8; OWNERSHIP_PROOF_LEN], CryptoError> {
    let x = ownership_scalar(secret)?;
    let p = curve::generator() * x;
    let p_bytes = curve::encode_point(&p)?;

    let nonce_digest = hashing::Digest::new()
        .bytes(NONCE_DOMAIN)
        .bytes(&curve::scalar_bytes(&x))
        .bytes(binding)
        .finish();
    let k = curve::reduce_scalar_nonzero(&nonce_digest)?;
    let r = curve::generator() * k;
    let r_bytes = curve::encode_point(&r)?;

    let c = challenge(&r_bytes, &p_bytes, binding);
    let s = k + c * x;

    let mut out = [0u8; OWNERSHIP_PROOF_LEN];
    out[0..33].copy_from_slice(&p_bytes);
    out[33..66].copy_from_slice(&r_bytes);
    out[66..98].copy_from_slice(&curve::scalar_bytes(&s));
    Ok(out)
}

/// Verify a 98-byte ownership proof against `binding`.
///
/// Any decode failure rejects.
pub fn verify_ownership_proof(proof: &[u8], binding: &[u8]) -> bool {
    if proof.len() != OWNERSHIP_PROOF_LEN {
        return false;
    }
    let p_bytes: [u8; 33] = match proof[0..33].try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let r_bytes: [u8; 33] = match proof[33..66].try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let s_bytes: [u8; 32] = match proof[66..98].try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };

    let p = match curve::decode_point(&p_bytes) {
        Ok(v) => v,
        Err(_) => return false,
    };
    let r = match curve::decode_point(&r_bytes) {
        Ok(v) => v,
        Err(_) => return false,
    };
    // s must be canonical and nonzero.
    let s = match curve::parse_scalar(&s_bytes) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if hashing::constant_time_eq(&s_bytes, &[0u8; 32]) {
        return false;
    }

    let c = challenge(&r_bytes, &p_bytes, binding);
    let lhs = curve::generator() * s;
    let rhs = r + p * c;
    match (curve::encode_point(&lhs), curve::encode_point(&rhs)) {
        (Ok(a), Ok(b)) => hashing::constant_time_eq(&a, &b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_roundtrip_and_binding() {
        let secret = [7u8; 32];
        let proof = create_ownership_proof(&secret, b"binding-a").unwrap();
        assert!(verify_ownership_proof(&proof, b"binding-a"));
        assert!(!verify_ownership_proof(&proof, b"binding-b"));
    }

    #[test]
    fn proof_is_deterministic() {
        let secret = [9u8; 32];
        let a = create_ownership_proof(&secret, b"ctx").unwrap();
        let b = create_ownership_proof(&secret, b"ctx").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_proof_rejected() {
        let secret = [1u8; 32];
        let proof = create_ownership_proof(&secret, b"ctx").unwrap();
        assert!(!verify_ownership_proof(&proof[..97], b"ctx"));
    }
}
