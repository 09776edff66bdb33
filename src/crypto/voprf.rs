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

//! Client side of the P-256 VOPRF: blinding and DLEQ-proof verification.
//!
//! An issued token is exactly 130 bytes: `A (33) || B (33) || c (32) || s (32)`
//! where `(c, s)` is a Chaum-Pedersen DLEQ proof over `(G, Q, A, B)` that
//! `log_G(Q) = log_A(B)` for the issuer key `Q`.

use crate::crypto::{curve, hashing, CryptoError};
use p256::Scalar;

/// Issued-token wire length.
pub const ISSUED_TOKEN_LEN: usize = 130;

/// DLEQ transcript domain tag; the issuing context is appended.
pub const DLEQ_DST_PREFIX: &[u8] = b"DLEQ-P256-v1";

/// A blinded element together with the factor needed to finish the
/// protocol. The factor never leaves the client.
pub struct Blinding {
    /// Compressed `r * hash_to_curve(input, ctx)`.
    pub blinded: [u8; curve::COMPRESSED_POINT_LEN],
    /// The blinding scalar `r`.
    pub factor: Scalar,
}

/// Blind `input` for oblivious evaluation: `blinded = r * hash_to_curve(input, ctx)`
/// for a fresh random `r` in `[1, n)`.
pub fn blind(input: &[u8], ctx: &[u8]) -> Result<Blinding, CryptoError> {
    let element = curve::hash_to_curve(input, ctx)?;
    let factor = curve::random_scalar()?;
    let blinded = curve::encode_point(&(element * factor))?;
    Ok(Blinding { blinded, factor })
}

/// Verify an issued token's DLEQ proof against the issuer's published key.
///
/// Returns `Ok(false)` when the proof equation fails; structural problems
/// (wrong length, undecodable points, non-canonical scalars) are errors.
pub fn verify_issued_token(
    token: &[u8],
    issuer_pubkey: &[u8],
    ctx: &[u8],
) -> Result<bool, CryptoError> {
    if token.len() != ISSUED_TOKEN_LEN {
        return Err(CryptoError::MalformedProof);
    }
    let a_bytes: [u8; 33] = token[0..33].try_into().map_err(|_| CryptoError::MalformedProof)?;
    let b_bytes: [u8; 33] = token[33..66].try_into().map_err(|_| CryptoError::MalformedProof)?;
    let c_bytes: [u8; 32] = token[66..98].try_into().map_err(|_| CryptoError::MalformedProof)?;
    let s_bytes: [u8; 32] = token[98..130].try_into().map_err(|_| CryptoError::MalformedProof)?;

    let a = curve::decode_point(&a_bytes)?;
    let b = curve::decode_point(&b_bytes)?;
    let q = curve::decode_point(issuer_pubkey)?;
    let c = curve::parse_scalar(&c_bytes)?;
    let s = curve::parse_scalar(&s_bytes)?;

    let g = curve::generator();
    let t1 = g * s - q * c;
    let t2 = a * s - b * c;
    // A forged proof can land a commitment on the identity, which has no
    // compressed encoding; that is a failed proof, not a malformed call.
    let (t1_bytes, t2_bytes) = match (curve::encode_point(&t1), curve::encode_point(&t2)) {
        (Ok(x), Ok(y)) => (x, y),
        _ => return Ok(false),
    };

    let mut dst = Vec::with_capacity(DLEQ_DST_PREFIX.len() + ctx.len());
    dst.extend_from_slice(DLEQ_DST_PREFIX);
    dst.extend_from_slice(ctx);

    let transcript = hashing::Digest::new()
        .bytes(&(dst.len() as u32).to_be_bytes())
        .bytes(&dst)
        .bytes(&curve::encode_point(&g)?)
        .bytes(issuer_pubkey)
        .bytes(&a_bytes)
        .bytes(&b_bytes)
        .bytes(&t1_bytes)
        .bytes(&t2_bytes)
        .finish();

    let expected = curve::reduce_scalar(&transcript);
    Ok(hashing::constant_time_eq(
        &curve::scalar_bytes(&expected),
        &c_bytes,
    ))
}
