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

//! P-256 point and scalar helpers.
//!
//! Points travel as 33-byte SEC1 compressed encodings; scalars as 32-byte
//! big-endian. Identity points and zero scalars are rejected at the
//! boundaries. Hash-to-curve is try-and-increment over candidate
//! compressed encodings under the `freebird:v1` tag.

use crate::crypto::{hashing, CryptoError};
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::{Curve, Field, PrimeField};
use p256::{AffinePoint, EncodedPoint, FieldBytes, NistP256, ProjectivePoint, Scalar};

type CurveUint = <NistP256 as Curve>::Uint;

/// SEC1 compressed point length.
pub const COMPRESSED_POINT_LEN: usize = 33;

/// Domain-separation tag for VOPRF hash-to-curve.
pub const HASH_TO_CURVE_DST: &[u8] = b"freebird:v1";

/// The P-256 base point.
pub fn generator() -> ProjectivePoint {
    ProjectivePoint::GENERATOR
}

/// Decode a 33-byte compressed point. Rejects wrong lengths, malformed
/// encodings, and the identity.
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint, CryptoError> {
    if bytes.len() != COMPRESSED_POINT_LEN {
        return Err(CryptoError::MalformedPoint);
    }
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| CryptoError::MalformedPoint)?;
    if encoded.is_identity() {
        return Err(CryptoError::MalformedPoint);
    }
    let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    affine
        .map(ProjectivePoint::from)
        .ok_or(CryptoError::MalformedPoint)
}

/// Encode a point as 33 compressed bytes. Fails on the identity, which has
/// no compressed form.
pub fn encode_point(point: &ProjectivePoint) -> Result<[u8; COMPRESSED_POINT_LEN], CryptoError> {
    let encoded = point.to_affine().to_encoded_point(true);
    let bytes = encoded.as_bytes();
    if bytes.len() != COMPRESSED_POINT_LEN {
        return Err(CryptoError::MalformedPoint);
    }
    let mut out = [0u8; COMPRESSED_POINT_LEN];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Parse a canonical scalar (strictly below the curve order).
pub fn parse_scalar(bytes: &[u8; 32]) -> Result<Scalar, CryptoError> {
    let repr = FieldBytes::clone_from_slice(bytes);
    let scalar: Option<Scalar> = Scalar::from_repr(repr).into();
    scalar.ok_or(CryptoError::ScalarRange)
}

/// Reduce 32 big-endian bytes modulo the curve order.
pub fn reduce_scalar(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<CurveUint>>::reduce_bytes(&FieldBytes::clone_from_slice(bytes))
}

/// Reduce modulo the curve order, rejecting zero.
pub fn reduce_scalar_nonzero(bytes: &[u8; 32]) -> Result<Scalar, CryptoError> {
    let s = reduce_scalar(bytes);
    if bool::from(s.is_zero()) {
        return Err(CryptoError::ZeroScalar);
    }
    Ok(s)
}

/// 32-byte big-endian encoding of a scalar.
pub fn scalar_bytes(scalar: &Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&scalar.to_bytes());
    out
}

/// Uniform nonzero scalar from the system CSPRNG.
pub fn random_scalar() -> Result<Scalar, CryptoError> {
    loop {
        let bytes = hashing::random_bytes32()?;
        let s = reduce_scalar(&bytes);
        if !bool::from(s.is_zero()) {
            return Ok(s);
        }
    }
}

/// Try-and-increment hash-to-curve.
///
/// Candidate `i` is the compressed encoding
/// `0x02 || SHA-256(DST || ctx || input || i)`; roughly half the candidates
/// land on the curve, so exhausting the one-byte counter is a practical
/// impossibility.
pub fn hash_to_curve(input: &[u8], ctx: &[u8]) -> Result<ProjectivePoint, CryptoError> {
    for counter in 0u8..=u8::MAX {
        let digest = hashing::Digest::new()
            .bytes(HASH_TO_CURVE_DST)
            .bytes(ctx)
            .bytes(input)
            .bytes(&[counter])
            .finish();
        let mut candidate = [0u8; COMPRESSED_POINT_LEN];
        candidate[0] = 0x02;
        candidate[1..].copy_from_slice(&digest);
        if let Ok(point) = decode_point(&candidate) {
            return Ok(point);
        }
    }
    Err(CryptoError::HashToCurve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_roundtrip() {
        let s = random_scalar().unwrap();
        let p = generator() * s;
        let bytes = encode_point(&p).unwrap();
        let back = decode_point(&bytes).unwrap();
        assert_eq!(encode_point(&back).unwrap(), bytes);
    }

    #[test]
    fn rejects_malformed_point() {
        assert!(matches!(
            decode_point(&[0u8; 33]),
            Err(CryptoError::MalformedPoint)
        ));
        assert!(matches!(
            decode_point(&[2u8; 12]),
            Err(CryptoError::MalformedPoint)
        ));
    }

    #[test]
    fn hash_to_curve_is_deterministic() {
        let a = hash_to_curve(b"input", b"ctx").unwrap();
        let b = hash_to_curve(b"input", b"ctx").unwrap();
        assert_eq!(encode_point(&a).unwrap(), encode_point(&b).unwrap());
        let c = hash_to_curve(b"input", b"other").unwrap();
        assert_ne!(encode_point(&a).unwrap(), encode_point(&c).unwrap());
    }

    #[test]
    fn zero_scalar_rejected() {
        assert_eq!(
            reduce_scalar_nonzero(&[0u8; 32]),
            Err(CryptoError::ZeroScalar)
        );
    }
}
