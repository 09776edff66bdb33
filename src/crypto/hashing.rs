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

//! Deterministic SHA-256 hashing and key-material derivation.
//!
//! Concatenation rules: bytes are hashed as-is, strings as UTF-8, and
//! integers as 8-byte big-endian. Order is significant.

use crate::crypto::CryptoError;
use ring::{
    digest,
    rand::{SecureRandom, SystemRandom},
};
use subtle::ConstantTimeEq;

/// 32-byte SHA-256 output.
pub type Hash32 = [u8; 32];

const PUBLIC_KEY_DOMAIN: &[u8] = b"PUBLIC_KEY";

/// Order-sensitive SHA-256 builder.
///
/// ```
/// use scarcity::crypto::hashing::Digest;
/// let h = Digest::new().bytes(b"ab").str("cd").u64(7).finish();
/// assert_eq!(h.len(), 32);
/// ```
pub struct Digest {
    ctx: digest::Context,
}

impl Digest {
    /// Start a fresh digest.
    pub fn new() -> Self {
        Self {
            ctx: digest::Context::new(&digest::SHA256),
        }
    }

    /// Absorb raw bytes.
    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.ctx.update(b);
        self
    }

    /// Absorb a UTF-8 string.
    pub fn str(mut self, s: &str) -> Self {
        self.ctx.update(s.as_bytes());
        self
    }

    /// Absorb an integer as 8-byte big-endian.
    pub fn u64(mut self, v: u64) -> Self {
        self.ctx.update(&v.to_be_bytes());
        self
    }

    /// Finish and return the 32-byte hash.
    pub fn finish(self) -> Hash32 {
        let d = self.ctx.finish();
        let mut out = [0u8; 32];
        out.copy_from_slice(d.as_ref());
        out
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> Hash32 {
    let d = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// Fill a buffer of `n` bytes from the system CSPRNG.
pub fn random_bytes(n: usize) -> Result<Vec<u8>, CryptoError> {
    let rng = SystemRandom::new();
    let mut out = vec![0u8; n];
    rng.fill(&mut out).map_err(|_| CryptoError::Rng)?;
    Ok(out)
}

/// 32 bytes from the system CSPRNG.
pub fn random_bytes32() -> Result<[u8; 32], CryptoError> {
    let rng = SystemRandom::new();
    let mut out = [0u8; 32];
    rng.fill(&mut out).map_err(|_| CryptoError::Rng)?;
    Ok(out)
}

/// Constant-time equality: length check plus XOR-accumulate, no early
/// return on content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Public key fingerprint: `SHA-256("PUBLIC_KEY" || secret)`.
///
/// Public keys in this protocol are hash fingerprints, not curve points;
/// they identify recipients and bind VOPRF inputs and ownership proofs.
pub fn derive_public_key(secret: &[u8]) -> Hash32 {
    Digest::new().bytes(PUBLIC_KEY_DOMAIN).bytes(secret).finish()
}

/// Spend marker: `SHA-256(secret || token_id)`.
///
/// Deterministic for a given `(secret, id)` pair; mint ids carry 32 bytes
/// of randomness, which is what makes collisions negligible.
pub fn nullifier(secret: &[u8], token_id: &str) -> Hash32 {
    Digest::new().bytes(secret).str(token_id).finish()
}

/// Transfer package hash: `hash(token_id, amount, commitment, nullifier)`
/// per the binary concatenation rules, hex-encoded.
///
/// `commitment` and `nullifier` enter in wire form (lowercase hex).
pub fn transfer_package_digest(
    token_id: &str,
    amount: u64,
    commitment_hex: &str,
    nullifier_hex: &str,
) -> String {
    let h = Digest::new()
        .str(token_id)
        .u64(amount)
        .str(commitment_hex)
        .str(nullifier_hex)
        .finish();
    hex::encode(h)
}
