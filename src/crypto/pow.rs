// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Proof-of-work for witness gateway rate control.
//!
//! A solution is the smallest nonce such that
//! `SHA-256(challenge || decimal(nonce))` has `difficulty` leading zero
//! bits. Difficulty counts bits, not hex digits.

use crate::crypto::hashing;

/// Count leading zero bits of a hash.
fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut bits = 0u32;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Check whether `nonce` solves `challenge` at `difficulty` bits.
pub fn verify_proof_of_work(challenge: &str, nonce: u64, difficulty: u32) -> bool {
    let digest = hashing::Digest::new()
        .str(challenge)
        .str(&nonce.to_string())
        .finish();
    leading_zero_bits(&digest) >= difficulty
}

/// Scan nonces from zero and return the smallest solution.
///
/// Expected work is `2^difficulty` hashes; gateways keep the target small
/// enough for interactive use.
pub fn solve_proof_of_work(challenge: &str, difficulty: u32) -> u64 {
    let mut nonce = 0u64;
    loop {
        if verify_proof_of_work(challenge, nonce, difficulty) {
            return nonce;
        }
        nonce = nonce.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_then_verify() {
        let nonce = solve_proof_of_work("challenge", 8);
        assert!(verify_proof_of_work("challenge", nonce, 8));
    }

    #[test]
    fn zero_difficulty_accepts_zero_nonce() {
        assert_eq!(solve_proof_of_work("anything", 0), 0);
    }

    #[test]
    fn leading_zero_bit_count() {
        assert_eq!(leading_zero_bits(&[0x00, 0x00, 0xff]), 16);
        assert_eq!(leading_zero_bits(&[0x0f]), 4);
        assert_eq!(leading_zero_bits(&[0x80]), 0);
    }
}
