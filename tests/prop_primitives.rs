// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use scarcity::crypto::{hashing, pow, schnorr};
use scarcity::gossip::peers::subnet_key;

proptest! {
    #[test]
    fn hex_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let encoded = hex::encode(&bytes);
        prop_assert_eq!(hex::decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn nullifier_is_a_pure_function(secret in any::<[u8; 32]>(), id in "[0-9a-f]{64}") {
        prop_assert_eq!(
            hashing::nullifier(&secret, &id),
            hashing::nullifier(&secret, &id)
        );
    }

    #[test]
    fn ownership_proofs_verify_only_under_their_binding(
        secret in any::<[u8; 32]>(),
        binding in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let proof = schnorr::create_ownership_proof(&secret, &binding).unwrap();
        prop_assert!(schnorr::verify_ownership_proof(&proof, &binding));

        let mut other = binding.clone();
        other.push(0u8);
        prop_assert!(!schnorr::verify_ownership_proof(&proof, &other));
    }

    #[test]
    fn ownership_proofs_are_deterministic(secret in any::<[u8; 32]>()) {
        let a = schnorr::create_ownership_proof(&secret, b"binding").unwrap();
        let b = schnorr::create_ownership_proof(&secret, b"binding").unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn constant_time_eq_matches_slice_equality(
        a in proptest::collection::vec(any::<u8>(), 0..64),
        b in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        prop_assert_eq!(hashing::constant_time_eq(&a, &b), a == b);
    }

    #[test]
    fn small_pow_always_solves(difficulty in 0u32..8) {
        let nonce = pow::solve_proof_of_work("challenge", difficulty);
        prop_assert!(pow::verify_proof_of_work("challenge", nonce, difficulty));
    }

    #[test]
    fn ipv4_subnet_key_drops_the_last_octet(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
        let key = subnet_key(&format!("{a}.{b}.{c}.{d}")).unwrap();
        prop_assert_eq!(key, format!("{a}.{b}.{c}"));
    }
}
