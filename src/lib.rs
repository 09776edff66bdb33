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
#![warn(missing_docs)]

//! Scarcity - privacy-preserving peer-to-peer bearer-token protocol core.
//!
//! This crate provides the client core of the protocol:
//! - Deterministic hashing, P-256 VOPRF blinding with DLEQ verification,
//!   Schnorr ownership proofs, BLS12-381 attestation verification, and
//!   proof-of-work for witness rate control
//! - HTTP clients for the Freebird issuance service and the Witness
//!   timestamping federation (quorum voting, local BLS fallback)
//! - The bearer-token state machine: mint, transfer, split, merge,
//!   multi-party transfer, HTLC, and the cross-federation bridge
//! - An epidemic nullifier gossip engine with peer reputation, layered
//!   spam gates, and lazy-demurrage expiry
//! - A tiered probabilistic transfer validator with anti-Eclipse
//!   confidence weighting
//!
//! The interactive surfaces (CLI, wallet stores, HTTP server, explorer) and
//! the transport wire glue live outside this crate; the core exposes the
//! channel-based peer seam in [`clients::peer`] for transports to drive.

/// Service clients (Freebird, Witness) and the gossip transport seam.
pub mod clients;
/// Configuration structs with TOML loading and cross-field validation.
pub mod config;
/// Cryptographic primitives (hashing, P-256, VOPRF, Schnorr, BLS, PoW).
pub mod crypto;
/// Nullifier gossip engine (seen set, peer reputation, spam gates, sweep).
pub mod gossip;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Token state machine, package formats, HTLC, and the federation bridge.
pub mod token;
/// Probabilistic transfer validator.
pub mod validator;
