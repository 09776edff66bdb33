// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! Nullifier gossip: epidemic propagation with layered spam defenses,
//! peer reputation, subnet-diversity accounting, and lazy-demurrage
//! expiry of the seen set.

pub mod engine;
pub mod messages;
pub mod peers;

pub use engine::{GossipConfig, GossipError, NullifierGossip, NullifierRecord, ReceiveOutcome};
pub use messages::GossipMessage;
pub use peers::{PeerRecord, PeerStats};
