// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! External-service clients and the seams the core consumes them through.
//!
//! The Freebird issuance service and the Witness timestamping federation
//! are reached over HTTP; the gossip overlay is reached through the
//! channel-based peer seam in [`peer`]. The [`api`] traits are what the
//! token machine, gossip engine, and validator actually depend on.

pub mod api;
pub mod freebird;
pub mod peer;
pub mod witness;
