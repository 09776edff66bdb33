// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Structured logging init.

use tracing_subscriber::EnvFilter;

/// Install a JSON-formatted tracing subscriber honoring `RUST_LOG`.
///
/// Best-effort: a second call (or an embedding application that already
/// installed a subscriber) is a no-op.
pub fn init_json_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();
}

/// Plain-text init for interactive use and tests.
pub fn init_text_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
