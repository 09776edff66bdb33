// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

//! Observability: Prometheus metrics and structured logging helpers.

pub mod logging;
pub mod metrics;
