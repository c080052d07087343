// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thin `tracing` init wrapper. This crate owns no business logic: it just
//! installs a subscriber and gets out of the way.
//!
//! Logs are operational signal, never the source of truth. Every
//! constitutional state transition is also recorded as a witnessed `Event`
//! by the caller — a log line here is never a substitute for that event.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// Structured JSON, for production log aggregation.
    Json,
}

/// Installs the global `tracing` subscriber. Safe to call once per process;
/// a second call is a no-op (mirrors `tracing_subscriber`'s own guidance).
pub fn init_logger(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        LogFormat::Pretty => subscriber.pretty().try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    };

    if let Err(err) = result {
        tracing::debug!(%err, "logger already initialized, skipping");
    }
}

pub use tracing::{debug, error, info, trace, warn};
