// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wraps `HashChainVerifier` (§4.2). The event store is an external port
//! (§1 Non-goals); this process verifies whatever it has witnessed itself
//! in-session rather than attaching to an external durable log.

use crate::cli::VerifyArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::build_event_log_stack;
use event_store::{EventStore, HashChainVerifier};

pub async fn run(args: VerifyArgs) -> anyhow::Result<i32> {
    let stack = build_event_log_stack(5, chrono::Utc::now()).await;
    let verifier = HashChainVerifier::new(stack.store.clone(), stack.key_registry.clone());
    let to = match args.to {
        Some(to) => to,
        None => stack.store.head().await.map(|e| e.sequence).unwrap_or(0),
    };
    let report = verifier.verify(args.from, to).await;

    tracing::info!(events_checked = report.events_checked, violations = report.violations.len(), "hash chain verification complete");
    for violation in &report.violations {
        tracing::error!(?violation, "integrity violation");
    }

    Ok(if report.violations.is_empty() { EXIT_GREEN } else { EXIT_BLOCKED })
}
