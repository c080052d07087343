// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wraps `observer-api::build_router` (§4.12) behind a bound TCP listener,
//! wiring a logging-based `WebhookDispatchPort` (subscriber delivery is an
//! out-of-process transport concern; this binary does not bundle an HTTP
//! client for it, the same way it does for the `llm` completion port).

use crate::cli::ServeArgs;
use crate::commands::EXIT_GREEN;
use crate::wiring::build_event_log_stack;
use archon_types::Event;
use async_trait::async_trait;
use observer_api::{build_router, AppState, GapReconciler, ProofService, WebhookDispatchPort, WebhookRegistry};
use std::sync::Arc;

struct LoggingDispatcher;

#[async_trait]
impl WebhookDispatchPort for LoggingDispatcher {
    async fn deliver(&self, url: &str, event: &Event) {
        tracing::info!(url, sequence = event.sequence, event_type = ?event.event_type, "webhook delivery (logged, not transported)");
    }
}

pub async fn run(args: ServeArgs) -> anyhow::Result<i32> {
    let stack = build_event_log_stack(5, chrono::Utc::now()).await;
    let verifier = Arc::new(event_store::HashChainVerifier::new(stack.store.clone(), stack.key_registry.clone()));
    let gap_reconciler = Arc::new(GapReconciler::new(verifier, stack.halt_manager.clone()));
    let proof_service = Arc::new(ProofService::new(stack.store.clone(), 1000));
    let subscriptions = Arc::new(WebhookRegistry::new(Arc::new(LoggingDispatcher)));

    let state = AppState {
        store: stack.store.clone(),
        proof_service,
        subscriptions,
        gap_reconciler,
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    tracing::info!(port = args.port, "observer API listening");
    axum::serve(listener, router).await?;
    Ok(EXIT_GREEN)
}
