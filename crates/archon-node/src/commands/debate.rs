// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! §4.6 step 2: runs the no-preview debate rounds over a proposed motion,
//! advancing it to `DEBATED`.

use crate::cli::ConclaveArgs;
use crate::commands::EXIT_GREEN;
use crate::wiring::{
    build_event_log_stack_with_agents, load_conclave_session, new_events_since, resolve_completion,
    save_conclave_session, seed_event_log_stack, NoopDispatch,
};
use deliberation::{DeliberationConfig, DeliberationEngine};
use std::sync::Arc;

pub async fn run(args: ConclaveArgs) -> anyhow::Result<i32> {
    let mut session = load_conclave_session(&args.session)?;
    let mut motion = session
        .motion
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no motion proposed yet in session {}", args.session.display()))?;

    let now = chrono::Utc::now();
    let stack = build_event_log_stack_with_agents(5, now, &session.archons).await;
    seed_event_log_stack(&stack, &session.events).await?;
    let prior_len = stack.store.len().await;

    let completion = resolve_completion(args.mode)?;
    let engine = DeliberationEngine::new(
        stack.writer.clone(),
        completion,
        Arc::new(NoopDispatch),
        Arc::new(vote_validator::ReconciliationGate::new(stack.writer.clone())),
        DeliberationConfig::default(),
    );

    engine.run_debate(&mut motion, &session.archons, now).await?;

    session.motion = Some(motion.clone());
    session.events.extend(new_events_since(&stack, prior_len).await);
    save_conclave_session(&args.session, &session).await?;

    tracing::info!(motion_id = %motion.motion_id, status = ?motion.status, "debate rounds complete");
    Ok(EXIT_GREEN)
}
