// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! §4.6 step 3 / §4.7: captures optimistic votes and forces their
//! validation synchronous within this invocation, so a session file never
//! leaves this process with votes still pending reconciliation.

use crate::cli::ConclaveArgs;
use crate::commands::EXIT_GREEN;
use crate::wiring::{
    build_event_log_stack_with_agents, load_conclave_session, new_events_since, resolve_completion,
    save_conclave_session, seed_event_log_stack,
};
use archon_types::AgentId;
use chrono::Duration as ChronoDuration;
use deliberation::{DeliberationConfig, DeliberationEngine};
use std::sync::Arc;
use vote_validator::{BusPublishPort, ConsensusAggregator, PublishError, ReconciliationGate, ValidationDispatcher, ValidatorRoster};

/// Never publishes successfully, so `ValidationDispatcher` trips its
/// breaker on the very first vote and validates every subsequent one
/// synchronously in-process for the rest of this invocation — there is no
/// long-lived bus process in this workspace to hand a vote off to (§1
/// scope), so every vote is reconciled before this command returns.
struct AlwaysSynchronous;

#[async_trait::async_trait]
impl BusPublishPort for AlwaysSynchronous {
    async fn publish(&self, _vote: archon_types::Vote) -> Result<(), PublishError> {
        Err(PublishError::Broker("no standalone validation bus in this process".into()))
    }
}

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
    let roster = ValidatorRoster {
        secretary_text: (AgentId::system("secretary-text"), completion.clone()),
        secretary_json: (AgentId::system("secretary-json"), completion.clone()),
        witness: (AgentId::system("witness-validator"), completion.clone()),
    };

    let reconciliation = Arc::new(ReconciliationGate::new(stack.writer.clone()));
    let aggregator = Arc::new(ConsensusAggregator::new(roster, stack.writer.clone(), reconciliation.clone(), 3));
    let dispatch = Arc::new(ValidationDispatcher::new(
        Arc::new(AlwaysSynchronous),
        aggregator,
        1,
        ChronoDuration::seconds(60),
        ChronoDuration::seconds(30),
    ));

    let engine = DeliberationEngine::new(stack.writer.clone(), completion, dispatch, reconciliation, DeliberationConfig::default());

    let votes = engine.capture_votes(&mut motion, &session.archons, now).await?;

    session.motion = Some(motion.clone());
    session.events.extend(new_events_since(&stack, prior_len).await);
    save_conclave_session(&args.session, &session).await?;

    tracing::info!(motion_id = %motion.motion_id, cast = votes.len(), "votes captured and reconciled");
    Ok(EXIT_GREEN)
}
