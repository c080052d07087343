// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! §4.6 step 4: reconciles and ratifies or fails a motion. The
//! reconciliation gate built here starts empty — `vote` already drove every
//! cast vote to validated or dead-lettered synchronously before it
//! returned, so `await_all_validations` is vacuously satisfied and the
//! registrar's independent tally, walked fresh from the witnessed event
//! log, is the only thing this command actually depends on.

use crate::cli::ConclaveArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::{
    build_event_log_stack_with_agents, load_conclave_session, new_events_since, save_conclave_session,
    seed_event_log_stack,
};
use deliberation::{DeliberationConfig, DeliberationEngine, Registrar, RegistrarOutcome};
use std::sync::Arc;
use vote_validator::ReconciliationGate;

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

    let reconciliation = Arc::new(ReconciliationGate::new(stack.writer.clone()));
    let engine = DeliberationEngine::new(
        stack.writer.clone(),
        Arc::new(crate::simulation::SimulationCompletion),
        Arc::new(crate::wiring::NoopDispatch),
        reconciliation,
        DeliberationConfig::default(),
    );
    engine.adjourn(&motion).await?;

    let registrar = Registrar::new(stack.store.clone(), stack.writer.clone());
    let outcome = registrar.ratify_or_fail(&mut motion, now).await?;

    session.motion = Some(motion.clone());
    session.events.extend(new_events_since(&stack, prior_len).await);
    save_conclave_session(&args.session, &session).await?;

    match outcome {
        RegistrarOutcome::Ratified(mandate) => {
            tracing::info!(motion_id = %motion.motion_id, mandate_id = %mandate.mandate_id, "motion ratified");
            Ok(EXIT_GREEN)
        }
        RegistrarOutcome::Failed(tally) => {
            tracing::warn!(motion_id = %motion.motion_id, ?tally, "motion failed");
            Ok(EXIT_BLOCKED)
        }
    }
}
