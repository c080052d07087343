// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! §4.6 step 1: opens a Conclave session file for a new motion. Subsequent
//! `debate`/`vote`/`adjourn` invocations read and extend the same file.

use crate::cli::ProposeArgs;
use crate::commands::EXIT_GREEN;
use crate::wiring::{build_event_log_stack_with_agents, new_events_since, save_conclave_session, ConclaveSession};
use archon_types::AgentId;
use deliberation::{DeliberationConfig, DeliberationEngine};
use std::sync::Arc;

pub async fn run(args: ProposeArgs) -> anyhow::Result<i32> {
    let proposer: AgentId = args.proposer.clone().try_into()?;
    let archons: Vec<AgentId> = args
        .archons
        .iter()
        .map(|raw| AgentId::try_from(raw.clone()))
        .collect::<Result<_, _>>()?;

    let now = chrono::Utc::now();
    let mut extra_agents = archons.clone();
    extra_agents.push(proposer.clone());
    let stack = build_event_log_stack_with_agents(5, now, &extra_agents).await;

    let engine = DeliberationEngine::new(
        stack.writer.clone(),
        Arc::new(crate::simulation::SimulationCompletion),
        Arc::new(crate::wiring::NoopDispatch),
        Arc::new(vote_validator::ReconciliationGate::new(stack.writer.clone())),
        DeliberationConfig::default(),
    );

    let motion = engine
        .propose(args.title, args.text, args.motion_type.into(), proposer, now)
        .await?;

    let session = ConclaveSession {
        archons,
        motion: Some(motion.clone()),
        events: new_events_since(&stack, 0).await,
    };
    save_conclave_session(&args.session, &session).await?;

    tracing::info!(motion_id = %motion.motion_id, session = %args.session.display(), "motion proposed, Conclave session opened");
    Ok(EXIT_GREEN)
}
