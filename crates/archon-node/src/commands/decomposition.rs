// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::cli::StageArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::{resolve_checkpoints, resolve_completion, resolve_input};
use archon_config::RetryPolicy;
use archon_types::AgentId;
use executive_pipeline::{
    render_decomposition_markdown, write_artifact, CheckpointStore, DecompositionOrchestrator, Earl, EarlRoutingEntry,
    Tactic, TacticPolicy,
};
use serde::Deserialize;

const STAGE: &str = "decomposition";

#[derive(Deserialize)]
struct DecompositionSession {
    tactics: Vec<Tactic>,
    earls: Vec<Earl>,
    domain: String,
    mandate_id: uuid::Uuid,
    rfp_id: String,
    proposal_id: String,
    #[serde(default)]
    routing: Vec<EarlRoutingEntry>,
    default_earl: AgentId,
    #[serde(default = "default_explosion_cap")]
    explosion_cap: usize,
}

fn default_explosion_cap() -> usize {
    50
}

pub async fn run(args: StageArgs) -> anyhow::Result<i32> {
    let input_path = resolve_input(args.input, &args.session_dir)?;
    let session: DecompositionSession = serde_json::from_slice(&std::fs::read(&input_path)?)?;

    let tactics: Vec<Tactic> = match &args.unit_id {
        Some(unit_id) => session.tactics.into_iter().filter(|t| t.id.to_string() == *unit_id).collect(),
        None => session.tactics,
    };

    let checkpoints = resolve_checkpoints(args.checkpoint_dir, args.no_checkpoint || args.dry_run);
    if args.clear_checkpoints {
        checkpoints.clear(STAGE).await;
    }

    let completion = resolve_completion(args.mode)?;
    let retry = RetryPolicy::for_stage(&archon_config::ProcessEnv, STAGE)?;
    let orchestrator = DecompositionOrchestrator::new(
        completion,
        checkpoints,
        retry,
        session.routing,
        session.default_earl,
        session.explosion_cap,
    );
    let decompositions = orchestrator
        .run(&tactics, &session.earls, &session.domain, session.mandate_id, &session.rfp_id, &session.proposal_id)
        .await?;

    if !args.dry_run {
        let base = args.out_dir.join(STAGE).join(&session.proposal_id);
        let markdown = render_decomposition_markdown(&decompositions);
        write_artifact(&base, &decompositions, Some(markdown)).await?;
    }

    let green = decompositions.iter().all(|d| d.policy == TacticPolicy::Accepted);
    tracing::info!(tactics = decompositions.len(), green, "decomposition stage complete");
    Ok(if green { EXIT_GREEN } else { EXIT_BLOCKED })
}
