// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::cli::StageArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::{resolve_checkpoints, resolve_completion, resolve_input};
use archon_config::RetryPolicy;
use executive_pipeline::{
    render_selection_markdown, write_artifact, CheckpointStore, Decision, DukeProposal, President, SelectionOrchestrator,
};
use serde::Deserialize;

const STAGE: &str = "selection";

#[derive(Deserialize)]
struct SelectionSession {
    proposals: Vec<DukeProposal>,
    presidents: Vec<President>,
    #[serde(default = "default_panel_size")]
    panel_size: usize,
    #[serde(default = "default_max_rounds")]
    max_rounds: u32,
    #[serde(default)]
    round: u32,
}

fn default_panel_size() -> usize {
    5
}

fn default_max_rounds() -> u32 {
    3
}

pub async fn run(args: StageArgs) -> anyhow::Result<i32> {
    let input_path = resolve_input(args.input, &args.session_dir)?;
    let session: SelectionSession = serde_json::from_slice(&std::fs::read(&input_path)?)?;

    let proposals: Vec<DukeProposal> = match &args.unit_id {
        Some(unit_id) => session.proposals.into_iter().filter(|p| p.duke_id.to_string() == *unit_id).collect(),
        None => session.proposals,
    };

    let checkpoints = resolve_checkpoints(args.checkpoint_dir, args.no_checkpoint || args.dry_run);
    if args.clear_checkpoints {
        checkpoints.clear(STAGE).await;
    }

    let completion = resolve_completion(args.mode)?;
    let retry = RetryPolicy::for_stage(&archon_config::ProcessEnv, STAGE)?;
    let orchestrator = SelectionOrchestrator::new(completion, checkpoints, retry, session.panel_size, session.max_rounds);
    let result = orchestrator.run(&proposals, &session.presidents, session.round).await?;

    if !args.dry_run {
        let base = args.out_dir.join(STAGE).join(format!("round-{}", session.round));
        let markdown = render_selection_markdown(&result);
        write_artifact(&base, &result, Some(markdown)).await?;
    }

    let green = matches!(result.decision, Decision::WinnerSelected { .. });
    tracing::info!(decision = ?result.decision, "selection stage complete");
    Ok(if green { EXIT_GREEN } else { EXIT_BLOCKED })
}
