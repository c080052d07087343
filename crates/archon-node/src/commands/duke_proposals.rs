// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::cli::StageArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::{resolve_checkpoints, resolve_completion, resolve_input};
use archon_config::RetryPolicy;
use executive_pipeline::{
    render_duke_proposal_markdown, write_artifact, CheckpointStore, Duke, DukeProposalOrchestrator, ImplementationDossier,
};
use serde::Deserialize;

const STAGE: &str = "duke_proposal";

#[derive(Deserialize)]
struct DukeProposalSession {
    dossier: ImplementationDossier,
    dukes: Vec<Duke>,
}

pub async fn run(args: StageArgs) -> anyhow::Result<i32> {
    let input_path = resolve_input(args.input, &args.session_dir)?;
    let session: DukeProposalSession = serde_json::from_slice(&std::fs::read(&input_path)?)?;

    let dukes: Vec<Duke> = match &args.unit_id {
        Some(unit_id) => session.dukes.into_iter().filter(|d| d.id.to_string() == *unit_id).collect(),
        None => session.dukes,
    };

    let checkpoints = resolve_checkpoints(args.checkpoint_dir, args.no_checkpoint || args.dry_run);
    if args.clear_checkpoints {
        checkpoints.clear(STAGE).await;
    }

    let completion = resolve_completion(args.mode)?;
    let retry = RetryPolicy::for_stage(&archon_config::ProcessEnv, STAGE)?;
    let orchestrator = DukeProposalOrchestrator::new(completion, checkpoints, retry);

    let mut blocked = false;
    for duke in &dukes {
        match orchestrator.run(duke, &session.dossier).await {
            Ok(proposal) => {
                if !args.dry_run {
                    let base = args.out_dir.join(STAGE).join(duke.id.to_string());
                    let markdown = render_duke_proposal_markdown(&proposal);
                    write_artifact(&base, &proposal, Some(markdown)).await?;
                }
            }
            Err(error) => {
                tracing::error!(duke = %duke.id, %error, "duke proposal rejected");
                blocked = true;
            }
        }
    }

    tracing::info!(dukes = dukes.len(), blocked, "duke proposal stage complete");
    Ok(if blocked { EXIT_BLOCKED } else { EXIT_GREEN })
}
