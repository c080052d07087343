// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::cli::StageArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::{resolve_checkpoints, resolve_completion, resolve_input};
use archon_config::RetryPolicy;
use executive_pipeline::{render_dossier_markdown, write_artifact, CheckpointStore, DossierStatus, President, RfpOrchestrator};
use serde::Deserialize;
use std::sync::Arc;

const STAGE: &str = "rfp";

#[derive(Deserialize)]
struct RfpSession {
    mandate: archon_types::Mandate,
    presidents: Vec<President>,
}

pub async fn run(args: StageArgs) -> anyhow::Result<i32> {
    let input_path = resolve_input(args.input, &args.session_dir)?;
    let session: RfpSession = serde_json::from_slice(&std::fs::read(&input_path)?)?;

    let presidents: Vec<President> = match &args.unit_id {
        Some(unit_id) => session.presidents.into_iter().filter(|p| p.id.to_string() == *unit_id).collect(),
        None => session.presidents,
    };

    let checkpoints = resolve_checkpoints(args.checkpoint_dir, args.no_checkpoint || args.dry_run);
    if args.clear_checkpoints {
        checkpoints.clear(STAGE).await;
    }

    let completion = resolve_completion(args.mode)?;
    let retry = RetryPolicy::for_stage(&archon_config::ProcessEnv, STAGE)?;
    let orchestrator = RfpOrchestrator::new(completion, checkpoints, retry);
    let dossier = orchestrator.run(&session.mandate, &presidents, chrono::Utc::now()).await?;

    if !args.dry_run {
        let base = args.out_dir.join(STAGE).join(session.mandate.mandate_id.to_string());
        let markdown = render_dossier_markdown(&dossier);
        write_artifact(&base, &dossier, Some(markdown)).await?;
    }

    tracing::info!(status = ?dossier.status, open_questions = dossier.open_questions.len(), "rfp stage complete");
    Ok(if dossier.status == DossierStatus::Final { EXIT_GREEN } else { EXIT_BLOCKED })
}
