// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wraps `EmergenceAuditor::scan_quarter` (§4.13). `--artifacts-dir` is read
//! as one `Artifact` per file: the file name is the artifact id, the file
//! contents are the scanned text, and `published_at` is the scan time (this
//! harness has no publication-time metadata store to read from instead).

use crate::cli::EmergenceAuditArgs;
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::build_event_log_stack;
use archon_types::AgentId;
use governance_audit::{Artifact, BreachRegistry, EmergenceAuditor};
use std::sync::Arc;

pub async fn run(args: EmergenceAuditArgs) -> anyhow::Result<i32> {
    let now = chrono::Utc::now();
    let stack = build_event_log_stack(5, now).await;
    let breach_registry = Arc::new(BreachRegistry::new(stack.store.clone(), stack.writer.clone()));
    let auditor = EmergenceAuditor::new(stack.store.clone(), stack.writer.clone(), breach_registry);

    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(&args.artifacts_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(entry.path())?;
        artifacts.push(Artifact {
            artifact_id: entry.file_name().to_string_lossy().into_owned(),
            author: AgentId::system("archon-node"),
            text,
            published_at: now,
        });
    }

    let violations = auditor.scan_quarter(&artifacts, now).await?;
    for violation in &violations {
        tracing::warn!(artifact_id = %violation.artifact_id, category = %violation.category, "emergence-language violation");
    }

    tracing::info!(scanned = artifacts.len(), violations = violations.len(), "emergence audit complete");
    Ok(if violations.is_empty() { EXIT_GREEN } else { EXIT_BLOCKED })
}
