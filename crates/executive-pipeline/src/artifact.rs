// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Artifact writing (§6.1): every stage output is persisted as canonical
//! JSON (the bit-stable primary record any downstream stage reads back) with
//! an optional Markdown sibling for human review, sharing a base path and
//! differing only by extension. Markdown rendering is lossy and never read
//! back by this codebase; only the `.json` file is a checkpoint-equivalent
//! source of truth.

use crate::decomposition::TacticDecomposition;
use crate::duke_proposal::DukeProposal;
use crate::rfp::ImplementationDossier;
use crate::selection::{Decision, SelectionResult};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to canonicalize artifact payload: {0}")]
    Canonical(#[from] archon_types::CanonicalJsonError),
    #[error("failed to write artifact file: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes `value` as canonical JSON to `<base>.json`, and `markdown` (when
/// given) to `<base>.md`. `base` carries no extension; callers name stage
/// artifacts by session and unit, e.g. `out/rfp/2026-07-27T00-00-00Z`.
pub async fn write_artifact<T: serde::Serialize>(
    base: &Path,
    value: &T,
    markdown: Option<String>,
) -> Result<(), ArtifactError> {
    if let Some(parent) = base.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = archon_types::canonical_json::to_canonical_bytes(value)?;
    tokio::fs::write(base.with_extension("json"), bytes).await?;
    if let Some(markdown) = markdown {
        tokio::fs::write(base.with_extension("md"), markdown).await?;
    }
    Ok(())
}

fn heading(level: usize, text: &str) -> String {
    format!("{} {}\n\n", "#".repeat(level), text)
}

/// `## Functional Requirements`, `## Non-Functional Requirements`, etc.,
/// each requirement rendered as `- FR-HEALTH-001: ...` (§6.1's "contractual
/// section headers" applied to Stage 1's dossier shape).
pub fn render_dossier_markdown(dossier: &ImplementationDossier) -> String {
    let mut out = String::new();
    out.push_str(&heading(1, &format!("Implementation Dossier: {}", dossier.mandate_id)));
    out.push_str(&format!("Status: **{:?}**\n\n", dossier.status));

    out.push_str(&heading(2, "Functional Requirements"));
    for fr in &dossier.functional_requirements {
        out.push_str(&format!("- {}: {}\n", fr.id, fr.text));
    }
    out.push('\n');

    out.push_str(&heading(2, "Non-Functional Requirements"));
    for nfr in &dossier.non_functional_requirements {
        out.push_str(&format!("- {}: {}\n", nfr.id, nfr.text));
    }
    out.push('\n');

    out.push_str(&heading(2, "Constraints"));
    for c in &dossier.constraints {
        out.push_str(&format!("- {}: {}\n", c.id, c.text));
    }
    out.push('\n');

    out.push_str(&heading(2, "Deliverables"));
    for d in &dossier.deliverables {
        out.push_str(&format!("- {}: {}\n", d.id, d.text));
    }
    out.push('\n');

    out.push_str(&heading(2, "Evaluation Criteria"));
    for ec in &dossier.evaluation_criteria {
        out.push_str(&format!("- {}\n", ec.text));
    }
    out.push('\n');

    if !dossier.open_questions.is_empty() {
        out.push_str(&heading(2, "Open Questions"));
        for q in &dossier.open_questions {
            out.push_str(&format!("- {q}\n"));
        }
        out.push('\n');
    }
    out
}

/// `## Tactics` with `### T-{ABBR}-NNN: ...` per-tactic subheadings (§6.1's
/// example headers), followed by Risks, Resource Requests, and Coverage.
pub fn render_duke_proposal_markdown(proposal: &DukeProposal) -> String {
    let mut out = String::new();
    out.push_str(&heading(1, &format!("Duke Proposal: {}", proposal.domain)));
    out.push_str(&proposal.executive_summary);
    out.push_str("\n\n");
    out.push_str(&proposal.overview);
    out.push_str("\n\n");

    out.push_str(&heading(2, "Tactics"));
    for tactic in &proposal.tactics {
        out.push_str(&heading(3, &format!("{}: {}", tactic.id, tactic.text)));
    }

    out.push_str(&heading(2, "Risks"));
    for risk in &proposal.risks {
        out.push_str(&format!("- {}: {}\n", risk.id, risk.text));
    }
    out.push('\n');

    out.push_str(&heading(2, "Resource Requests"));
    for request in &proposal.resource_requests {
        out.push_str(&format!("- {}: {}\n", request.id, request.text));
    }
    out.push('\n');

    out.push_str(&heading(2, "Coverage"));
    for entry in &proposal.coverage {
        out.push_str(&format!(
            "- {} covered by {} (confidence {:.2})\n",
            entry.requirement_id, entry.tactic_id, entry.confidence
        ));
    }
    out.push('\n');

    out.push_str(&heading(2, "Deliverable Plan"));
    out.push_str(&proposal.deliverable_plan);
    out.push_str("\n\n");

    out.push_str(&heading(2, "Capacity Commitment"));
    out.push_str(&proposal.capacity_commitment);
    out.push('\n');
    out
}

/// `## Aggregated Scores`, `## Panel Votes`, `## Decision` (§6.1).
pub fn render_selection_markdown(result: &SelectionResult) -> String {
    let mut out = String::new();
    out.push_str(&heading(1, "Selection Result"));

    out.push_str(&heading(2, "Aggregated Scores"));
    for proposal in &result.aggregated {
        out.push_str(&format!("- {} — mean {:.2}, tier {:?}\n", proposal.duke_id, proposal.mean, proposal.tier));
    }
    out.push('\n');

    out.push_str(&heading(2, "Panel Votes"));
    for vote in &result.panel_votes {
        out.push_str(&format!("- {} -> {} ({:.2})\n", vote.president_id, vote.duke_id, vote.score));
    }
    out.push('\n');

    out.push_str(&heading(2, "Decision"));
    match &result.decision {
        Decision::WinnerSelected { duke_id, panel_mean } => {
            out.push_str(&format!("**Winner selected:** {duke_id} (panel mean {panel_mean:.2})\n"));
        }
        Decision::NoViableProposal => out.push_str("**No viable proposal.**\n"),
        Decision::RevisionNeeded { handbacks } => {
            out.push_str("**Revision needed.**\n\n");
            for (duke_id, note) in handbacks {
                out.push_str(&format!("- {duke_id}: {note}\n"));
            }
        }
        Decision::EscalateToConclave => out.push_str("**Escalated to the Conclave.**\n"),
    }
    out
}

/// `## Tactic {id}` per tactic decomposition, `### Drafts` with one
/// `TASK: ...` line rendering per draft (§6.1).
pub fn render_decomposition_markdown(decompositions: &[TacticDecomposition]) -> String {
    let mut out = String::new();
    out.push_str(&heading(1, "Tactic Decomposition"));
    for decomposition in decompositions {
        out.push_str(&heading(2, &format!("Tactic {} ({:?})", decomposition.tactic_id, decomposition.policy)));
        out.push_str(&format!("Facilitator: {}\n\n", decomposition.facilitator_earl));

        out.push_str(&heading(3, "Drafts"));
        for draft in &decomposition.drafts {
            out.push_str(&format!(
                "- **{}** — {} (effort {:.1}h, deliverable {})\n",
                draft.task_ref,
                draft.description,
                draft.effort_hours,
                draft.deliverable_id.as_deref().unwrap_or("-"),
            ));
        }
        out.push('\n');

        if !decomposition.weak_provenance.is_empty() {
            out.push_str(&heading(3, "Weak Provenance"));
            for task_ref in &decomposition.weak_provenance {
                out.push_str(&format!("- {task_ref}\n"));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::TacticPolicy;
    use crate::duke_proposal::{CoverageEntry, ResourceRequest, Risk, Tactic};
    use crate::rfp::{Constraint, Deliverable, DossierStatus, EvaluationCriterion, FunctionalRequirement, NonFunctionalRequirement};
    use archon_types::{AgentId, CounterId};

    #[test]
    fn dossier_markdown_contains_requirement_headings() {
        let dossier = ImplementationDossier {
            mandate_id: uuid::Uuid::new_v4(),
            status: DossierStatus::Final,
            functional_requirements: vec![FunctionalRequirement {
                id: CounterId::new("FR", "HEALTH", 1),
                portfolio: "HEALTH".into(),
                text: "ingest events".into(),
            }],
            non_functional_requirements: vec![NonFunctionalRequirement {
                id: CounterId::new("NFR", "HEALTH", 1),
                portfolio: "HEALTH".into(),
                text: "p99 under 200ms".into(),
            }],
            constraints: vec![Constraint { id: CounterId::new("C", "GLOBAL", 1), text: "budget capped".into() }],
            deliverables: vec![Deliverable { id: CounterId::new("D", "GLOBAL", 1), text: "worker deployed".into() }],
            evaluation_criteria: vec![EvaluationCriterion { text: "smoke test green".into() }],
            open_questions: vec![],
        };
        let markdown = render_dossier_markdown(&dossier);
        assert!(markdown.contains("## Functional Requirements"));
        assert!(markdown.contains("FR-HEALTH-001: ingest events"));
        assert!(!markdown.contains("## Open Questions"));
    }

    #[test]
    fn duke_proposal_markdown_gives_each_tactic_its_own_subheading() {
        let proposal = DukeProposal {
            duke_id: AgentId::system("duke-infra"),
            domain: "infrastructure".into(),
            overview: "overview text".into(),
            tactics: vec![Tactic { id: CounterId::new("T", "GUSI", 1), text: "stand up ingestion".into() }],
            risks: vec![Risk { id: CounterId::new("R", "GUSI", 1), text: "vendor lock-in".into() }],
            resource_requests: vec![ResourceRequest { id: CounterId::new("RR", "GUSI", 1), text: "2 engineers".into() }],
            coverage: vec![CoverageEntry { requirement_id: "FR-HEALTH-001".into(), tactic_id: "T-GUSI-001".into(), confidence: 0.9 }],
            deliverable_plan: "plan text".into(),
            capacity_commitment: "commitment text".into(),
            assumptions: vec![],
            acknowledged_constraints: vec![],
            executive_summary: "summary".into(),
        };
        let markdown = render_duke_proposal_markdown(&proposal);
        assert!(markdown.contains("## Tactics"));
        assert!(markdown.contains("### T-GUSI-001: stand up ingestion"));
        assert!(markdown.contains("## Coverage"));
    }

    #[test]
    fn decomposition_markdown_lists_one_entry_per_draft() {
        let decomposition = TacticDecomposition {
            tactic_id: CounterId::new("T", "GUSI", 1),
            policy: TacticPolicy::Accepted,
            drafts: vec![archon_types::TaskDraft {
                task_ref: CounterId::new("TASK", "GUSI", 1),
                parent_tactic_id: CounterId::new("T", "GUSI", 1),
                rfp_id: "rfp-1".into(),
                mandate_id: uuid::Uuid::new_v4(),
                proposal_id: "duke-infra".into(),
                description: "build ingestion worker".into(),
                requirements: vec!["FR-HEALTH-001".into()],
                expected_outcomes: vec!["events flow end to end".into()],
                capability_tags: vec!["dev_backend".into()],
                effort_hours: 8.0,
                deliverable_id: Some("D-GLOBAL-001".into()),
                dependencies: vec![],
            }],
            weak_provenance: vec![],
            contributing_earls: vec![AgentId::system("earl-infra")],
            facilitator_earl: AgentId::system("earl-infra"),
        };
        let markdown = render_decomposition_markdown(&[decomposition]);
        assert!(markdown.contains("## Tactic T-GUSI-001 (Accepted)"));
        assert!(markdown.contains("TASK-GUSI-001"));
        assert!(markdown.contains("build ingestion worker"));
    }
}
