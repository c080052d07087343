use crate::checkpoint::CheckpointStore;
use crate::counters::CounterAllocator;
use crate::rfp::{Deliverable, ImplementationDossier};
use crate::sections::extract_labeled_lines;
use archon_config::RetryPolicy;
use archon_types::{has_cross_branch_assignment, AgentId, CounterId, TextCompletionPort};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tactic {
    pub id: CounterId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Risk {
    pub id: CounterId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceRequest {
    pub id: CounterId,
    pub text: String,
}

/// A Duke's self-declared tactic coverage for one requirement (§4.8 Phase 3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoverageEntry {
    pub requirement_id: String,
    pub tactic_id: String,
    pub confidence: f64,
}

/// A steward overseeing one domain, authoring one proposal per mandate.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Duke {
    pub id: AgentId,
    /// Short abbreviation used as the counter-id namespace, e.g. `"GUSI"`.
    pub abbr: String,
    pub domain: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DukeProposal {
    pub duke_id: AgentId,
    pub domain: String,
    pub overview: String,
    pub tactics: Vec<Tactic>,
    pub risks: Vec<Risk>,
    pub resource_requests: Vec<ResourceRequest>,
    pub coverage: Vec<CoverageEntry>,
    pub deliverable_plan: String,
    pub capacity_commitment: String,
    pub assumptions: Vec<String>,
    pub acknowledged_constraints: Vec<String>,
    pub executive_summary: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DukeProposalError {
    #[error("proposal from duke {0} assigns work to a constitutional branch by name")]
    CrossBranchAssignment(AgentId),
}

/// Consolidation is rejected (the pre-consolidation text is kept instead) if
/// it collapses below half the original length or drops a `T-` tactic
/// marker the original referenced (§4.8 Phase 4 sanity check).
fn consolidation_is_sane(original: &str, consolidated: &str) -> bool {
    if consolidated.len() < original.len() / 2 {
        return false;
    }
    let original_has_marker = original.contains("T-");
    let consolidated_has_marker = consolidated.contains("T-");
    !(original_has_marker && !consolidated_has_marker)
}

const STAGE: &str = "duke_proposal";

/// Stage 2 orchestrator (§4.8): five phases per Duke, phase 5 running before
/// phase 4 as specified, with counters carried across every deliverable in
/// Phase 2 and a cross-branch-assignment lint gating the finished proposal.
pub struct DukeProposalOrchestrator {
    completion: Arc<dyn TextCompletionPort>,
    checkpoints: Arc<dyn CheckpointStore>,
    retry: RetryPolicy,
}

impl DukeProposalOrchestrator {
    pub fn new(completion: Arc<dyn TextCompletionPort>, checkpoints: Arc<dyn CheckpointStore>, retry: RetryPolicy) -> Self {
        Self { completion, checkpoints, retry }
    }

    /// One phase call for one Duke, checkpointed so a resume only re-runs
    /// the phases that never landed, retried with backoff on provider error
    /// like every other agent-role call in the pipeline.
    async fn checkpointed_complete(&self, unit: &str, prompt: &str) -> Result<String, archon_types::CompletionError> {
        if let Some(value) = self.checkpoints.load(STAGE, unit).await {
            if let Ok(text) = serde_json::from_value::<String>(value) {
                return Ok(text);
            }
        }

        let mut last_error = None;
        for attempt in 0..self.retry.max_attempts {
            match self.completion.complete(prompt).await {
                Ok(text) => {
                    self.checkpoints.save(STAGE, unit, serde_json::to_value(&text).expect("string always serializes")).await;
                    return Ok(text);
                }
                Err(error) => {
                    tracing::warn!(unit, attempt, %error, "duke proposal phase provider error");
                    last_error = Some(error);
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }
        Err(last_error.expect("loop runs at least once"))
    }

    pub async fn run(
        &self,
        duke: &Duke,
        dossier: &ImplementationDossier,
    ) -> Result<DukeProposal, DukeProposalError> {
        let allocator = CounterAllocator::new();

        // Phase 1: foundation.
        let phase1_prompt = format!(
            "Duke of {}: state your overview, the issues you see, and your governing philosophy for this mandate.",
            duke.domain
        );
        let phase1 = self
            .checkpointed_complete(&format!("{}-phase1", duke.id), &phase1_prompt)
            .await
            .unwrap_or_default();

        // Phase 2: per deliverable, counters carry across deliverables.
        let mut tactics = Vec::new();
        let mut risks = Vec::new();
        let mut resource_requests = Vec::new();
        let mut phase2_combined = String::new();
        for deliverable in &dossier.deliverables {
            let unit = format!("{}-phase2-{}", duke.id, deliverable.id);
            let prompt = format!(
                "Duke of {}, deliverable {} (\"{}\"): propose tactics (T: ...), risks (R: ...), and \
                 resource requests (RR: ...) to realize this deliverable.",
                duke.domain, deliverable.id, deliverable.text
            );
            let text = self.checkpointed_complete(&unit, &prompt).await.unwrap_or_default();
            phase2_combined.push_str(&text);
            phase2_combined.push('\n');

            for t in extract_labeled_lines(&text, "T") {
                tactics.push(Tactic { id: allocator.next("T", &duke.abbr), text: t });
            }
            for r in extract_labeled_lines(&text, "R") {
                risks.push(Risk { id: allocator.next("R", &duke.abbr), text: r });
            }
            for rr in extract_labeled_lines(&text, "RR") {
                resource_requests.push(ResourceRequest { id: allocator.next("RR", &duke.abbr), text: rr });
            }
        }

        // Phase 3: cross-cutting.
        let phase3_prompt = format!(
            "Duke of {}: map every requirement to the tactics above (COVERAGE: <requirement> -> <tactic> \
             (<confidence 0-1>)), state your deliverable plan (PLAN: ...), capacity commitment \
             (CAPACITY: ...), assumptions (ASSUMPTION: ...), and acknowledged constraints (CONSTRAINT: ...).",
            duke.domain
        );
        let phase3 = self.checkpointed_complete(&format!("{}-phase3", duke.id), &phase3_prompt).await.unwrap_or_default();
        let coverage = extract_labeled_lines(&phase3, "COVERAGE")
            .into_iter()
            .filter_map(|line| parse_coverage_line(&line))
            .collect();
        let deliverable_plan = extract_labeled_lines(&phase3, "PLAN").join("; ");
        let capacity_commitment = extract_labeled_lines(&phase3, "CAPACITY").join("; ");
        let assumptions = extract_labeled_lines(&phase3, "ASSUMPTION");
        let acknowledged_constraints = extract_labeled_lines(&phase3, "CONSTRAINT");

        // Phase 5 (exec summary) runs before phase 4, per §4.8.
        let phase5_prompt = format!("Duke of {}: give a one-paragraph executive summary of your proposal.", duke.domain);
        let executive_summary = self.checkpointed_complete(&format!("{}-phase5", duke.id), &phase5_prompt).await.unwrap_or_default();

        // Phase 4: editorial consolidation by a Secretary-Text agent, sanity-checked.
        let original = format!("{phase1}\n{phase2_combined}\n{phase3}\n{executive_summary}");
        let consolidation_prompt = format!("Secretary-Text: consolidate the following proposal into a tighter editorial pass:\n{original}");
        let consolidated = self
            .checkpointed_complete(&format!("{}-phase4", duke.id), &consolidation_prompt)
            .await
            .unwrap_or_default();
        let overview = if consolidation_is_sane(&original, &consolidated) { consolidated } else { original };

        let proposal = DukeProposal {
            duke_id: duke.id.clone(),
            domain: duke.domain.clone(),
            overview,
            tactics,
            risks,
            resource_requests,
            coverage,
            deliverable_plan,
            capacity_commitment,
            assumptions,
            acknowledged_constraints,
            executive_summary,
        };

        if has_any_cross_branch_assignment(&proposal) {
            return Err(DukeProposalError::CrossBranchAssignment(duke.id.clone()));
        }
        Ok(proposal)
    }
}

fn parse_coverage_line(line: &str) -> Option<CoverageEntry> {
    let (req_to_tactic, confidence_part) = line.rsplit_once('(')?;
    let confidence: f64 = confidence_part.trim_end_matches(')').trim().parse().ok()?;
    let (requirement_id, tactic_id) = req_to_tactic.split_once("->")?;
    Some(CoverageEntry {
        requirement_id: requirement_id.trim().to_string(),
        tactic_id: tactic_id.trim().to_string(),
        confidence,
    })
}

fn has_any_cross_branch_assignment(proposal: &DukeProposal) -> bool {
    has_cross_branch_assignment(&proposal.overview)
        || has_cross_branch_assignment(&proposal.executive_summary)
        || proposal.tactics.iter().any(|t| has_cross_branch_assignment(&t.text))
        || proposal.risks.iter().any(|r| has_cross_branch_assignment(&r.text))
        || proposal.resource_requests.iter().any(|rr| has_cross_branch_assignment(&rr.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::rfp::DossierStatus;
    use archon_types::CompletionError;
    use async_trait::async_trait;
    use std::time::Duration;

    fn dossier() -> ImplementationDossier {
        ImplementationDossier {
            mandate_id: uuid::Uuid::new_v4(),
            status: DossierStatus::Final,
            functional_requirements: vec![],
            non_functional_requirements: vec![],
            constraints: vec![],
            deliverables: vec![Deliverable { id: CounterId::new("D", "GLOBAL", 1), text: "ingestion worker".into() }],
            evaluation_criteria: vec![],
            open_questions: vec![],
        }
    }

    fn retry() -> RetryPolicy {
        RetryPolicy { base: Duration::from_millis(1), max: Duration::from_millis(5), max_attempts: 3 }
    }

    struct ScriptedCompletion;

    #[async_trait]
    impl TextCompletionPort for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            if prompt.contains("propose tactics") {
                Ok("T: stand up the worker\nR: vendor rate limits\nRR: two engineers\n".into())
            } else if prompt.contains("map every requirement") {
                Ok("COVERAGE: FR-INFRA-001 -> T-GUSI-001 (0.9)\nPLAN: roll out in two phases\nCAPACITY: 80 hours\nASSUMPTION: vendor API is stable\nCONSTRAINT: budget capped\n".into())
            } else if prompt.contains("consolidate") {
                Ok("Consolidated overview retaining T-GUSI-001 and the rest of the proposal content in a tighter form that still exceeds half the length of the original combined sections easily.".into())
            } else {
                Ok(format!("Reply to: {prompt}"))
            }
        }
    }

    struct FlakyThenClean {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TextCompletionPort for FlakyThenClean {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Err(CompletionError::Provider("rate limited".into()))
            } else if prompt.contains("propose tactics") {
                Ok("T: stand up the worker\nR: vendor rate limits\nRR: two engineers\n".into())
            } else if prompt.contains("map every requirement") {
                Ok("COVERAGE: FR-INFRA-001 -> T-GUSI-001 (0.9)\nPLAN: roll out in two phases\nCAPACITY: 80 hours\nASSUMPTION: vendor API is stable\nCONSTRAINT: budget capped\n".into())
            } else if prompt.contains("consolidate") {
                Ok("Consolidated overview retaining T-GUSI-001 and the rest of the proposal content in a tighter form that still exceeds half the length of the original combined sections easily.".into())
            } else {
                Ok(format!("Reply to: {prompt}"))
            }
        }
    }

    struct CrossBranchCompletion;

    #[async_trait]
    impl TextCompletionPort for CrossBranchCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok("T: this must be performed by the Judicial branch\n".into())
        }
    }

    #[tokio::test]
    async fn proposal_assembles_tactics_risks_and_coverage() {
        let orchestrator = DukeProposalOrchestrator::new(Arc::new(ScriptedCompletion), Arc::new(InMemoryCheckpointStore::new()), retry());
        let duke = Duke { id: AgentId::system("duke-infra"), abbr: "GUSI".into(), domain: "infrastructure".into() };
        let proposal = orchestrator.run(&duke, &dossier()).await.unwrap();

        assert_eq!(proposal.tactics.len(), 1);
        assert_eq!(proposal.tactics[0].id, CounterId::new("T", "GUSI", 1));
        assert_eq!(proposal.coverage.len(), 1);
        assert_eq!(proposal.coverage[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn a_provider_error_retries_and_then_succeeds() {
        let orchestrator = DukeProposalOrchestrator::new(
            Arc::new(FlakyThenClean { calls: std::sync::atomic::AtomicUsize::new(0) }),
            Arc::new(InMemoryCheckpointStore::new()),
            retry(),
        );
        let duke = Duke { id: AgentId::system("duke-infra"), abbr: "GUSI".into(), domain: "infrastructure".into() };
        let proposal = orchestrator.run(&duke, &dossier()).await.unwrap();
        assert_eq!(proposal.tactics.len(), 1);
    }

    #[tokio::test]
    async fn cross_branch_assignment_rejects_the_proposal() {
        let orchestrator = DukeProposalOrchestrator::new(Arc::new(CrossBranchCompletion), Arc::new(InMemoryCheckpointStore::new()), retry());
        let duke = Duke { id: AgentId::system("duke-infra"), abbr: "GUSI".into(), domain: "infrastructure".into() };
        let result = orchestrator.run(&duke, &dossier()).await;
        assert!(matches!(result, Err(DukeProposalError::CrossBranchAssignment(_))));
    }

    #[test]
    fn consolidation_shorter_than_half_is_rejected() {
        assert!(!consolidation_is_sane("a very long original proposal with lots of content here", "short"));
    }

    #[test]
    fn consolidation_dropping_a_tactic_marker_is_rejected() {
        let original = "the plan covers T-GUSI-001 in detail across many words of explanation and context";
        let consolidated = "the plan covers the tactic in detail across many words of explanation and x";
        assert!(!consolidation_is_sane(original, consolidated));
    }
}
