use crate::checkpoint::CheckpointStore;
use crate::counters::CounterAllocator;
use crate::duke_proposal::Tactic;
use crate::sections::extract_labeled_lines;
use archon_config::RetryPolicy;
use archon_types::{AgentId, CounterId, TaskDraft, TextCompletionPort};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A steward who independently drafts tasks out of a Tactic. Unlike `Duke`,
/// an Earl carries no counter-id abbreviation of its own — drafted
/// `TaskDraft::task_ref`s are namespaced under the owning Tactic's
/// abbreviation, not the proposing Earl's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earl {
    pub id: AgentId,
    pub domain: String,
}

/// One `domain -> Earl` routing fact (§4.8 Stage 4, §4.9). A smaller,
/// declarative counterpart to `task_activation::EarlRoutingTable`'s runtime
/// lookup: this orchestrator is handed a fixed list for one Duke proposal's
/// domain rather than a shared table serving every activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlRoutingEntry {
    pub domain: String,
    pub earl_id: AgentId,
}

fn route_facilitator(routing: &[EarlRoutingEntry], domain: &str, default_earl: &AgentId) -> AgentId {
    routing
        .iter()
        .find(|entry| entry.domain == domain)
        .map(|entry| entry.earl_id.clone())
        .unwrap_or_else(|| default_earl.clone())
}

/// Tactic-level outcome of synthesis (§4.8 Stage 4). `Accepted` is the
/// ordinary case; the other three name the review path a Keeper or Duke must
/// walk the Tactic through before tasks under it can activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TacticPolicy {
    Accepted,
    Ambiguous,
    ReviewRequired,
    OverlapReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TacticDecomposition {
    pub tactic_id: CounterId,
    pub policy: TacticPolicy,
    pub drafts: Vec<TaskDraft>,
    /// `task_ref`s of drafts that passed the hard lint but carry weak
    /// provenance (§4.8 soft lint) — the caller is responsible for emitting
    /// `ProvenanceWeakMapping` per entry, the same way `RfpOrchestrator`
    /// reports missing portfolios without writing the halt-relevant event
    /// itself.
    pub weak_provenance: Vec<CounterId>,
    pub contributing_earls: Vec<AgentId>,
    pub facilitator_earl: AgentId,
}

#[derive(Debug, thiserror::Error)]
pub enum DecompositionError {
    #[error("failed to decode a checkpointed contribution: {0}")]
    Checkpoint(#[from] serde_json::Error),
}

/// One Earl's proposed draft, before a `task_ref` is allocated and before
/// the hard lint has run.
#[derive(Debug, Clone, Default)]
struct RawDraft {
    description: String,
    outcomes: Vec<String>,
    tags: Vec<String>,
    effort_hours: f64,
    deliverable_id: Option<String>,
    requirements: Vec<String>,
}

/// Parses one `TASK: <description> | OUTCOMES: a;b | TAGS: x,y | EFFORT: 8 |
/// DELIVERABLE: D-1 | REQ: FR-1,NFR-2` line (§4.8 Stage 4 free-text
/// convention, extending `rfp`/`selection`'s single-label lines to a
/// multi-field draft since a `TaskDraft` carries more shape than a labeled
/// line alone can hold). Unrecognized or malformed fields are skipped rather
/// than failing the whole draft; the hard lint catches what matters.
fn parse_task_line(line: &str) -> Option<RawDraft> {
    let mut fields = line.split('|');
    let description = fields.next()?.trim().to_string();
    if description.is_empty() {
        return None;
    }
    let mut draft = RawDraft { description, ..Default::default() };
    for field in fields {
        let Some((key, value)) = field.split_once(':') else { continue };
        let value = value.trim();
        match key.trim().to_uppercase().as_str() {
            "OUTCOMES" => {
                draft.outcomes = value.split(';').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
            }
            "TAGS" => draft.tags = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            "EFFORT" => draft.effort_hours = value.parse().unwrap_or(0.0),
            "DELIVERABLE" => {
                draft.deliverable_id = if value.is_empty() || value == "-" { None } else { Some(value.to_string()) }
            }
            "REQ" => {
                draft.requirements = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
            }
            _ => {}
        }
    }
    Some(draft)
}

/// Duplicate-pattern detector for the `OVERLAP_REVIEW` policy: two drafts
/// that share a `deliverable_id` and the same (order-independent) set of
/// expected outcomes are the same task proposed twice.
fn has_duplicate_pattern(drafts: &[TaskDraft]) -> bool {
    let mut seen: HashSet<(Option<String>, Vec<String>)> = HashSet::new();
    for draft in drafts {
        let mut outcomes = draft.expected_outcomes.clone();
        outcomes.sort();
        if !seen.insert((draft.deliverable_id.clone(), outcomes)) {
            return true;
        }
    }
    false
}

const STAGE: &str = "decomposition";

/// Stage 4 orchestrator (§4.8): six Earls independently draft tasks for each
/// winning Tactic, a domain-routed facilitator Earl synthesizes the unified
/// set, and the result is lint-checked and policy-classified. Aggregation
/// and policy classification are pure once the completions are in, the same
/// split `selection` draws between its LLM phases and its pure Phase 4/6.
pub struct DecompositionOrchestrator {
    completion: Arc<dyn TextCompletionPort>,
    checkpoints: Arc<dyn CheckpointStore>,
    retry: RetryPolicy,
    routing: Vec<EarlRoutingEntry>,
    default_earl: AgentId,
    explosion_cap: usize,
}

impl DecompositionOrchestrator {
    pub fn new(
        completion: Arc<dyn TextCompletionPort>,
        checkpoints: Arc<dyn CheckpointStore>,
        retry: RetryPolicy,
        routing: Vec<EarlRoutingEntry>,
        default_earl: AgentId,
        explosion_cap: usize,
    ) -> Self {
        Self { completion, checkpoints, retry, routing, default_earl, explosion_cap }
    }

    /// One Earl's independent pass over one Tactic, checkpointed so a failed
    /// Earl (and only a failed Earl) re-runs on resume.
    async fn earl_propose(&self, tactic: &Tactic, earl: &Earl) -> Vec<RawDraft> {
        let unit = format!("{}-{}", tactic.id, earl.id);
        if let Some(value) = self.checkpoints.load(STAGE, &unit).await {
            if let Ok(lines) = serde_json::from_value::<Vec<String>>(value) {
                return lines.iter().filter_map(|l| parse_task_line(l)).collect();
            }
        }

        let prompt = format!(
            "Earl of {}: for Tactic {} (\"{}\"), propose TaskDrafts, one per line as \
             TASK: <description> | OUTCOMES: <outcome1>;<outcome2> | TAGS: <tag1>,<tag2> | \
             EFFORT: <hours> | DELIVERABLE: <id or -> | REQ: <FR-xxx>,<NFR-xxx>.",
            earl.domain, tactic.id, tactic.text
        );

        for attempt in 0..self.retry.max_attempts {
            match self.completion.complete(&prompt).await {
                Ok(text) => {
                    let lines = extract_labeled_lines(&text, "TASK");
                    if !lines.is_empty() {
                        self.checkpoints
                            .save(STAGE, &unit, serde_json::to_value(&lines).expect("lines always serialize"))
                            .await;
                        return lines.iter().filter_map(|l| parse_task_line(l)).collect();
                    }
                    tracing::warn!(earl = %earl.id, tactic = %tactic.id, attempt, "earl proposed no parseable TaskDrafts");
                }
                Err(error) => {
                    tracing::warn!(earl = %earl.id, tactic = %tactic.id, attempt, %error, "earl proposal provider error");
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }
        Vec::new()
    }

    /// The facilitator Earl's consolidation pass, mirroring the Duke Phase 4
    /// editorial-consolidation call: one more completion over the raw
    /// contributions, checkpointed per Tactic so resume does not re-ask a
    /// facilitator who already synthesized.
    async fn synthesize(&self, tactic: &Tactic, facilitator: &AgentId, raw_by_earl: &[(AgentId, Vec<RawDraft>)]) -> Vec<RawDraft> {
        let unit = format!("{}-synthesis", tactic.id);
        if let Some(value) = self.checkpoints.load(STAGE, &unit).await {
            if let Ok(lines) = serde_json::from_value::<Vec<String>>(value) {
                return lines.iter().filter_map(|l| parse_task_line(l)).collect();
            }
        }

        let summary = raw_by_earl
            .iter()
            .map(|(earl_id, drafts)| {
                let rendered = drafts.iter().map(|d| format!("- {}", d.description)).collect::<Vec<_>>().join("\n");
                format!("Earl {earl_id} proposed:\n{rendered}")
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Facilitator Earl {facilitator}: the following Earls proposed TaskDrafts for Tactic {} \
             (\"{}\"):\n{summary}\nSynthesize the final unified set, merging overlapping drafts, one \
             per line as TASK: <description> | OUTCOMES: <outcome1>;<outcome2> | TAGS: <tag1>,<tag2> | \
             EFFORT: <hours> | DELIVERABLE: <id or -> | REQ: <FR-xxx>,<NFR-xxx>.",
            tactic.id, tactic.text
        );

        let text = match self.completion.complete(&prompt).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(%facilitator, tactic = %tactic.id, %error, "facilitator synthesis provider error");
                return Vec::new();
            }
        };
        let lines = extract_labeled_lines(&text, "TASK");
        if !lines.is_empty() {
            self.checkpoints.save(STAGE, &unit, serde_json::to_value(&lines).expect("lines always serialize")).await;
        }
        lines.iter().filter_map(|l| parse_task_line(l)).collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn decompose_tactic(
        &self,
        tactic: &Tactic,
        earls: &[Earl],
        domain: &str,
        mandate_id: uuid::Uuid,
        rfp_id: &str,
        proposal_id: &str,
        allocator: &CounterAllocator,
    ) -> TacticDecomposition {
        let facilitator = route_facilitator(&self.routing, domain, &self.default_earl);

        let mut raw_by_earl = Vec::new();
        for earl in earls {
            let drafts = self.earl_propose(tactic, earl).await;
            if !drafts.is_empty() {
                raw_by_earl.push((earl.id.clone(), drafts));
            }
        }

        if raw_by_earl.is_empty() {
            tracing::warn!(tactic = %tactic.id, "every Earl failed to propose TaskDrafts");
            return TacticDecomposition {
                tactic_id: tactic.id.clone(),
                policy: TacticPolicy::Ambiguous,
                drafts: Vec::new(),
                weak_provenance: Vec::new(),
                contributing_earls: Vec::new(),
                facilitator_earl: facilitator,
            };
        }

        let synthesized = self.synthesize(tactic, &facilitator, &raw_by_earl).await;
        let abbr = tactic.id.0.split('-').nth(1).unwrap_or("GEN");

        let mut drafts = Vec::new();
        for raw in &synthesized {
            let draft = TaskDraft {
                task_ref: allocator.next("TASK", abbr),
                parent_tactic_id: tactic.id.clone(),
                rfp_id: rfp_id.to_string(),
                mandate_id,
                proposal_id: proposal_id.to_string(),
                description: raw.description.clone(),
                requirements: raw.requirements.clone(),
                expected_outcomes: raw.outcomes.clone(),
                capability_tags: raw.tags.clone(),
                effort_hours: raw.effort_hours,
                deliverable_id: raw.deliverable_id.clone(),
                dependencies: Vec::new(),
            };
            match draft.hard_lint() {
                Ok(()) => drafts.push(draft),
                Err(error) => tracing::warn!(tactic = %tactic.id, task_ref = %draft.task_ref, %error, "TaskDraft rejected by hard lint"),
            }
        }

        let weak_provenance: Vec<CounterId> =
            drafts.iter().filter(|d| d.has_weak_provenance()).map(|d| d.task_ref.clone()).collect();

        let policy = if drafts.is_empty() {
            TacticPolicy::Ambiguous
        } else if drafts.len() > self.explosion_cap {
            TacticPolicy::ReviewRequired
        } else if has_duplicate_pattern(&drafts) {
            TacticPolicy::OverlapReview
        } else {
            TacticPolicy::Accepted
        };

        TacticDecomposition {
            tactic_id: tactic.id.clone(),
            policy,
            drafts,
            weak_provenance,
            contributing_earls: raw_by_earl.into_iter().map(|(id, _)| id).collect(),
            facilitator_earl: facilitator,
        }
    }

    pub async fn run(
        &self,
        tactics: &[Tactic],
        earls: &[Earl],
        domain: &str,
        mandate_id: uuid::Uuid,
        rfp_id: &str,
        proposal_id: &str,
    ) -> Result<Vec<TacticDecomposition>, DecompositionError> {
        let allocator = CounterAllocator::new();
        let mut results = Vec::with_capacity(tactics.len());
        for tactic in tactics {
            results.push(self.decompose_tactic(tactic, earls, domain, mandate_id, rfp_id, proposal_id, &allocator).await);
        }
        Ok(results)
    }
}
