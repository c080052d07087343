use crate::checkpoint::CheckpointStore;
use crate::counters::CounterAllocator;
use crate::sections::extract_labeled_lines;
use archon_config::RetryPolicy;
use archon_types::{first_mechanism_match, AgentId, CounterId, Mandate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalRequirement {
    pub id: CounterId,
    pub portfolio: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonFunctionalRequirement {
    pub id: CounterId,
    pub portfolio: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: CounterId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: CounterId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    pub text: String,
}

/// §4.8 Stage 1: `final` only when all 11 Presidents contribute; otherwise
/// `blocked`, with `open_questions` naming which portfolios are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierStatus {
    Final,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationDossier {
    pub mandate_id: uuid::Uuid,
    pub status: DossierStatus,
    pub functional_requirements: Vec<FunctionalRequirement>,
    pub non_functional_requirements: Vec<NonFunctionalRequirement>,
    pub constraints: Vec<Constraint>,
    pub deliverables: Vec<Deliverable>,
    pub evaluation_criteria: Vec<EvaluationCriterion>,
    pub open_questions: Vec<String>,
}

/// One of the 11 portfolio heads who each independently contribute
/// requirements, constraints, and deliverables for their portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct President {
    pub id: AgentId,
    /// Short abbreviation used as the counter-id namespace, e.g. `"HEALTH"`.
    pub portfolio: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RfpError {
    #[error("failed to decode a checkpointed contribution: {0}")]
    Checkpoint(#[from] serde_json::Error),
}

/// Stage 1 orchestrator (§4.8): each President's completion is lint-checked
/// for mechanism language (the RFP says *what*, not *how*) under a
/// per-president retry budget, checkpointed before the stage proceeds.
pub struct RfpOrchestrator {
    completion: Arc<dyn archon_types::TextCompletionPort>,
    checkpoints: Arc<dyn CheckpointStore>,
    retry: RetryPolicy,
}

const STAGE: &str = "rfp";

impl RfpOrchestrator {
    pub fn new(
        completion: Arc<dyn archon_types::TextCompletionPort>,
        checkpoints: Arc<dyn CheckpointStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self { completion, checkpoints, retry }
    }

    async fn contribution_for(&self, president: &President, mandate: &Mandate) -> Option<String> {
        let unit = president.id.to_string();
        if let Some(checkpointed) = self.checkpoints.load(STAGE, &unit).await {
            return serde_json::from_value(checkpointed).ok();
        }

        let prompt = format!(
            "Mandate {} (\"{}\"): as President of the {} portfolio, state functional requirements \
             (FR: ...), non-functional requirements (NFR: ...), constraints (C: ...), deliverables \
             (D: ...) and evaluation criteria (EC: ...) for this mandate. Describe outcomes, not \
             implementation mechanisms.",
            mandate.motion_id, mandate.title, president.portfolio
        );

        for attempt in 0..self.retry.max_attempts {
            let outcome = self.completion.complete(&prompt).await;
            match outcome {
                Ok(text) if first_mechanism_match(&text).is_none() => {
                    self.checkpoints
                        .save(STAGE, &unit, serde_json::to_value(&text).expect("string always serializes"))
                        .await;
                    return Some(text);
                }
                Ok(text) => {
                    tracing::warn!(
                        president = %president.id,
                        category = first_mechanism_match(&text).unwrap_or("unknown"),
                        attempt,
                        "RFP contribution rejected by constitutional lint"
                    );
                }
                Err(error) => {
                    tracing::warn!(president = %president.id, attempt, %error, "RFP contribution provider error");
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }
        tracing::warn!(president = %president.id, portfolio = %president.portfolio, "RFP contribution failed after retry budget exhausted");
        None
    }

    pub async fn run(
        &self,
        mandate: &Mandate,
        presidents: &[President],
        _now: DateTime<Utc>,
    ) -> Result<ImplementationDossier, RfpError> {
        let allocator = CounterAllocator::new();
        let mut functional_requirements = Vec::new();
        let mut non_functional_requirements = Vec::new();
        let mut constraints = Vec::new();
        let mut deliverables = Vec::new();
        let mut evaluation_criteria = Vec::new();
        let mut missing_portfolios = Vec::new();

        for president in presidents {
            match self.contribution_for(president, mandate).await {
                None => missing_portfolios.push(president.portfolio.clone()),
                Some(text) => {
                    for fr in extract_labeled_lines(&text, "FR") {
                        let id = allocator.next("FR", &president.portfolio);
                        functional_requirements.push(FunctionalRequirement { id, portfolio: president.portfolio.clone(), text: fr });
                    }
                    for nfr in extract_labeled_lines(&text, "NFR") {
                        let id = allocator.next("NFR", &president.portfolio);
                        non_functional_requirements.push(NonFunctionalRequirement { id, portfolio: president.portfolio.clone(), text: nfr });
                    }
                    for c in extract_labeled_lines(&text, "C") {
                        constraints.push(Constraint { id: allocator.next("C", "GLOBAL"), text: c });
                    }
                    for d in extract_labeled_lines(&text, "D") {
                        deliverables.push(Deliverable { id: allocator.next("D", "GLOBAL"), text: d });
                    }
                    for ec in extract_labeled_lines(&text, "EC") {
                        evaluation_criteria.push(EvaluationCriterion { text: ec });
                    }
                }
            }
        }

        let status = if missing_portfolios.is_empty() { DossierStatus::Final } else { DossierStatus::Blocked };
        let open_questions = missing_portfolios
            .into_iter()
            .map(|portfolio| format!("Portfolio {portfolio} did not contribute within the retry budget"))
            .collect();

        Ok(ImplementationDossier {
            mandate_id: mandate.mandate_id,
            status,
            functional_requirements,
            non_functional_requirements,
            constraints,
            deliverables,
            evaluation_criteria,
            open_questions,
        })
    }
}
