use crate::checkpoint::CheckpointStore;
use crate::duke_proposal::DukeProposal;
use crate::rfp::President;
use crate::sections::extract_labeled_lines;
use archon_config::RetryPolicy;
use archon_types::{AgentId, CompletionError, TextCompletionPort};
use std::collections::HashMap;
use std::sync::Arc;

/// §4.8 Stage 3 Phase 2: the six weighted scoring dimensions, each on a
/// 0-10 scale.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ScoringDimensions {
    pub feasibility: f64,
    pub completeness: f64,
    pub risk_mitigation: f64,
    pub resource_efficiency: f64,
    pub innovation: f64,
    pub alignment: f64,
}

impl ScoringDimensions {
    /// Weights from §4.8: 0.20 / 0.25 / 0.15 / 0.10 / 0.10 / 0.20.
    pub fn weighted_mean(&self) -> f64 {
        self.feasibility * 0.20
            + self.completeness * 0.25
            + self.risk_mitigation * 0.15
            + self.resource_efficiency * 0.10
            + self.innovation * 0.10
            + self.alignment * 0.20
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProposalScore {
    pub president_id: AgentId,
    pub dimensions: ScoringDimensions,
    pub overall: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub novelty: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Tier {
    Finalist,
    Contender,
    BelowThreshold,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AggregatedProposal {
    pub duke_id: AgentId,
    pub mean: f64,
    pub tier: Tier,
    pub scores: Vec<ProposalScore>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PanelVote {
    pub president_id: AgentId,
    pub duke_id: AgentId,
    pub score: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub enum Decision {
    WinnerSelected { duke_id: AgentId, panel_mean: f64 },
    NoViableProposal,
    RevisionNeeded { handbacks: HashMap<AgentId, String> },
    EscalateToConclave,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SelectionResult {
    pub aggregated: Vec<AggregatedProposal>,
    pub panel_votes: Vec<PanelVote>,
    pub panel_recommendation: Option<AgentId>,
    pub decision: Decision,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("no proposals were submitted for selection")]
    NoProposals,
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance.sqrt())
}

/// Parses a completion's scored response for one president/proposal pair.
/// Expects `DIM: feasibility=7.5` style lines plus `OVERALL:`, `CONFIDENCE:`,
/// `NOVELTY:`, `REASON:`, `STRENGTH:`, `WEAKNESS:`.
fn parse_score(president_id: AgentId, text: &str) -> Option<ProposalScore> {
    let dims = extract_labeled_lines(text, "DIM");
    let mut dimension_values: HashMap<String, f64> = HashMap::new();
    for dim in dims {
        if let Some((key, value)) = dim.split_once('=') {
            if let Ok(v) = value.trim().parse::<f64>() {
                dimension_values.insert(key.trim().to_lowercase(), v);
            }
        }
    }
    let get = |k: &str| *dimension_values.get(k).unwrap_or(&0.0);
    let dimensions = ScoringDimensions {
        feasibility: get("feasibility"),
        completeness: get("completeness"),
        risk_mitigation: get("risk_mitigation"),
        resource_efficiency: get("resource_efficiency"),
        innovation: get("innovation"),
        alignment: get("alignment"),
    };
    let overall = extract_labeled_lines(text, "OVERALL").first()?.parse().ok()?;
    let confidence = extract_labeled_lines(text, "CONFIDENCE").first().and_then(|s| s.parse().ok()).unwrap_or(0.5);
    let novelty = extract_labeled_lines(text, "NOVELTY").first().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let reasoning = extract_labeled_lines(text, "REASON").join(" ");
    let strengths = extract_labeled_lines(text, "STRENGTH");
    let weaknesses = extract_labeled_lines(text, "WEAKNESS");
    Some(ProposalScore { president_id, dimensions, overall, confidence, reasoning, strengths, weaknesses, novelty })
}

const STAGE: &str = "selection";

/// Stage 3 orchestrator (§4.8): LLM scoring (Phase 2) and panel facilitation
/// (Phase 5) are the only steps that call out; aggregation (Phase 4) and the
/// final decision (Phase 6) are pure functions over the scores collected.
pub struct SelectionOrchestrator {
    completion: Arc<dyn TextCompletionPort>,
    checkpoints: Arc<dyn CheckpointStore>,
    retry: RetryPolicy,
    panel_size: usize,
    max_rounds: u32,
}

impl SelectionOrchestrator {
    pub fn new(
        completion: Arc<dyn TextCompletionPort>,
        checkpoints: Arc<dyn CheckpointStore>,
        retry: RetryPolicy,
        panel_size: usize,
        max_rounds: u32,
    ) -> Self {
        Self { completion, checkpoints, retry, panel_size, max_rounds }
    }

    async fn score_one(&self, president: &President, proposal: &DukeProposal) -> Option<ProposalScore> {
        let unit = format!("{}-{}", president.id, proposal.duke_id);
        if let Some(value) = self.checkpoints.load(STAGE, &unit).await {
            if let Ok(score) = serde_json::from_value::<ProposalScore>(value) {
                return Some(score);
            }
        }
        let prompt = format!(
            "President of {}: score the proposal from the Duke of {} on feasibility, completeness, \
             risk_mitigation, resource_efficiency, innovation, and alignment (each DIM: name=0-10), \
             OVERALL: 0-10, CONFIDENCE: 0-1, NOVELTY: 0-1, REASON: ..., STRENGTH: ..., WEAKNESS: ....",
            president.portfolio, proposal.domain
        );

        for attempt in 0..self.retry.max_attempts {
            let outcome: Result<String, CompletionError> = self.completion.complete(&prompt).await;
            match outcome {
                Ok(text) => match parse_score(president.id.clone(), &text) {
                    Some(score) => {
                        self.checkpoints.save(STAGE, &unit, serde_json::to_value(&score).expect("score always serializes")).await;
                        return Some(score);
                    }
                    None => {
                        tracing::warn!(president = %president.id, duke = %proposal.duke_id, attempt, "scoring response did not parse");
                    }
                },
                Err(error) => {
                    tracing::warn!(president = %president.id, duke = %proposal.duke_id, attempt, %error, "scoring provider error");
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            }
        }
        tracing::warn!(president = %president.id, duke = %proposal.duke_id, "scoring failed after retry budget exhausted");
        None
    }

    fn aggregate(&self, proposals: &[DukeProposal], scores_by_duke: &HashMap<AgentId, Vec<ProposalScore>>) -> Vec<AggregatedProposal> {
        // Per-president z-score normalization over each president's raw
        // (weighted-dimension) scores across every proposal they rated.
        let mut raw_by_president: HashMap<AgentId, Vec<f64>> = HashMap::new();
        for scores in scores_by_duke.values() {
            for score in scores {
                raw_by_president.entry(score.president_id.clone()).or_default().push(score.dimensions.weighted_mean());
            }
        }
        let president_stats: HashMap<AgentId, (f64, f64)> =
            raw_by_president.into_iter().map(|(president, raws)| (president, mean_and_std(&raws))).collect();

        let all_raw: Vec<f64> =
            scores_by_duke.values().flat_map(|scores| scores.iter().map(|s| s.dimensions.weighted_mean())).collect();
        let (global_mean, global_std) = mean_and_std(&all_raw);

        proposals
            .iter()
            .map(|proposal| {
                let scores = scores_by_duke.get(&proposal.duke_id).cloned().unwrap_or_default();
                let z_values: Vec<f64> = scores
                    .iter()
                    .map(|score| {
                        let (mean, std) = president_stats.get(&score.president_id).copied().unwrap_or((0.0, 0.0));
                        let raw = score.dimensions.weighted_mean();
                        if std > 0.0 { (raw - mean) / std } else { 0.0 }
                    })
                    .collect();
                let avg_z = if z_values.is_empty() { 0.0 } else { z_values.iter().sum::<f64>() / z_values.len() as f64 };
                let mut mean = if global_std > 0.0 { global_mean + avg_z * global_std } else { global_mean };

                let avg_novelty =
                    if scores.is_empty() { 0.0 } else { scores.iter().map(|s| s.novelty).sum::<f64>() / scores.len() as f64 };
                if avg_novelty >= 0.7 {
                    mean += 0.5;
                }
                let mean = mean.clamp(0.0, 10.0);

                let tier = if mean >= 7.0 {
                    Tier::Finalist
                } else if mean >= 5.0 {
                    Tier::Contender
                } else {
                    Tier::BelowThreshold
                };
                AggregatedProposal { duke_id: proposal.duke_id.clone(), mean, tier, scores }
            })
            .collect()
    }

    async fn panel(&self, top: &[AggregatedProposal]) -> (Vec<PanelVote>, Option<AgentId>) {
        if top.is_empty() {
            return (Vec::new(), None);
        }
        let summary = top
            .iter()
            .map(|proposal| format!("{} (aggregated mean {:.2})", proposal.duke_id, proposal.mean))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Panel facilitator: the top proposals are:\n{summary}\nRecord each President's vote as \
             VOTE: <president> -> <duke> (<score 0-10>) and recommend a winner as WINNER: <duke>."
        );
        let text = match self.completion.complete(&prompt).await {
            Ok(text) => text,
            Err(_) => return (Vec::new(), None),
        };
        let votes = extract_labeled_lines(&text, "VOTE")
            .into_iter()
            .filter_map(|line| parse_vote_line(&line))
            .collect::<Vec<_>>();
        let recommendation = extract_labeled_lines(&text, "WINNER")
            .first()
            .and_then(|name| top.iter().find(|p| p.duke_id.to_string() == *name).map(|p| p.duke_id.clone()));
        (votes, recommendation)
    }

    pub async fn run(
        &self,
        proposals: &[DukeProposal],
        presidents: &[President],
        round: u32,
    ) -> Result<SelectionResult, SelectionError> {
        if proposals.is_empty() {
            return Err(SelectionError::NoProposals);
        }

        let mut scores_by_duke: HashMap<AgentId, Vec<ProposalScore>> = HashMap::new();
        for proposal in proposals {
            let mut scores = Vec::new();
            for president in presidents {
                if let Some(score) = self.score_one(president, proposal).await {
                    scores.push(score);
                }
            }
            scores_by_duke.insert(proposal.duke_id.clone(), scores);
        }

        let mut aggregated = self.aggregate(proposals, &scores_by_duke);
        aggregated.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(std::cmp::Ordering::Equal));

        let top: Vec<AggregatedProposal> = aggregated.iter().take(self.panel_size).cloned().collect();
        let (panel_votes, panel_recommendation) = self.panel(&top).await;

        let all_below_contender = aggregated.iter().all(|p| p.mean < 5.0);
        let panel_mean = panel_recommendation
            .as_ref()
            .map(|duke_id| {
                let votes_for: Vec<f64> = panel_votes.iter().filter(|v| &v.duke_id == duke_id).map(|v| v.score).collect();
                if votes_for.is_empty() {
                    aggregated.iter().find(|p| &p.duke_id == duke_id).map(|p| p.mean).unwrap_or(0.0)
                } else {
                    votes_for.iter().sum::<f64>() / votes_for.len() as f64
                }
            })
            .unwrap_or(0.0);

        let decision = if panel_recommendation.is_some() && panel_mean >= 7.0 {
            Decision::WinnerSelected { duke_id: panel_recommendation.clone().unwrap(), panel_mean }
        } else if all_below_contender {
            Decision::NoViableProposal
        } else if round < self.max_rounds {
            let handbacks = aggregated
                .iter()
                .filter(|p| p.tier != Tier::Finalist)
                .map(|p| {
                    let concerns = p.scores.iter().flat_map(|s| s.weaknesses.clone()).collect::<Vec<_>>().join("; ");
                    (p.duke_id.clone(), format!("Unresolved concerns for revision: {concerns}"))
                })
                .collect();
            Decision::RevisionNeeded { handbacks }
        } else {
            Decision::EscalateToConclave
        };

        Ok(SelectionResult { aggregated, panel_votes, panel_recommendation, decision })
    }
}

fn parse_vote_line(line: &str) -> Option<PanelVote> {
    let (rest, score_part) = line.rsplit_once('(')?;
    let score: f64 = score_part.trim_end_matches(')').trim().parse().ok()?;
    let (president, duke) = rest.split_once("->")?;
    Some(PanelVote {
        president_id: AgentId::system(president.trim().to_string()),
        duke_id: AgentId::system(duke.trim().to_string()),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use async_trait::async_trait;
    use std::time::Duration;

    fn retry() -> RetryPolicy {
        RetryPolicy { base: Duration::from_millis(1), max: Duration::from_millis(5), max_attempts: 2 }
    }

    fn proposal(name: &str) -> DukeProposal {
        DukeProposal {
            duke_id: AgentId::system(name),
            domain: name.to_string(),
            overview: String::new(),
            tactics: vec![],
            risks: vec![],
            resource_requests: vec![],
            coverage: vec![],
            deliverable_plan: String::new(),
            capacity_commitment: String::new(),
            assumptions: vec![],
            acknowledged_constraints: vec![],
            executive_summary: String::new(),
        }
    }

    struct HighScorer;

    #[async_trait]
    impl TextCompletionPort for HighScorer {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            if prompt.contains("Panel facilitator") {
                Ok("VOTE: president-a -> duke-strong (8.5)\nWINNER: SYSTEM:duke-strong\n".into())
            } else if prompt.contains("duke-strong") {
                Ok("DIM: feasibility=9\nDIM: completeness=9\nDIM: risk_mitigation=8\nDIM: resource_efficiency=8\n\
                    DIM: innovation=8\nDIM: alignment=9\nOVERALL: 8.5\nCONFIDENCE: 0.9\nNOVELTY: 0.8\n\
                    REASON: strong plan\nSTRENGTH: thorough\nWEAKNESS: ambitious timeline\n"
                    .into())
            } else {
                Ok("DIM: feasibility=3\nDIM: completeness=3\nDIM: risk_mitigation=3\nDIM: resource_efficiency=3\n\
                    DIM: innovation=2\nDIM: alignment=3\nOVERALL: 3.0\nCONFIDENCE: 0.5\nNOVELTY: 0.1\n\
                    REASON: weak plan\nSTRENGTH: none\nWEAKNESS: underdeveloped\n"
                    .into())
            }
        }
    }

    #[tokio::test]
    async fn a_strong_proposal_with_a_high_panel_vote_wins() {
        let orchestrator = SelectionOrchestrator::new(Arc::new(HighScorer), Arc::new(InMemoryCheckpointStore::new()), retry(), 5, 3);
        let presidents = vec![President { id: AgentId::system("president-a"), portfolio: "INFRA".into() }];
        let proposals = vec![proposal("duke-strong"), proposal("duke-weak")];
        let result = orchestrator.run(&proposals, &presidents, 0).await.unwrap();
        assert!(matches!(result.decision, Decision::WinnerSelected { .. }));
        assert_eq!(result.aggregated[0].duke_id, AgentId::system("duke-strong"));
    }

    struct LowScorer;

    #[async_trait]
    impl TextCompletionPort for LowScorer {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            if prompt.contains("Panel facilitator") {
                Ok("WINNER: SYSTEM:duke-weak\n".into())
            } else {
                Ok("DIM: feasibility=2\nDIM: completeness=2\nDIM: risk_mitigation=2\nDIM: resource_efficiency=2\n\
                    DIM: innovation=2\nDIM: alignment=2\nOVERALL: 2.0\nCONFIDENCE: 0.5\nNOVELTY: 0.1\n\
                    REASON: weak\nSTRENGTH: none\nWEAKNESS: incomplete\n"
                    .into())
            }
        }
    }

    #[tokio::test]
    async fn every_proposal_below_threshold_yields_no_viable_proposal() {
        let orchestrator = SelectionOrchestrator::new(Arc::new(LowScorer), Arc::new(InMemoryCheckpointStore::new()), retry(), 5, 3);
        let presidents = vec![President { id: AgentId::system("president-a"), portfolio: "INFRA".into() }];
        let proposals = vec![proposal("duke-weak")];
        let result = orchestrator.run(&proposals, &presidents, 0).await.unwrap();
        assert!(matches!(result.decision, Decision::NoViableProposal));
    }

    struct FlakyThenHighScorer {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TextCompletionPort for FlakyThenHighScorer {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                return Err(CompletionError::Provider("rate limited".into()));
            }
            if prompt.contains("Panel facilitator") {
                Ok("VOTE: president-a -> duke-strong (8.5)\nWINNER: SYSTEM:duke-strong\n".into())
            } else {
                Ok("DIM: feasibility=9\nDIM: completeness=9\nDIM: risk_mitigation=8\nDIM: resource_efficiency=8\n\
                    DIM: innovation=8\nDIM: alignment=9\nOVERALL: 8.5\nCONFIDENCE: 0.9\nNOVELTY: 0.8\n\
                    REASON: strong plan\nSTRENGTH: thorough\nWEAKNESS: ambitious timeline\n"
                    .into())
            }
        }
    }

    #[tokio::test]
    async fn a_provider_error_retries_and_then_scores() {
        let orchestrator = SelectionOrchestrator::new(
            Arc::new(FlakyThenHighScorer { calls: std::sync::atomic::AtomicUsize::new(0) }),
            Arc::new(InMemoryCheckpointStore::new()),
            retry(),
            5,
            3,
        );
        let presidents = vec![President { id: AgentId::system("president-a"), portfolio: "INFRA".into() }];
        let proposals = vec![proposal("duke-strong")];
        let result = orchestrator.run(&proposals, &presidents, 0).await.unwrap();
        assert_eq!(result.aggregated[0].scores.len(), 1);
    }

    #[tokio::test]
    async fn no_proposals_is_an_error() {
        let orchestrator = SelectionOrchestrator::new(Arc::new(LowScorer), Arc::new(InMemoryCheckpointStore::new()), retry(), 5, 3);
        let presidents = vec![President { id: AgentId::system("president-a"), portfolio: "INFRA".into() }];
        let result = orchestrator.run(&[], &presidents, 0).await;
        assert!(matches!(result, Err(SelectionError::NoProposals)));
    }
}
