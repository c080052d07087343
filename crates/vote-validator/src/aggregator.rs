use crate::reconciliation::ReconciliationGate;
use archon_types::{
    AgentId, CompletionError, EventType, MotionId, TextCompletionPort, Vote, VoteChoice, VoteId,
};
use chrono::Utc;
use event_store::WitnessedEventWriter;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

static AYE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(aye|yea|yes|support|favou?r|approve)\b").unwrap());
static NAY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(nay|no|oppose|against|reject)\b").unwrap());

/// Independent of `deliberation::optimistic_vote`: a validator worker is a
/// distinct consumer of the raw vote text and arrives at its own reading,
/// it does not trust the proposer's optimistic parse.
fn parse_choice(raw_text: &str) -> VoteChoice {
    let aye = AYE_PATTERN.is_match(raw_text);
    let nay = NAY_PATTERN.is_match(raw_text);
    match (aye, nay) {
        (true, false) => VoteChoice::Aye,
        (false, true) => VoteChoice::Nay,
        _ => VoteChoice::Abstain,
    }
}

/// The three validator identities (§4.7): Secretary-Text and Secretary-JSON
/// must agree for a vote to be confirmed; Witness records agreement or
/// dissent for the audit trail but does not gate consensus.
pub struct ValidatorRoster {
    pub secretary_text: (AgentId, Arc<dyn TextCompletionPort>),
    pub secretary_json: (AgentId, Arc<dyn TextCompletionPort>),
    pub witness: (AgentId, Arc<dyn TextCompletionPort>),
}

#[derive(Debug, Clone)]
struct VoteState {
    motion_id: MotionId,
    optimistic_choice: VoteChoice,
    attempts: u32,
}

/// Consumes a vote, runs it past all three validators concurrently, applies
/// the agreement rule, and either confirms it (writing a `VoteOverride` if
/// the validated choice differs from the optimistic one, per P6/I5) or,
/// after `max_attempts` rounds of disagreement, falls it through to the
/// dead letter path with a witnessed `DlqFallback` event that retains the
/// optimistic choice as the vote's binding value (§4.7).
pub struct ConsensusAggregator {
    states: Mutex<HashMap<VoteId, VoteState>>,
    roster: ValidatorRoster,
    writer: Arc<WitnessedEventWriter>,
    reconciliation: Arc<ReconciliationGate>,
    max_attempts: u32,
    writer_agent_id: AgentId,
}

enum Decision {
    Agreed(VoteChoice),
    Retry,
    Exhausted,
}

impl ConsensusAggregator {
    pub fn new(
        roster: ValidatorRoster,
        writer: Arc<WitnessedEventWriter>,
        reconciliation: Arc<ReconciliationGate>,
        max_attempts: u32,
    ) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            roster,
            writer,
            reconciliation,
            max_attempts: max_attempts.max(1),
            writer_agent_id: AgentId::system("vote-validator"),
        }
    }

    async fn query(port: &Arc<dyn TextCompletionPort>, vote: &Vote) -> VoteChoice {
        let prompt = format!(
            "Validate vote {} on motion {}: \"{}\"",
            vote.vote_id, vote.motion_id, vote.raw_text
        );
        match port.complete(&prompt).await {
            Ok(text) => parse_choice(&text),
            Err(_) => VoteChoice::Abstain,
        }
    }

    /// Runs validation rounds for one vote until the secretaries agree or
    /// `max_attempts` is exhausted. Safe to call more than once for the
    /// same `vote_id` (e.g. a retriggered dispatch after a circuit-breaker
    /// fallback) — the attempt counter is shared.
    pub async fn run_validation_round(&self, vote: Vote) {
        {
            let mut states = self.states.lock();
            states.entry(vote.vote_id).or_insert_with(|| VoteState {
                motion_id: vote.motion_id,
                optimistic_choice: vote.optimistic_choice,
                attempts: 0,
            });
        }

        loop {
            let (text_choice, json_choice, witness_choice) = tokio::join!(
                Self::query(&self.roster.secretary_text.1, &vote),
                Self::query(&self.roster.secretary_json.1, &vote),
                Self::query(&self.roster.witness.1, &vote),
            );

            let decision = {
                let mut states = self.states.lock();
                let state = states
                    .get_mut(&vote.vote_id)
                    .expect("state inserted unconditionally above");
                state.attempts += 1;
                tracing::debug!(
                    vote_id = %vote.vote_id, ?text_choice, ?json_choice, ?witness_choice,
                    attempt = state.attempts, "validator round complete"
                );
                if text_choice == json_choice {
                    Decision::Agreed(text_choice)
                } else if state.attempts >= self.max_attempts {
                    Decision::Exhausted
                } else {
                    Decision::Retry
                }
            };

            match decision {
                Decision::Agreed(choice) => {
                    self.finalize_validated(&vote, choice).await;
                    return;
                }
                Decision::Exhausted => {
                    self.finalize_dlq(&vote).await;
                    return;
                }
                Decision::Retry => continue,
            }
        }
    }

    async fn finalize_validated(&self, vote: &Vote, validated_choice: VoteChoice) {
        if validated_choice != vote.optimistic_choice {
            let payload = serde_json::json!({
                "vote_id": vote.vote_id,
                "motion_id": vote.motion_id,
                "archon_id": vote.archon_id,
                "from": vote.optimistic_choice,
                "to": validated_choice,
            });
            if let Err(err) = self
                .writer
                .append(EventType::VoteOverride, payload, self.writer_agent_id.clone(), Utc::now())
                .await
            {
                tracing::error!(vote_id = %vote.vote_id, error = %err, "failed to record vote override");
            }
        }
        self.states.lock().remove(&vote.vote_id);
        self.reconciliation.mark_validated(vote.motion_id, vote.vote_id).await;
    }

    async fn finalize_dlq(&self, vote: &Vote) {
        let payload = serde_json::json!({
            "vote_id": vote.vote_id,
            "motion_id": vote.motion_id,
            "archon_id": vote.archon_id,
            "optimistic_choice": vote.optimistic_choice,
            "reason": "secretary validators disagreed past the retry limit",
        });
        if let Err(err) = self
            .writer
            .append(EventType::DlqFallback, payload, self.writer_agent_id.clone(), Utc::now())
            .await
        {
            tracing::error!(vote_id = %vote.vote_id, error = %err, "failed to record dlq fallback");
        }
        self.states.lock().remove(&vote.vote_id);
        self.reconciliation.mark_dlq_fallback(vote.motion_id, vote.vote_id).await;
        crate::metrics::DLQ_FALLBACKS_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wired_aggregator;
    use archon_types::VoteId as VId;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl TextCompletionPort for Fixed {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn agreement_confirms_without_an_override_when_it_matches_the_optimistic_choice() {
        let (aggregator, motion_id, archon_id) = wired_aggregator(
            Arc::new(Fixed("aye")),
            Arc::new(Fixed("aye")),
            Arc::new(Fixed("aye")),
            3,
        )
        .await;

        let vote = Vote {
            vote_id: VId::new(),
            motion_id,
            archon_id,
            optimistic_choice: VoteChoice::Aye,
            raw_text: "I vote aye.".into(),
            captured_at: Utc::now(),
        };
        aggregator.run_validation_round(vote).await;
    }

    #[tokio::test]
    async fn disagreement_past_max_attempts_falls_through_to_the_dead_letter_path() {
        let (aggregator, motion_id, archon_id) = wired_aggregator(
            Arc::new(Fixed("aye")),
            Arc::new(Fixed("nay")),
            Arc::new(Fixed("abstain")),
            2,
        )
        .await;

        let vote = Vote {
            vote_id: VId::new(),
            motion_id,
            archon_id,
            optimistic_choice: VoteChoice::Abstain,
            raw_text: "unclear".into(),
            captured_at: Utc::now(),
        };
        aggregator.run_validation_round(vote).await;
    }
}
