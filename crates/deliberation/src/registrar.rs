use archon_types::{
    AgentId, Event, EventType, Mandate, Motion, MotionId, MotionStatus, Tally,
    TallyInvariantViolation, VoteChoice,
};
use chrono::{DateTime, Utc};
use event_store::{AppendError, EventStore, WitnessedEventWriter};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error("motion {0} has not reached the voting stage")]
    NotVoting(MotionId),
    #[error(transparent)]
    TallyInvariant(#[from] TallyInvariantViolation),
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error("failed to encode event payload: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Outcome of §4.6 step 4: the motion either ratifies into a `Mandate`
/// (translating the ratified motion into an actionable unit of work, per
/// GLOSSARY) or fails under the simple majority rule.
#[derive(Debug, Clone)]
pub enum RegistrarOutcome {
    Ratified(Mandate),
    Failed(Tally),
}

/// The "Registrar" of §2's data-flow diagram (`RatifiedMotion → Registrar →
/// Mandate`): reconstructs the final tally from the witnessed event stream
/// (never from in-memory vote state, per §9's "cyclic references are
/// explicit ID references, any traversal walks IDs and re-reads"), applies
/// the majority rule, checks the P6/I5 invariant, and writes the terminal
/// `MotionRatified`/`MotionFailed` event. Only ever called after
/// `DeliberationEngine::adjourn` has returned `Ok` (I6: reconciliation must
/// precede ratification in sequence).
pub struct Registrar {
    store: Arc<dyn EventStore>,
    writer: Arc<WitnessedEventWriter>,
    writer_agent_id: AgentId,
}

impl Registrar {
    pub fn new(store: Arc<dyn EventStore>, writer: Arc<WitnessedEventWriter>) -> Self {
        Self {
            store,
            writer,
            writer_agent_id: AgentId::system("deliberation-registrar"),
        }
    }

    /// Walks every event up to and including the current head, folding
    /// `VoteCast`/`VoteOverride` events scoped to `motion_id` into a
    /// `Tally`. Overrides are applied in sequence order so a vote that was
    /// overridden twice (re-run validation, unlikely but not excluded by
    /// spec) lands on its last recorded choice.
    async fn reconstruct_tally(&self, motion_id: MotionId) -> (Tally, u64) {
        let head = self.store.head().await.map(|e| e.sequence).unwrap_or(0);
        let events: Vec<Event> = if head == 0 { Vec::new() } else { self.store.range(1, head).await };

        let mut tally = Tally::default();
        let mut total_votes: u64 = 0;

        for event in &events {
            match event.event_type {
                EventType::VoteCast => {
                    if event_motion_id(event) == Some(motion_id) {
                        if let Some(choice) = event.payload.get("optimistic_choice").and_then(parse_choice) {
                            tally.record(choice);
                            total_votes += 1;
                        }
                    }
                }
                EventType::VoteOverride => {
                    if event_motion_id(event) == Some(motion_id) {
                        let from = event.payload.get("from").and_then(parse_choice);
                        let to = event.payload.get("to").and_then(parse_choice);
                        if let (Some(from), Some(to)) = (from, to) {
                            tally.apply_override(from, to);
                        }
                    }
                }
                _ => {}
            }
        }

        (tally, total_votes)
    }

    /// §4.6 step 4 / I6: ratifies or fails the motion based on the
    /// reconstructed tally. Callers must have already awaited
    /// `DeliberationEngine::adjourn` successfully — this method does not
    /// re-check reconciliation itself, it only trusts that every
    /// `VoteCast`/`VoteOverride` already in the log is final.
    pub async fn ratify_or_fail(
        &self,
        motion: &mut Motion,
        now: DateTime<Utc>,
    ) -> Result<RegistrarOutcome, RegistrarError> {
        if motion.status != MotionStatus::Voting {
            return Err(RegistrarError::NotVoting(motion.motion_id));
        }

        let (tally, total_votes) = self.reconstruct_tally(motion.motion_id).await;
        tally.verify_invariant(total_votes)?;

        if tally.passes_majority() {
            let mandate = Mandate {
                mandate_id: uuid::Uuid::new_v4(),
                motion_id: motion.motion_id,
                title: motion.title.clone(),
                text: motion.text.clone(),
                ratified_at: now,
            };
            let payload = serde_json::json!({
                "motion_id": motion.motion_id,
                "tally": tally,
                "mandate": mandate,
            });
            self.writer
                .append(EventType::MotionRatified, payload, self.writer_agent_id.clone(), now)
                .await?;
            motion.status = MotionStatus::Ratified;
            tracing::warn!(motion_id = %motion.motion_id, ?tally, "motion ratified");
            Ok(RegistrarOutcome::Ratified(mandate))
        } else {
            let payload = serde_json::json!({
                "motion_id": motion.motion_id,
                "tally": tally,
            });
            self.writer
                .append(EventType::MotionFailed, payload, self.writer_agent_id.clone(), now)
                .await?;
            motion.status = MotionStatus::Failed;
            tracing::warn!(motion_id = %motion.motion_id, ?tally, "motion failed");
            Ok(RegistrarOutcome::Failed(tally))
        }
    }
}

fn event_motion_id(event: &Event) -> Option<MotionId> {
    serde_json::from_value(event.payload.get("motion_id")?.clone()).ok()
}

fn parse_choice(value: &serde_json::Value) -> Option<VoteChoice> {
    serde_json::from_value(value.clone()).ok()
}
