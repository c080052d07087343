use crate::optimistic_vote::parse_optimistic_choice;
use archon_types::{
    AgentId, CompletionError, EventType, Motion, MotionId, MotionStatus, MotionType,
    ReconciliationIncomplete, ReconciliationPort, TextCompletionPort, Vote, VoteId,
    VoteValidationDispatchPort,
};
use chrono::{DateTime, Utc};
use event_store::{AppendError, WitnessedEventWriter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
pub enum DeliberationError {
    #[error("motion {0} cannot move from {1:?} to {2:?}")]
    IllegalTransition(MotionId, MotionStatus, MotionStatus),
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationIncomplete),
    #[error("failed to encode event payload: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct DeliberationConfig {
    pub debate_rounds: u32,
    pub vote_capture_concurrency: usize,
    pub reconciliation_timeout: Duration,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            debate_rounds: 2,
            vote_capture_concurrency: 8,
            reconciliation_timeout: Duration::from_secs(300),
        }
    }
}

/// Orchestrates a motion through debate and voting (§4.6). Debate statements
/// and votes are committed through the same `WitnessedEventWriter`, which
/// already serializes concurrent appends — this engine only needs to bound
/// how many archon turns run in parallel, not serialize the writes itself.
pub struct DeliberationEngine {
    writer: Arc<WitnessedEventWriter>,
    completion: Arc<dyn TextCompletionPort>,
    dispatch: Arc<dyn VoteValidationDispatchPort>,
    reconciliation: Arc<dyn ReconciliationPort>,
    config: DeliberationConfig,
}

impl DeliberationEngine {
    pub fn new(
        writer: Arc<WitnessedEventWriter>,
        completion: Arc<dyn TextCompletionPort>,
        dispatch: Arc<dyn VoteValidationDispatchPort>,
        reconciliation: Arc<dyn ReconciliationPort>,
        config: DeliberationConfig,
    ) -> Self {
        Self {
            writer,
            completion,
            dispatch,
            reconciliation,
            config,
        }
    }

    fn transition(&self, motion: &mut Motion, next: MotionStatus) -> Result<(), DeliberationError> {
        if !motion.status.can_transition_to(next) {
            return Err(DeliberationError::IllegalTransition(motion.motion_id, motion.status, next));
        }
        motion.status = next;
        Ok(())
    }

    pub async fn propose(
        &self,
        title: String,
        text: String,
        motion_type: MotionType,
        proposer_id: AgentId,
        now: DateTime<Utc>,
    ) -> Result<Motion, DeliberationError> {
        let motion = Motion {
            motion_id: MotionId::new(),
            title,
            text,
            motion_type,
            proposer_id: proposer_id.clone(),
            created_at: now,
            status: MotionStatus::Proposed,
        };
        let payload = serde_json::to_value(&motion)?;
        self.writer.append(EventType::MotionProposed, payload, proposer_id, now).await?;
        tracing::info!(motion_id = %motion.motion_id, "motion proposed");
        Ok(motion)
    }

    /// FR9 (no-preview): every archon's statement for a round is generated
    /// before any of them is committed, so no completion call for this
    /// round can see another archon's in-progress statement.
    pub async fn run_debate(
        &self,
        motion: &mut Motion,
        archons: &[AgentId],
        now: DateTime<Utc>,
    ) -> Result<(), DeliberationError> {
        self.transition(motion, MotionStatus::Debated)?;

        for round in 0..self.config.debate_rounds {
            let mut statements = Vec::with_capacity(archons.len());
            for archon in archons {
                let prompt = format!(
                    "Motion {} (\"{}\"), debate round {}: state your position, {}.",
                    motion.motion_id, motion.title, round, archon
                );
                let text = self.completion.complete(&prompt).await?;
                statements.push((archon.clone(), text));
            }
            for (archon, text) in statements {
                let payload = serde_json::json!({
                    "motion_id": motion.motion_id,
                    "round": round,
                    "text": text,
                });
                self.writer.append(EventType::StatementMade, payload, archon, now).await?;
            }
        }
        Ok(())
    }

    /// §4.6 step 3 + concurrency note: vote capture runs up to
    /// `vote_capture_concurrency` archons in parallel; each cast is written
    /// with its optimistic choice immediately and handed to the validator
    /// bus, without waiting for validation.
    pub async fn capture_votes(
        &self,
        motion: &mut Motion,
        archons: &[AgentId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Vote>, DeliberationError> {
        self.transition(motion, MotionStatus::Voting)?;

        let semaphore = Arc::new(Semaphore::new(self.config.vote_capture_concurrency.max(1)));
        let motion_id = motion.motion_id;
        let motion_title = motion.title.clone();

        let captures = archons.iter().cloned().map(|archon| {
            let semaphore = semaphore.clone();
            let completion = self.completion.clone();
            let writer = self.writer.clone();
            let dispatch = self.dispatch.clone();
            let reconciliation = self.reconciliation.clone();
            let motion_title = motion_title.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                let prompt = format!(
                    "Motion {} (\"{}\"): cast your vote as aye, nay, or abstain, {}.",
                    motion_id, motion_title, archon
                );
                let raw_text = completion.complete(&prompt).await?;
                let optimistic_choice = parse_optimistic_choice(&raw_text);
                let vote = Vote {
                    vote_id: VoteId::new(),
                    motion_id,
                    archon_id: archon.clone(),
                    optimistic_choice,
                    raw_text,
                    captured_at: now,
                };
                reconciliation.register_pending(motion_id, vote.vote_id).await;
                let payload = serde_json::to_value(&vote)?;
                writer.append(EventType::VoteCast, payload, archon, now).await?;
                dispatch.dispatch_for_validation(&vote).await;
                Ok::<Vote, DeliberationError>(vote)
            }
        });

        futures::future::join_all(captures).await.into_iter().collect()
    }

    /// §4.7 adjournment gate (P2): blocks until every vote under this motion
    /// is validated or fell back to the DLQ. Never silently proceeds.
    pub async fn adjourn(&self, motion: &Motion) -> Result<(), DeliberationError> {
        self.reconciliation
            .await_all_validations(motion.motion_id, self.config.reconciliation_timeout)
            .await?;
        tracing::info!(motion_id = %motion.motion_id, "motion adjourned, all votes reconciled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_crypto::{Ed25519Signer, KeyRegistry, Mode, SigningPort};
    use archon_types::VoteChoice;
    use async_trait::async_trait;
    use event_store::{
        HaltCessationManager, InMemoryEventStore, InMemoryHaltChannel, LocalWitnessAttestor,
        WitnessPoolConfig,
    };

    struct ScriptedCompletion;

    #[async_trait]
    impl TextCompletionPort for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            if prompt.contains("cast your vote") {
                Ok("I vote aye on this.".to_string())
            } else {
                Ok(format!("On reflection: {prompt}"))
            }
        }
    }

    struct NoopDispatch;

    #[async_trait]
    impl VoteValidationDispatchPort for NoopDispatch {
        async fn dispatch_for_validation(&self, _vote: &Vote) {}
    }

    struct AlwaysReconciled;

    #[async_trait]
    impl ReconciliationPort for AlwaysReconciled {
        async fn await_all_validations(
            &self,
            _motion_id: MotionId,
            _timeout: Duration,
        ) -> Result<(), ReconciliationIncomplete> {
            Ok(())
        }

        async fn register_pending(&self, _motion_id: MotionId, _vote_id: VoteId) {}
    }

    async fn test_engine(archon_count: usize, now: DateTime<Utc>) -> (DeliberationEngine, Vec<AgentId>) {
        let signer = Arc::new(Ed25519Signer::new(Mode::Development));
        let key_registry = Arc::new(KeyRegistry::new());
        let store = Arc::new(InMemoryEventStore::new());
        let halt_manager = Arc::new(HaltCessationManager::new(
            Arc::new(InMemoryHaltChannel::default()),
            Arc::new(InMemoryHaltChannel::default()),
        ));
        let attestor = Arc::new(LocalWitnessAttestor::new(signer.clone(), key_registry.clone()));

        let archons: Vec<AgentId> = (0..archon_count).map(|_| AgentId::agent(uuid::Uuid::new_v4())).collect();
        let witnesses: Vec<AgentId> = (0..5).map(|_| AgentId::agent(uuid::Uuid::new_v4())).collect();
        for id in archons.iter().chain(witnesses.iter()).cloned().chain([AgentId::system("event-store")]) {
            let (key_id, public_key) = signer.generate_keypair().await.unwrap();
            key_registry.register(id, key_id, public_key, now - chrono::Duration::days(1));
        }

        let writer = Arc::new(event_store::WitnessedEventWriter::new(
            store,
            halt_manager,
            signer,
            key_registry,
            attestor,
            WitnessPoolConfig {
                active_pool: witnesses,
                minimum_viable: 3,
            },
            vec![],
        ));

        let engine = DeliberationEngine::new(
            writer,
            Arc::new(ScriptedCompletion),
            Arc::new(NoopDispatch),
            Arc::new(AlwaysReconciled),
            DeliberationConfig {
                debate_rounds: 1,
                vote_capture_concurrency: 4,
                reconciliation_timeout: Duration::from_secs(5),
            },
        );
        (engine, archons)
    }

    #[tokio::test]
    async fn motion_moves_through_its_full_lifecycle() {
        let now = Utc::now();
        let (engine, archons) = test_engine(4, now).await;

        let mut motion = engine
            .propose("Adopt the charter".into(), "full text".into(), MotionType::Constitutional, archons[0].clone(), now)
            .await
            .unwrap();
        assert_eq!(motion.status, MotionStatus::Proposed);

        engine.run_debate(&mut motion, &archons, now).await.unwrap();
        assert_eq!(motion.status, MotionStatus::Debated);

        let votes = engine.capture_votes(&mut motion, &archons, now).await.unwrap();
        assert_eq!(motion.status, MotionStatus::Voting);
        assert_eq!(votes.len(), archons.len());
        assert!(votes.iter().all(|v| v.optimistic_choice == VoteChoice::Aye));

        engine.adjourn(&motion).await.unwrap();
    }

    #[tokio::test]
    async fn voting_before_debate_is_rejected() {
        let now = Utc::now();
        let (engine, archons) = test_engine(2, now).await;
        let mut motion = engine
            .propose("Skip ahead".into(), "text".into(), MotionType::Procedural, archons[0].clone(), now)
            .await
            .unwrap();

        let result = engine.capture_votes(&mut motion, &archons, now).await;
        assert!(matches!(result, Err(DeliberationError::IllegalTransition(_, MotionStatus::Proposed, MotionStatus::Voting))));
    }
}
