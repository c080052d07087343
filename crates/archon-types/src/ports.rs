use crate::ids::{MotionId, VoteId};
use crate::vote::Vote;
use async_trait::async_trait;
use std::time::Duration;

/// The one LLM-facing seam shared by the deliberation engine and the
/// executive pipeline (§4.6, §4.8): both drive an archon's turn through a
/// single prompt-in, text-out call, so either can be pointed at a live
/// model or a deterministic simulation harness without touching caller
/// logic (§6.3's `llm`/`simulation`/`auto` mode selection).
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion provider returned an error: {0}")]
    Provider(String),
    #[error("completion timed out")]
    Timeout,
}

#[async_trait]
pub trait TextCompletionPort: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Hands a freshly-captured vote to the async validator bus (§4.7). Defined
/// here, not in `deliberation`, so `vote-validator` can implement it without
/// depending on `deliberation` at all — the two crates only share this
/// trait and the plain data in `vote`/`ids`.
#[async_trait]
pub trait VoteValidationDispatchPort: Send + Sync {
    async fn dispatch_for_validation(&self, vote: &Vote);
}

#[derive(Debug, thiserror::Error)]
#[error("reconciliation incomplete for motion {motion_id}: validation still pending for {pending} vote(s)")]
pub struct ReconciliationIncomplete {
    pub motion_id: MotionId,
    pub pending: usize,
}

/// The reconciliation gate (§4.7, P2): blocks adjournment until every vote
/// under a motion has reached `validated` or `dlq_fallback_applied`. Never
/// silently succeeds — a timeout is always observable as an error.
#[async_trait]
pub trait ReconciliationPort: Send + Sync {
    async fn await_all_validations(
        &self,
        motion_id: MotionId,
        timeout: Duration,
    ) -> Result<(), ReconciliationIncomplete>;

    /// Registers a vote as needing reconciliation before the motion above it
    /// may adjourn. Called once per `VoteCast`, before the optimistic write.
    async fn register_pending(&self, motion_id: MotionId, vote_id: VoteId);
}
