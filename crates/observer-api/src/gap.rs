//! Gap reconciliation (§4.12): an observer that notices a hole in the
//! sequence it is replaying reports it here. The primary store is the
//! source of truth — a confirmed gap on the primary side is an integrity
//! violation, not a replication hiccup, and escalates straight to halt
//! rather than waiting for the next scheduled verifier run.

use archon_types::AgentId;
use chrono::{DateTime, Utc};
use event_store::{HaltCessationManager, HaltError, HashChainVerifier, IntegrityViolation};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapOutcome {
    /// The primary store has no gap in this range; the observer's local
    /// replica is what's behind, not the record.
    NotConfirmed,
    /// The primary store itself is missing events in this range. A halt was
    /// triggered (or one was already open).
    ConfirmedAndHalted,
}

#[derive(Debug, thiserror::Error)]
pub enum GapError {
    #[error(transparent)]
    Halt(#[from] HaltError),
}

pub struct GapReconciler {
    verifier: Arc<HashChainVerifier>,
    halt_manager: Arc<HaltCessationManager>,
    reporter_agent_id: AgentId,
}

impl GapReconciler {
    pub fn new(verifier: Arc<HashChainVerifier>, halt_manager: Arc<HaltCessationManager>) -> Self {
        Self {
            verifier,
            halt_manager,
            reporter_agent_id: AgentId::system("observer-api"),
        }
    }

    /// `from`/`to` is the range the observer believes it is missing,
    /// inclusive. Re-verifies against the primary store; a confirmed gap (or
    /// any other integrity violation surfaced along the way, since a missing
    /// range and a tampered chain both warrant the same response) triggers a
    /// halt on the `integrity_violation` reason.
    pub async fn report_observed_gap(&self, from: u64, to: u64, now: DateTime<Utc>) -> Result<GapOutcome, GapError> {
        let report = self.verifier.verify(from, to).await;
        let confirmed = report
            .violations
            .iter()
            .any(|v| matches!(v, IntegrityViolation::Gap { .. }));

        if !confirmed {
            return Ok(GapOutcome::NotConfirmed);
        }

        match self
            .halt_manager
            .trigger_halt("integrity_violation: confirmed primary-side event gap", self.reporter_agent_id.clone(), now)
            .await
        {
            Ok(()) | Err(HaltError::CessationIrreversible) => Ok(GapOutcome::ConfirmedAndHalted),
            Err(other) => Err(other.into()),
        }
    }
}
