use archon_types::{AgentId, Event, EventType, MotionId, ReconciliationIncomplete, ReconciliationPort, VoteId};
use async_trait::async_trait;
use chrono::Utc;
use event_store::WitnessedEventWriter;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct MotionState {
    pending: HashSet<VoteId>,
    resolved: HashSet<VoteId>,
}

/// P2's adjournment gate: a motion cannot adjourn while any of its votes are
/// still awaiting validation or DLQ fallback. `register_pending` is called
/// at vote-capture time (before dispatch), `mark_validated`/
/// `mark_dlq_fallback` are called by the `ConsensusAggregator` once a vote's
/// round concludes either way.
pub struct ReconciliationGate {
    states: Mutex<HashMap<MotionId, MotionState>>,
    notify: Notify,
    writer: Arc<WitnessedEventWriter>,
    writer_agent_id: AgentId,
}

impl ReconciliationGate {
    pub fn new(writer: Arc<WitnessedEventWriter>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            writer,
            writer_agent_id: AgentId::system("vote-validator"),
        }
    }

    async fn resolve(&self, motion_id: MotionId, vote_id: VoteId) {
        let now_all_resolved = {
            let mut states = self.states.lock();
            let state = states.entry(motion_id).or_default();
            state.pending.remove(&vote_id);
            state.resolved.insert(vote_id);
            state.pending.is_empty()
        };
        crate::metrics::PENDING_VALIDATIONS.dec();
        self.notify.notify_waiters();
        if now_all_resolved {
            let payload = serde_json::json!({ "motion_id": motion_id });
            if let Err(err) = self
                .writer
                .append(EventType::ReconciliationComplete, payload, self.writer_agent_id.clone(), Utc::now())
                .await
            {
                tracing::error!(%motion_id, error = %err, "failed to record reconciliation completion");
            }
        }
    }

    pub async fn mark_validated(&self, motion_id: MotionId, vote_id: VoteId) {
        self.resolve(motion_id, vote_id).await;
    }

    pub async fn mark_dlq_fallback(&self, motion_id: MotionId, vote_id: VoteId) {
        self.resolve(motion_id, vote_id).await;
    }

    /// P4 idempotent replay: reconstructs pending/resolved state from the
    /// witnessed event stream after a restart, so an aggregator crash never
    /// loses track of a vote that was cast before the crash.
    pub fn rebuild_from_events(&self, events: &[Event]) {
        let mut states = self.states.lock();
        for event in events {
            match event.event_type {
                EventType::VoteCast => {
                    if let (Some(motion_id), Some(vote_id)) = (
                        event.payload.get("motion_id").and_then(parse_motion_id),
                        event.payload.get("vote_id").and_then(parse_vote_id),
                    ) {
                        states.entry(motion_id).or_default().pending.insert(vote_id);
                    }
                }
                EventType::VoteOverride | EventType::DlqFallback => {
                    if let (Some(motion_id), Some(vote_id)) = (
                        event.payload.get("motion_id").and_then(parse_motion_id),
                        event.payload.get("vote_id").and_then(parse_vote_id),
                    ) {
                        let state = states.entry(motion_id).or_default();
                        state.pending.remove(&vote_id);
                        state.resolved.insert(vote_id);
                    }
                }
                _ => {}
            }
        }
    }
}

fn parse_motion_id(value: &serde_json::Value) -> Option<MotionId> {
    serde_json::from_value(value.clone()).ok()
}

fn parse_vote_id(value: &serde_json::Value) -> Option<VoteId> {
    serde_json::from_value(value.clone()).ok()
}

#[async_trait]
impl ReconciliationPort for ReconciliationGate {
    async fn register_pending(&self, motion_id: MotionId, vote_id: VoteId) {
        self.states.lock().entry(motion_id).or_default().pending.insert(vote_id);
        crate::metrics::PENDING_VALIDATIONS.inc();
    }

    async fn await_all_validations(
        &self,
        motion_id: MotionId,
        timeout: Duration,
    ) -> Result<(), ReconciliationIncomplete> {
        let deadline = Instant::now() + timeout;
        loop {
            let pending = {
                let states = self.states.lock();
                states.get(&motion_id).map(|s| s.pending.len()).unwrap_or(0)
            };
            if pending == 0 {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ReconciliationIncomplete { motion_id, pending });
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wired_gate;

    #[tokio::test]
    async fn await_returns_immediately_once_all_votes_resolve() {
        let (gate, motion_id, vote_id) = wired_gate().await;
        gate.register_pending(motion_id, vote_id).await;

        let gate2 = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate2.mark_validated(motion_id, vote_id).await;
        });

        gate.await_all_validations(motion_id, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn await_times_out_when_a_vote_is_never_resolved() {
        let (gate, motion_id, vote_id) = wired_gate().await;
        gate.register_pending(motion_id, vote_id).await;

        let result = gate.await_all_validations(motion_id, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ReconciliationIncomplete { pending: 1, .. })));
    }

    #[tokio::test]
    async fn rebuild_from_events_restores_pending_state() {
        let (gate, motion_id, vote_id) = wired_gate().await;
        let cast_payload = serde_json::json!({ "motion_id": motion_id, "vote_id": vote_id });
        let events = vec![archon_types::Event {
            sequence: 1,
            event_type: EventType::VoteCast,
            payload: cast_payload,
            agent_id: AgentId::system("test"),
            authority_timestamp: Utc::now(),
            prev_hash: archon_types::ContentHash::genesis_anchor(),
            content_hash: archon_types::ContentHash::genesis_anchor(),
            signature: vec![],
            witness_attributions: vec![],
            mode_watermark: archon_types::ModeWatermark::DevStub,
        }];
        gate.rebuild_from_events(&events);

        let result = gate.await_all_validations(motion_id, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ReconciliationIncomplete { pending: 1, .. })));
    }
}
