//! Cost snapshot (§4.14): a pure read over the witnessed log, surfaced "at
//! every major cycle boundary" and "announced publicly at cycle opening".
//! Deliberately not wired to an in-process scheduler — the spec describes
//! a publication *cadence*, not a concrete trigger, so this is callable on
//! demand by the CLI (§15) rather than inventing one.

use archon_types::{Event, EventType, MotionId};
use event_store::EventStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CostSnapshot {
    pub override_count: u64,
    pub breach_count: u64,
    pub failed_continuation_count: u64,
    pub unclosed_cycles: u64,
    pub dissolution_events: u64,
}

impl CostSnapshot {
    /// `at_cycle_open(event_store)`: scans the full witnessed log once and
    /// folds it into the five published counters.
    ///
    /// - `override_count` / `breach_count`: total `OverrideInvoked` /
    ///   `BreachDeclared` events ever witnessed.
    /// - `failed_continuation_count`: total `MotionFailed` events — a
    ///   motion that failed is a deliberation cycle that did not continue
    ///   to ratification.
    /// - `unclosed_cycles`: motions with a `MotionProposed` event but no
    ///   terminal `MotionRatified`/`MotionFailed` yet (the motion status
    ///   machine's terminal states, §3.1).
    /// - `dissolution_events`: `CessationExecuted` events (0 or 1 by I8).
    pub async fn at_cycle_open(store: Arc<dyn EventStore>) -> Self {
        let head = store.head().await.map(|e| e.sequence).unwrap_or(0);
        if head == 0 {
            return Self::default();
        }
        let events: Vec<Event> = store.range(1, head).await;

        let mut snapshot = Self::default();
        let mut proposed: HashSet<MotionId> = HashSet::new();
        let mut terminal: HashSet<MotionId> = HashSet::new();

        for event in &events {
            match event.event_type {
                EventType::OverrideInvoked => snapshot.override_count += 1,
                EventType::BreachDeclared => snapshot.breach_count += 1,
                EventType::MotionFailed => {
                    snapshot.failed_continuation_count += 1;
                    if let Some(id) = motion_id_of(event) {
                        terminal.insert(id);
                    }
                }
                EventType::MotionRatified => {
                    if let Some(id) = motion_id_of(event) {
                        terminal.insert(id);
                    }
                }
                EventType::MotionProposed => {
                    if let Some(id) = motion_id_of(event) {
                        proposed.insert(id);
                    }
                }
                EventType::CessationExecuted => snapshot.dissolution_events += 1,
                _ => {}
            }
        }

        snapshot.unclosed_cycles = proposed.difference(&terminal).count() as u64;
        snapshot
    }
}

fn motion_id_of(event: &Event) -> Option<MotionId> {
    serde_json::from_value(event.payload.get("motion_id")?.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_types::AgentId;
    use chrono::Utc;
    use event_store::InMemoryEventStore;

    fn event(sequence: u64, event_type: EventType, payload: serde_json::Value) -> Event {
        Event {
            sequence,
            event_type,
            payload,
            agent_id: AgentId::system("test"),
            authority_timestamp: Utc::now(),
            prev_hash: archon_types::ContentHash::genesis_anchor(),
            content_hash: archon_types::ContentHash::genesis_anchor(),
            signature: vec![],
            witness_attributions: vec![archon_types::WitnessAttribution {
                witness_id: AgentId::system("w"),
                witness_signature: vec![],
            }],
            mode_watermark: archon_types::ModeWatermark::DevStub,
        }
    }

    #[tokio::test]
    async fn counts_unclosed_cycles_and_terminal_motions_separately() {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let m1 = MotionId::new();
        let m2 = MotionId::new();
        store
            .append_batch(vec![
                event(1, EventType::MotionProposed, serde_json::json!({"motion_id": m1})),
                event(2, EventType::MotionProposed, serde_json::json!({"motion_id": m2})),
                event(3, EventType::MotionRatified, serde_json::json!({"motion_id": m1})),
            ])
            .await
            .unwrap();

        let snapshot = CostSnapshot::at_cycle_open(store).await;
        assert_eq!(snapshot.unclosed_cycles, 1);
        assert_eq!(snapshot.failed_continuation_count, 0);
    }

    #[tokio::test]
    async fn empty_store_is_all_zeros() {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        assert_eq!(CostSnapshot::at_cycle_open(store).await, CostSnapshot::default());
    }
}
