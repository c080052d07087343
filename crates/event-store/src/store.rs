use archon_types::Event;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sequence {0} is already occupied")]
    SequenceConflict(u64),
}

/// The append-only ledger itself (§3.1, §4.1). A production deployment backs
/// this with a table under a serializable transaction; `InMemoryEventStore`
/// gives the writer and the tests the same atomicity contract without one.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events land or none do (§4.1 step 10: the main event and its
    /// `WitnessSelected` sub-event commit together).
    async fn append_batch(&self, events: Vec<Event>) -> Result<(), StoreError>;
    async fn get(&self, sequence: u64) -> Option<Event>;
    async fn head(&self) -> Option<Event>;
    async fn range(&self, from: u64, to: u64) -> Vec<Event>;
    async fn len(&self) -> u64;
}

pub struct InMemoryEventStore {
    events: Mutex<BTreeMap<u64, Event>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_batch(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let mut guard = self.events.lock();
        for event in &events {
            if guard.contains_key(&event.sequence) {
                return Err(StoreError::SequenceConflict(event.sequence));
            }
        }
        for event in events {
            guard.insert(event.sequence, event);
        }
        Ok(())
    }

    async fn get(&self, sequence: u64) -> Option<Event> {
        self.events.lock().get(&sequence).cloned()
    }

    async fn head(&self) -> Option<Event> {
        self.events.lock().values().next_back().cloned()
    }

    async fn range(&self, from: u64, to: u64) -> Vec<Event> {
        if from > to {
            return Vec::new();
        }
        self.events
            .lock()
            .range(from..=to)
            .map(|(_, e)| e.clone())
            .collect()
    }

    async fn len(&self) -> u64 {
        self.events.lock().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_types::{AgentId, ContentHash, EventType, ModeWatermark};
    use chrono::Utc;

    fn event(sequence: u64) -> Event {
        Event {
            sequence,
            event_type: EventType::StatementMade,
            payload: serde_json::json!({}),
            agent_id: AgentId::system("test"),
            authority_timestamp: Utc::now(),
            prev_hash: ContentHash::genesis_anchor(),
            content_hash: ContentHash::genesis_anchor(),
            signature: vec![],
            witness_attributions: vec![],
            mode_watermark: ModeWatermark::DevStub,
        }
    }

    #[tokio::test]
    async fn head_is_the_highest_sequence() {
        let store = InMemoryEventStore::new();
        store.append_batch(vec![event(1), event(2)]).await.unwrap();
        assert_eq!(store.head().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn conflicting_sequence_rejects_the_whole_batch() {
        let store = InMemoryEventStore::new();
        store.append_batch(vec![event(1)]).await.unwrap();
        let result = store.append_batch(vec![event(2), event(1)]).await;
        assert!(matches!(result, Err(StoreError::SequenceConflict(1))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn range_is_inclusive() {
        let store = InMemoryEventStore::new();
        store
            .append_batch(vec![event(1), event(2), event(3)])
            .await
            .unwrap();
        assert_eq!(store.range(1, 2).await.len(), 2);
    }
}
