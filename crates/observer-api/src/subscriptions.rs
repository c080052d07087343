//! Webhook subscriptions (§4.12's "subscriber notification" surface): an
//! `EventSink` that fans committed events out to registered webhook URLs.
//! The actual delivery transport is a port, the same way witness
//! attestation and text completion are ports elsewhere in this workspace —
//! this crate does not bundle an HTTP client, it calls out through
//! `WebhookDispatchPort` and lets the binary wire a real one in.

use archon_types::{Event, EventType};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait WebhookDispatchPort: Send + Sync {
    async fn deliver(&self, url: &str, event: &Event);
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub url: String,
    /// Empty means "every event type".
    pub event_types: Vec<EventType>,
}

impl Subscription {
    fn matches(&self, event_type: EventType) -> bool {
        self.event_types.is_empty() || self.event_types.contains(&event_type)
    }
}

/// In-memory subscriber registry, consulted on every committed event.
/// Registration is not itself a witnessed act (§6.2's closed vocabulary has
/// no event type for it) — it is an observer-side convenience, not part of
/// the constitutional record.
pub struct WebhookRegistry {
    subscriptions: RwLock<HashMap<Uuid, Subscription>>,
    dispatcher: Arc<dyn WebhookDispatchPort>,
}

impl WebhookRegistry {
    pub fn new(dispatcher: Arc<dyn WebhookDispatchPort>) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            dispatcher,
        }
    }

    pub fn subscribe(&self, url: String, event_types: Vec<EventType>) -> Uuid {
        let subscription_id = Uuid::new_v4();
        self.subscriptions.write().insert(
            subscription_id,
            Subscription {
                subscription_id,
                url,
                event_types,
            },
        );
        subscription_id
    }

    pub fn unsubscribe(&self, subscription_id: Uuid) -> bool {
        self.subscriptions.write().remove(&subscription_id).is_some()
    }

    pub fn list(&self) -> Vec<Subscription> {
        self.subscriptions.read().values().cloned().collect()
    }
}

#[async_trait]
impl event_store::EventSink for WebhookRegistry {
    async fn on_event(&self, event: &Event) {
        let matching: Vec<Subscription> = self
            .subscriptions
            .read()
            .values()
            .filter(|sub| sub.matches(event.event_type))
            .cloned()
            .collect();
        for subscription in matching {
            self.dispatcher.deliver(&subscription.url, event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_types::AgentId;
    use chrono::Utc;
    use event_store::EventSink;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebhookDispatchPort for RecordingDispatcher {
        async fn deliver(&self, url: &str, _event: &Event) {
            self.delivered.lock().await.push(url.to_string());
        }
    }

    fn event(event_type: EventType) -> Event {
        Event {
            sequence: 1,
            event_type,
            payload: serde_json::json!({}),
            agent_id: AgentId::system("test"),
            authority_timestamp: Utc::now(),
            prev_hash: archon_types::ContentHash::genesis_anchor(),
            content_hash: archon_types::ContentHash::genesis_anchor(),
            signature: vec![],
            witness_attributions: vec![],
            mode_watermark: archon_types::ModeWatermark::DevStub,
        }
    }

    #[tokio::test]
    async fn unfiltered_subscription_receives_every_event_type() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let registry = WebhookRegistry::new(dispatcher.clone());
        registry.subscribe("https://example.test/hook".into(), vec![]);

        registry.on_event(&event(EventType::BreachDeclared)).await;
        assert_eq!(dispatcher.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn filtered_subscription_ignores_other_event_types() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let registry = WebhookRegistry::new(dispatcher.clone());
        registry.subscribe("https://example.test/hook".into(), vec![EventType::HaltTriggered]);

        registry.on_event(&event(EventType::BreachDeclared)).await;
        assert!(dispatcher.delivered.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unsubscribing_stops_future_delivery() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let registry = WebhookRegistry::new(dispatcher.clone());
        let id = registry.subscribe("https://example.test/hook".into(), vec![]);
        assert!(registry.unsubscribe(id));

        registry.on_event(&event(EventType::BreachDeclared)).await;
        assert!(dispatcher.delivered.lock().await.is_empty());
    }
}
