use crate::store::EventStore;
use archon_crypto::{verify_detached, KeyRegistry};
use archon_types::{ContentHash, Event};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// A sequence number is missing between two committed events.
    Gap { expected: u64, found: u64 },
    HashMismatch { sequence: u64 },
    /// I3: the event carries no witness attribution at all.
    MissingWitnesses { sequence: u64 },
    SignatureInvalid { sequence: u64 },
    /// I4: the signing key was not active (per the registry) at
    /// `authority_timestamp`.
    TemporalViolation { sequence: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub events_checked: u64,
    pub violations: Vec<IntegrityViolation>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// §4.2: walks `[from, to]` recomputing the hash chain and checking
/// signatures/witnesses/temporal validity against the key registry. Run at
/// startup; a non-clean report must halt the process rather than continue
/// on a record nobody can trust (§4.3).
pub struct HashChainVerifier {
    store: Arc<dyn EventStore>,
    key_registry: Arc<KeyRegistry>,
}

impl HashChainVerifier {
    pub fn new(store: Arc<dyn EventStore>, key_registry: Arc<KeyRegistry>) -> Self {
        Self { store, key_registry }
    }

    pub async fn verify(&self, from: u64, to: u64) -> VerificationReport {
        let mut report = VerificationReport::default();
        let events = self.store.range(from, to).await;

        let mut expected_sequence = from;
        let mut previous: Option<Event> = None;

        for event in &events {
            report.events_checked += 1;

            if event.sequence != expected_sequence {
                report.violations.push(IntegrityViolation::Gap {
                    expected: expected_sequence,
                    found: event.sequence,
                });
            }
            expected_sequence = event.sequence + 1;

            let expected_prev_hash = match &previous {
                Some(prior) => prior.content_hash,
                None => event.prev_hash,
            };
            if event.prev_hash != expected_prev_hash {
                report.violations.push(IntegrityViolation::HashMismatch { sequence: event.sequence });
            } else if let Ok(recomputed) = event.hashable_fields().content_hash() {
                if recomputed != event.content_hash {
                    report.violations.push(IntegrityViolation::HashMismatch { sequence: event.sequence });
                }
            } else {
                report.violations.push(IntegrityViolation::HashMismatch { sequence: event.sequence });
            }

            if !event.is_witnessed() {
                report.violations.push(IntegrityViolation::MissingWitnesses { sequence: event.sequence });
            }

            match self
                .key_registry
                .get_active_key_at(&event.agent_id, event.authority_timestamp)
            {
                Ok(record) => {
                    let bytes = match serde_json::to_vec(&SignaturePayloadView {
                        content_hash: event.content_hash,
                        prev_hash: event.prev_hash,
                        mode_watermark: event.mode_watermark,
                    }) {
                        Ok(bytes) => bytes,
                        Err(_) => {
                            report.violations.push(IntegrityViolation::SignatureInvalid { sequence: event.sequence });
                            previous = Some(event.clone());
                            continue;
                        }
                    };
                    match verify_detached(&record.public_key_bytes, &bytes, &event.signature) {
                        Ok(true) => {}
                        _ => report.violations.push(IntegrityViolation::SignatureInvalid { sequence: event.sequence }),
                    }
                }
                Err(_) => report.violations.push(IntegrityViolation::TemporalViolation { sequence: event.sequence }),
            }

            previous = Some(event.clone());
        }

        report
    }
}

#[derive(serde::Serialize)]
struct SignaturePayloadView {
    content_hash: ContentHash,
    prev_hash: ContentHash,
    mode_watermark: archon_types::ModeWatermark,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEventStore;
    use archon_crypto::{Ed25519Signer, KeyId, Mode, SigningPort};
    use archon_types::{AgentId, EventType, HashableEventFields, ModeWatermark, WitnessAttribution};
    use chrono::Utc;

    async fn make_signed_event(
        signer: &Ed25519Signer,
        key_id: KeyId,
        sequence: u64,
        prev_hash: ContentHash,
        agent_id: AgentId,
    ) -> Event {
        let payload = serde_json::json!({"n": sequence});
        let authority_timestamp = Utc::now();
        let fields = HashableEventFields {
            sequence,
            event_type: EventType::StatementMade,
            payload: &payload,
            agent_id: &agent_id,
            authority_timestamp,
            prev_hash,
        };
        let content_hash = fields.content_hash().unwrap();
        let bytes = serde_json::to_vec(&SignaturePayloadView {
            content_hash,
            prev_hash,
            mode_watermark: ModeWatermark::DevStub,
        })
        .unwrap();
        let signature = signer.sign(key_id, &bytes).await.unwrap();
        Event {
            sequence,
            event_type: EventType::StatementMade,
            payload,
            agent_id,
            authority_timestamp,
            prev_hash,
            content_hash,
            signature,
            witness_attributions: vec![WitnessAttribution {
                witness_id: AgentId::agent(uuid::Uuid::new_v4()),
                witness_signature: vec![1, 2, 3],
            }],
            mode_watermark: ModeWatermark::DevStub,
        }
    }

    #[tokio::test]
    async fn clean_chain_reports_no_violations() {
        let store = Arc::new(InMemoryEventStore::new());
        let signer = Ed25519Signer::new(Mode::Development);
        let (key_id, public_key) = signer.generate_keypair().await.unwrap();
        let key_registry = Arc::new(KeyRegistry::new());
        let agent_id = AgentId::agent(uuid::Uuid::new_v4());
        key_registry.register(agent_id.clone(), key_id, public_key, Utc::now() - chrono::Duration::days(1));

        let e1 = make_signed_event(&signer, key_id, 1, ContentHash::genesis_anchor(), agent_id.clone()).await;
        let e2 = make_signed_event(&signer, key_id, 2, e1.content_hash, agent_id.clone()).await;
        store.append_batch(vec![e1, e2]).await.unwrap();

        let verifier = HashChainVerifier::new(store, key_registry);
        let report = verifier.verify(1, 2).await;
        assert!(report.is_clean(), "{:?}", report.violations);
    }

    #[tokio::test]
    async fn detects_a_sequence_gap() {
        let store = Arc::new(InMemoryEventStore::new());
        let signer = Ed25519Signer::new(Mode::Development);
        let (key_id, public_key) = signer.generate_keypair().await.unwrap();
        let key_registry = Arc::new(KeyRegistry::new());
        let agent_id = AgentId::agent(uuid::Uuid::new_v4());
        key_registry.register(agent_id.clone(), key_id, public_key, Utc::now() - chrono::Duration::days(1));

        let e1 = make_signed_event(&signer, key_id, 1, ContentHash::genesis_anchor(), agent_id.clone()).await;
        let e3 = make_signed_event(&signer, key_id, 3, e1.content_hash, agent_id).await;
        store.append_batch(vec![e1, e3]).await.unwrap();

        let verifier = HashChainVerifier::new(store, key_registry);
        let report = verifier.verify(1, 3).await;
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, IntegrityViolation::Gap { expected: 2, found: 3 })));
    }

    #[tokio::test]
    async fn detects_a_tampered_content_hash() {
        let store = Arc::new(InMemoryEventStore::new());
        let signer = Ed25519Signer::new(Mode::Development);
        let (key_id, public_key) = signer.generate_keypair().await.unwrap();
        let key_registry = Arc::new(KeyRegistry::new());
        let agent_id = AgentId::agent(uuid::Uuid::new_v4());
        key_registry.register(agent_id.clone(), key_id, public_key, Utc::now() - chrono::Duration::days(1));

        let mut e1 = make_signed_event(&signer, key_id, 1, ContentHash::genesis_anchor(), agent_id).await;
        e1.payload = serde_json::json!({"tampered": true});
        store.append_batch(vec![e1]).await.unwrap();

        let verifier = HashChainVerifier::new(store, key_registry);
        let report = verifier.verify(1, 1).await;
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, IntegrityViolation::HashMismatch { sequence: 1 })));
    }
}
