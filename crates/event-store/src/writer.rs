use crate::halt_manager::HaltCessationManager;
use crate::store::{EventStore, StoreError};
use archon_crypto::{KeyId, KeyRegistry, KeyRegistryError, SigningError, SigningPort};
use archon_types::{
    AgentId, CanonicalJsonError, ContentHash, Event, EventType, HashableEventFields, ModeWatermark,
    WitnessAttribution,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use witness_pool::{compute_seed, select_witnesses, SelectionError};

const WITNESS_ATTESTATION_MAX_ROUNDS: u32 = 3;
/// How many past selections a witness is excluded from appearing in again
/// (§4.5's "cooldown exclusion", sized independent of the anomaly window).
const WITNESS_COOLDOWN_DEPTH: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error("a halt is in effect and {0:?} is not on the halt allowlist")]
    HaltViolation(EventType),
    #[error("cessation has been executed; no further events may be appended")]
    CessationActive,
    #[error(transparent)]
    WitnessSelection(#[from] SelectionError),
    #[error("witness {witness} failed to attest after {rounds} reselection rounds")]
    AttestationExhausted { witness: AgentId, rounds: u32 },
    #[error(transparent)]
    KeyRegistry(#[from] KeyRegistryError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Canonicalization(#[from] CanonicalJsonError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum AttestationError {
    #[error("witness declined or timed out")]
    Declined,
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    KeyRegistry(#[from] KeyRegistryError),
}

/// External witness attestation (§4.4/§4.5): in a real deployment the
/// selected witness is a separate process that countersigns out of band.
/// This is the seam that code stands behind.
#[async_trait]
pub trait WitnessAttestationPort: Send + Sync {
    async fn request_attestation(
        &self,
        witness: &AgentId,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<Vec<u8>, AttestationError>;
}

/// Co-located attestor for development and tests: witnesses are simulated
/// in-process, each with its own key registered under its `AgentId`. A
/// production deployment replaces this with an RPC to the witness's own
/// signing service.
pub struct LocalWitnessAttestor {
    signing: Arc<dyn SigningPort>,
    key_registry: Arc<KeyRegistry>,
}

impl LocalWitnessAttestor {
    pub fn new(signing: Arc<dyn SigningPort>, key_registry: Arc<KeyRegistry>) -> Self {
        Self {
            signing,
            key_registry,
        }
    }
}

#[async_trait]
impl WitnessAttestationPort for LocalWitnessAttestor {
    async fn request_attestation(
        &self,
        witness: &AgentId,
        bytes: &[u8],
        at: DateTime<Utc>,
    ) -> Result<Vec<u8>, AttestationError> {
        let record = self.key_registry.get_active_key_at(witness, at)?;
        Ok(self.signing.sign(record.key_id, bytes).await?)
    }
}

/// Derived-topic fan-out (§4.1 step 11): observer feed, validator bus, etc.
/// each implement this and are notified once per committed event, after the
/// store write succeeds.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event(&self, event: &Event);
}

/// Static description of the current witness pool, supplied by whatever
/// governs pool membership (out of scope here, §1).
#[derive(Debug, Clone)]
pub struct WitnessPoolConfig {
    pub active_pool: Vec<AgentId>,
    pub minimum_viable: usize,
}

#[derive(Serialize)]
struct SignaturePayload {
    content_hash: ContentHash,
    prev_hash: ContentHash,
    mode_watermark: ModeWatermark,
}

#[derive(Serialize)]
struct AttestationPayload {
    selection_content_hash: ContentHash,
    main_content_hash: ContentHash,
    mode_watermark: ModeWatermark,
}

#[derive(Serialize)]
struct WitnessSelectedPayload {
    selected: Vec<AgentId>,
    seed: String,
}

struct WriterState {
    recent_selection_hashes: VecDeque<ContentHash>,
    cooldown: VecDeque<Vec<AgentId>>,
}

/// Implements the append algorithm of §4.1: halt/cessation gate, witness
/// selection, dual signing (proposer + witnesses), atomic commit of the
/// `WitnessSelected` sub-event alongside the main event, then sink fan-out.
/// Serialized end to end by `lock`, mirroring a single-writer log.
pub struct WitnessedEventWriter {
    store: Arc<dyn EventStore>,
    halt_manager: Arc<HaltCessationManager>,
    signing: Arc<dyn SigningPort>,
    key_registry: Arc<KeyRegistry>,
    attestor: Arc<dyn WitnessAttestationPort>,
    pool: WitnessPoolConfig,
    sinks: Vec<Arc<dyn EventSink>>,
    writer_agent_id: AgentId,
    lock: AsyncMutex<WriterState>,
}

impl WitnessedEventWriter {
    pub fn new(
        store: Arc<dyn EventStore>,
        halt_manager: Arc<HaltCessationManager>,
        signing: Arc<dyn SigningPort>,
        key_registry: Arc<KeyRegistry>,
        attestor: Arc<dyn WitnessAttestationPort>,
        pool: WitnessPoolConfig,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            store,
            halt_manager,
            signing,
            key_registry,
            attestor,
            pool,
            sinks,
            writer_agent_id: AgentId::system("event-store"),
            lock: AsyncMutex::new(WriterState {
                recent_selection_hashes: VecDeque::with_capacity(2),
                cooldown: VecDeque::with_capacity(WITNESS_COOLDOWN_DEPTH),
            }),
        }
    }

    pub async fn append(
        &self,
        event_type: EventType,
        payload: serde_json::Value,
        agent_id: AgentId,
        authority_timestamp: DateTime<Utc>,
    ) -> Result<Event, AppendError> {
        let _timer = crate::metrics::APPEND_LATENCY_SECONDS.start_timer();
        if self.halt_manager.is_cessated() && event_type != EventType::CessationExecuted {
            return Err(AppendError::CessationActive);
        }
        if self.halt_manager.is_effectively_halted().await && !event_type.is_halt_permitted() {
            return Err(AppendError::HaltViolation(event_type));
        }

        let mut state = self.lock.lock().await;

        let head = self.store.head().await;
        let (head_sequence, head_hash) = match &head {
            Some(event) => (event.sequence, event.content_hash),
            None => (0, ContentHash::genesis_anchor()),
        };
        let selection_sequence = head_sequence + 1;
        let main_sequence = head_sequence + 2;

        let excluded: HashSet<AgentId> = state.cooldown.iter().flatten().cloned().collect();
        let recent: Vec<ContentHash> = state.recent_selection_hashes.iter().copied().collect();
        let seed = compute_seed(head_hash, &recent);
        let selected = select_witnesses(seed, &self.pool.active_pool, &excluded, self.pool.minimum_viable)?;

        let selection_payload = serde_json::to_value(WitnessSelectedPayload {
            selected: selected.clone(),
            seed: seed.to_hex(),
        })?;
        let selection_fields = HashableEventFields {
            sequence: selection_sequence,
            event_type: EventType::WitnessSelected,
            payload: &selection_payload,
            agent_id: &self.writer_agent_id,
            authority_timestamp,
            prev_hash: head_hash,
        };
        let selection_content_hash = selection_fields.content_hash()?;

        let main_fields = HashableEventFields {
            sequence: main_sequence,
            event_type,
            payload: &payload,
            agent_id: &agent_id,
            authority_timestamp,
            prev_hash: selection_content_hash,
        };
        let main_content_hash = main_fields.content_hash()?;

        let mode_watermark = self.signing.get_mode().watermark();

        let attestation_payload = serde_json::to_vec(&AttestationPayload {
            selection_content_hash,
            main_content_hash,
            mode_watermark,
        })?;
        let witness_attributions = self
            .collect_attestations(selected.clone(), &attestation_payload, authority_timestamp, seed, &excluded)
            .await?;

        let proposer_key = self.key_registry.get_active_key_at(&agent_id, authority_timestamp)?;
        let main_signature_bytes = serde_json::to_vec(&SignaturePayload {
            content_hash: main_content_hash,
            prev_hash: selection_content_hash,
            mode_watermark,
        })?;
        let main_signature = self.signing.sign(proposer_key.key_id, &main_signature_bytes).await?;

        let writer_key = self
            .key_registry
            .get_active_key_at(&self.writer_agent_id, authority_timestamp)?;
        let selection_signature_bytes = serde_json::to_vec(&SignaturePayload {
            content_hash: selection_content_hash,
            prev_hash: head_hash,
            mode_watermark,
        })?;
        let selection_signature = self
            .signing
            .sign(writer_key.key_id, &selection_signature_bytes)
            .await?;

        let selection_event = Event {
            sequence: selection_sequence,
            event_type: EventType::WitnessSelected,
            payload: selection_payload,
            agent_id: self.writer_agent_id.clone(),
            authority_timestamp,
            prev_hash: head_hash,
            content_hash: selection_content_hash,
            signature: selection_signature,
            witness_attributions: witness_attributions.clone(),
            mode_watermark,
        };
        let main_event = Event {
            sequence: main_sequence,
            event_type,
            payload,
            agent_id,
            authority_timestamp,
            prev_hash: selection_content_hash,
            content_hash: main_content_hash,
            signature: main_signature,
            witness_attributions,
            mode_watermark,
        };

        self.store
            .append_batch(vec![selection_event.clone(), main_event.clone()])
            .await?;

        state.recent_selection_hashes.push_back(selection_content_hash);
        if state.recent_selection_hashes.len() > 2 {
            state.recent_selection_hashes.pop_front();
        }
        state.cooldown.push_back(selected);
        if state.cooldown.len() > WITNESS_COOLDOWN_DEPTH {
            state.cooldown.pop_front();
        }
        drop(state);

        for sink in &self.sinks {
            sink.on_event(&selection_event).await;
            sink.on_event(&main_event).await;
        }

        Ok(main_event)
    }

    /// §4.1 step 11 failure semantics: a witness that fails to attest is
    /// dropped and the writer reselects around it, up to
    /// `WITNESS_ATTESTATION_MAX_ROUNDS`, rather than lowering the floor.
    async fn collect_attestations(
        &self,
        mut selected: Vec<AgentId>,
        bytes: &[u8],
        at: DateTime<Utc>,
        seed: ContentHash,
        base_excluded: &HashSet<AgentId>,
    ) -> Result<Vec<WitnessAttribution>, AppendError> {
        let mut excluded = base_excluded.clone();
        for round in 0..WITNESS_ATTESTATION_MAX_ROUNDS {
            let mut attributions = Vec::with_capacity(selected.len());
            let mut failed: Option<AgentId> = None;
            for witness in &selected {
                match self.attestor.request_attestation(witness, bytes, at).await {
                    Ok(signature) => attributions.push(WitnessAttribution {
                        witness_id: witness.clone(),
                        witness_signature: signature,
                    }),
                    Err(_) => {
                        failed = Some(witness.clone());
                        break;
                    }
                }
            }
            match failed {
                None => return Ok(attributions),
                Some(witness) => {
                    if round + 1 == WITNESS_ATTESTATION_MAX_ROUNDS {
                        return Err(AppendError::AttestationExhausted {
                            witness,
                            rounds: WITNESS_ATTESTATION_MAX_ROUNDS,
                        });
                    }
                    excluded.insert(witness);
                    selected = select_witnesses(seed, &self.pool.active_pool, &excluded, selected.len())?;
                }
            }
        }
        unreachable!("loop always returns or errors before exhausting its range")
    }
}
