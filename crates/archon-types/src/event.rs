use crate::canonical_json::{CanonicalJsonError, ContentHash};
use crate::ids::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed event-type vocabulary (§6.2). Unknown event types are
/// rejected at the writer (not representable as this enum at all, since
/// `serde` will fail to deserialize an unrecognized tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventType {
    MotionProposed,
    StatementMade,
    VoteCast,
    VoteOverride,
    ReconciliationComplete,
    MotionRatified,
    MotionFailed,
    HaltTriggered,
    HaltCleared,
    CessationExecuted,
    BreachDeclared,
    BreachEscalated,
    OverrideInvoked,
    KeyRegistered,
    KeyDeactivated,
    KeyEmergencyRevoked,
    CeremonyStarted,
    CeremonyWitnessed,
    CeremonyCompleted,
    WitnessSelected,
    ViolationFlagged,
    RemediationCompleted,
    TaskActivated,
    TaskAccepted,
    TaskDeclined,
    TaskReported,
    TaskClosed,
    TaskRejected,
    TaskQuarantined,
    DlqFallback,
    ProvenanceWeakMapping,
    AmbiguousTactic,
    IntegrityCaseGenerated,
}

impl EventType {
    /// I7 / RT-1: events permitted to append while a halt is open.
    pub const HALT_ALLOWLIST: &'static [EventType] = &[
        EventType::HaltCleared,
        EventType::CessationExecuted,
        EventType::BreachDeclared,
        EventType::IntegrityCaseGenerated,
    ];

    pub fn is_halt_permitted(self) -> bool {
        Self::HALT_ALLOWLIST.contains(&self)
    }
}

/// RT-1: signed content must carry an honest environment watermark so a
/// dev-mode signature can never be confused for a production one (I10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ModeWatermark {
    Production,
    DevStub,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessAttribution {
    pub witness_id: AgentId,
    pub witness_signature: Vec<u8>,
}

/// The fields that are hashed to produce `content_hash`. Kept as a separate
/// struct (rather than hashing `Event` itself) so the writer can compute the
/// hash before the signature and witness attributions exist (MA-2 chain
/// binding covers prev_hash; the signature covers content_hash ⧺ prev_hash ⧺
/// mode_watermark, computed one layer up in `archon-crypto`).
#[derive(Debug, Clone, Serialize)]
pub struct HashableEventFields<'a> {
    pub sequence: u64,
    pub event_type: EventType,
    pub payload: &'a serde_json::Value,
    pub agent_id: &'a AgentId,
    pub authority_timestamp: DateTime<Utc>,
    pub prev_hash: ContentHash,
}

impl<'a> HashableEventFields<'a> {
    pub fn content_hash(&self) -> Result<ContentHash, CanonicalJsonError> {
        ContentHash::of(self)
    }
}

/// The atomic unit of the constitutional record (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub agent_id: AgentId,
    pub authority_timestamp: DateTime<Utc>,
    pub prev_hash: ContentHash,
    pub content_hash: ContentHash,
    pub signature: Vec<u8>,
    pub witness_attributions: Vec<WitnessAttribution>,
    pub mode_watermark: ModeWatermark,
}

impl Event {
    pub fn hashable_fields(&self) -> HashableEventFields<'_> {
        HashableEventFields {
            sequence: self.sequence,
            event_type: self.event_type,
            payload: &self.payload,
            agent_id: &self.agent_id,
            authority_timestamp: self.authority_timestamp,
            prev_hash: self.prev_hash,
        }
    }

    /// I3: every event has at least one recorded witness attribution.
    pub fn is_witnessed(&self) -> bool {
        !self.witness_attributions.is_empty()
    }
}
