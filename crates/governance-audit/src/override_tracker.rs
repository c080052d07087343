//! Keeper override accounting (§4.11). Every override is witnessed *before*
//! it takes effect and counts against per-keeper thresholds that escalate
//! from an automatic incident log line to a hard block requiring a fresh
//! authorizing ceremony. The event vocabulary (§6.2) has no dedicated
//! "incident"/"warning"/"critical" event type, so threshold crossings are
//! carried as fields on the `OverrideInvoked` event itself and surfaced to
//! the caller as a `ThresholdStatus`, logged at the severity the crossing
//! warrants (§11: logs are operational signal alongside the witnessed
//! event, never a substitute for it).

use archon_types::{AgentId, Event, EventType};
use chrono::{DateTime, Duration, Utc};
use event_store::{AppendError, EventStore};
use std::sync::Arc;

/// §16 Open-Question decision 1: a reconciliation-forced adjournment is the
/// same `OverrideInvoked` event and counts against the same thresholds as
/// any other override, but carries the unresolved vote ids so the record is
/// self-describing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideKind {
    Arbitrary,
    ReconciliationForce { motion_id: archon_types::MotionId, unresolved_votes: Vec<archon_types::VoteId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThresholdStatus {
    Clear,
    /// >3 in a rolling day.
    DailyIncident,
    /// >=15 in a rolling 365d.
    AnnualWarning,
    /// >=18 in a rolling 365d: governance review required before the next
    /// override.
    AnnualCritical,
    /// >=20 in a rolling 365d: hard block, further overrides require an
    /// authorizing ceremony.
    HardBlocked,
}

const DAILY_INCIDENT_THRESHOLD: u64 = 3;
const ANNUAL_WARNING_THRESHOLD: u64 = 15;
const ANNUAL_CRITICAL_THRESHOLD: u64 = 18;
const ANNUAL_HARD_BLOCK_THRESHOLD: u64 = 20;
const ROLLING_DAY: Duration = Duration::hours(24);
const ROLLING_YEAR: Duration = Duration::days(365);

#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("keeper {keeper} has {count} overrides in the rolling 365d window; hard-blocked until an authorizing ceremony runs")]
    HardBlocked { keeper: AgentId, count: u64 },
    #[error(
        "keeper {keeper} has {count} overrides in the rolling 365d window; governance review is required before the next override"
    )]
    GovernanceReviewRequired { keeper: AgentId, count: u64 },
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error("failed to encode override payload: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Writes `OverrideInvoked` events and computes each keeper's rolling
/// counters by scanning the witnessed log (§9: "any traversal walks IDs and
/// re-reads" — no private counter state is trusted across a restart).
pub struct KeeperOverrideInvoker {
    store: Arc<dyn EventStore>,
    writer: Arc<event_store::WitnessedEventWriter>,
}

impl KeeperOverrideInvoker {
    pub fn new(store: Arc<dyn EventStore>, writer: Arc<event_store::WitnessedEventWriter>) -> Self {
        Self { store, writer }
    }

    async fn overrides_by(&self, keeper_id: &AgentId) -> Vec<DateTime<Utc>> {
        let head = self.store.head().await.map(|e| e.sequence).unwrap_or(0);
        if head == 0 {
            return Vec::new();
        }
        self.store
            .range(1, head)
            .await
            .into_iter()
            .filter(|e| e.event_type == EventType::OverrideInvoked)
            .filter(|e| event_keeper(e).as_ref() == Some(keeper_id))
            .map(|e| e.authority_timestamp)
            .collect()
    }

    /// Thresholds describe the count *including* the override about to be
    /// invoked (§4.11: "the 4th override in a day" is itself the incident,
    /// not the 5th) — so this counts prior history in each window and adds
    /// one for the invocation under evaluation.
    pub async fn threshold_status(&self, keeper_id: &AgentId, now: DateTime<Utc>) -> ThresholdStatus {
        let history = self.overrides_by(keeper_id).await;
        let annual = history.iter().filter(|t| now - **t < ROLLING_YEAR).count() as u64 + 1;
        let daily = history.iter().filter(|t| now - **t < ROLLING_DAY).count() as u64 + 1;

        if annual >= ANNUAL_HARD_BLOCK_THRESHOLD {
            ThresholdStatus::HardBlocked
        } else if annual >= ANNUAL_CRITICAL_THRESHOLD {
            ThresholdStatus::AnnualCritical
        } else if annual >= ANNUAL_WARNING_THRESHOLD {
            ThresholdStatus::AnnualWarning
        } else if daily > DAILY_INCIDENT_THRESHOLD {
            ThresholdStatus::DailyIncident
        } else {
            ThresholdStatus::Clear
        }
    }

    /// Writes the `OverrideInvoked` event *before* the override takes
    /// effect (§4.11 step 1), after checking the blocking thresholds. The
    /// spoken declaration field is mandatory: callers cannot invoke an
    /// override anonymously.
    #[allow(clippy::too_many_arguments)]
    pub async fn invoke(
        &self,
        keeper_id: AgentId,
        scope: String,
        duration: std::time::Duration,
        reason: String,
        spoken_declaration: String,
        kind: OverrideKind,
        ceremony_authorized: bool,
        governance_review_authorized: bool,
        now: DateTime<Utc>,
    ) -> Result<ThresholdStatus, OverrideError> {
        let status = self.threshold_status(&keeper_id, now).await;
        let count = || async {
            self.overrides_by(&keeper_id)
                .await
                .iter()
                .filter(|t| now - **t < ROLLING_YEAR)
                .count() as u64
                + 1
        };
        match status {
            ThresholdStatus::HardBlocked if !ceremony_authorized => {
                return Err(OverrideError::HardBlocked { keeper: keeper_id, count: count().await });
            }
            ThresholdStatus::AnnualCritical if !governance_review_authorized => {
                return Err(OverrideError::GovernanceReviewRequired { keeper: keeper_id, count: count().await });
            }
            ThresholdStatus::AnnualCritical | ThresholdStatus::HardBlocked => {
                // A ceremony-authorized HardBlocked, or a governance-review-
                // authorized AnnualCritical, is still a crossing worth
                // operational visibility even though it's gated above.
                tracing::error!(keeper = %keeper_id, ?status, "override invoked at or above the governance-review threshold");
            }
            ThresholdStatus::AnnualWarning => {
                tracing::warn!(keeper = %keeper_id, "override invoked at the annual warning threshold");
            }
            ThresholdStatus::DailyIncident => {
                tracing::warn!(keeper = %keeper_id, "override invoked above the daily incident threshold");
            }
            ThresholdStatus::Clear => {}
        }

        let payload = serde_json::json!({
            "keeper_id": keeper_id,
            "scope": scope,
            "duration_secs": duration.as_secs(),
            "reason": reason,
            "spoken_declaration": spoken_declaration,
            "kind": kind,
            "threshold_status": format!("{status:?}"),
        });
        self.writer
            .append(EventType::OverrideInvoked, payload, keeper_id, now)
            .await?;
        Ok(status)
    }
}

fn event_keeper(event: &Event) -> Option<AgentId> {
    serde_json::from_value(event.payload.get("keeper_id")?.clone()).ok()
}

/// §4.11: the spoken declaration is a required, non-empty field — silence
/// (an empty string) is never acceptance of attribution.
pub fn validate_spoken_declaration(declaration: &str) -> bool {
    !declaration.trim().is_empty()
}
