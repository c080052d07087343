//! Structured breach declarations and their automatic 7-day escalation
//! clock (§4.14).

use archon_types::{AgentId, BreachId, Event, EventType};
use chrono::{DateTime, Duration, Utc};
use event_store::{AppendError, EventStore, WitnessedEventWriter};
use std::sync::Arc;

pub const ESCALATION_WINDOW: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachType {
    IntegrityViolation,
    UnresolvedEmergenceViolation,
    WitnessPoolBelowMinimum,
    Other,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Breach {
    pub breach_id: BreachId,
    pub breach_type: BreachType,
    pub threshold: String,
    pub declared_at: DateTime<Utc>,
    pub escalation_deadline: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum BreachError {
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error("failed to encode breach payload: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Writes `BreachDeclared`/`BreachEscalated` events and reconstructs open
/// breaches by scanning the log — there is no private registry to fall out
/// of sync with the witnessed record.
pub struct BreachRegistry {
    store: Arc<dyn EventStore>,
    writer: Arc<WitnessedEventWriter>,
    writer_agent_id: AgentId,
}

impl BreachRegistry {
    pub fn new(store: Arc<dyn EventStore>, writer: Arc<WitnessedEventWriter>) -> Self {
        Self {
            store,
            writer,
            writer_agent_id: AgentId::system("governance-audit"),
        }
    }

    pub async fn declare(
        &self,
        breach_type: BreachType,
        threshold: String,
        now: DateTime<Utc>,
    ) -> Result<Breach, BreachError> {
        let breach = Breach {
            breach_id: BreachId::new(),
            breach_type,
            threshold,
            declared_at: now,
            escalation_deadline: now + ESCALATION_WINDOW,
        };
        let payload = serde_json::to_value(&breach)?;
        self.writer
            .append(EventType::BreachDeclared, payload, self.writer_agent_id.clone(), now)
            .await?;
        tracing::error!(breach_id = %breach.breach_id, ?breach_type, "breach declared");
        Ok(breach)
    }

    async fn all_events(&self, event_type: EventType) -> Vec<Event> {
        let head = self.store.head().await.map(|e| e.sequence).unwrap_or(0);
        if head == 0 {
            return Vec::new();
        }
        self.store
            .range(1, head)
            .await
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Breaches declared but not yet escalated, whose 7-day clock has
    /// already expired as of `now`.
    pub async fn overdue_for_escalation(&self, now: DateTime<Utc>) -> Vec<Breach> {
        let declared: Vec<Breach> = self
            .all_events(EventType::BreachDeclared)
            .await
            .iter()
            .filter_map(|e| serde_json::from_value::<Breach>(e.payload.clone()).ok())
            .collect();
        let escalated_ids: std::collections::HashSet<BreachId> = self
            .all_events(EventType::BreachEscalated)
            .await
            .iter()
            .filter_map(|e| e.payload.get("breach_id").cloned())
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        declared
            .into_iter()
            .filter(|b| !escalated_ids.contains(&b.breach_id))
            .filter(|b| now >= b.escalation_deadline)
            .collect()
    }

    /// Escalates a breach to the cessation agenda at its deadline (§4.14:
    /// "escalation to the cessation agenda is automatic at deadline").
    pub async fn escalate(&self, breach: &Breach, now: DateTime<Utc>) -> Result<(), BreachError> {
        let payload = serde_json::json!({
            "breach_id": breach.breach_id,
            "breach_type": breach.breach_type,
            "declared_at": breach.declared_at,
            "escalated_at": now,
        });
        self.writer
            .append(EventType::BreachEscalated, payload, self.writer_agent_id.clone(), now)
            .await?;
        tracing::error!(breach_id = %breach.breach_id, "breach escalated to the cessation agenda");
        Ok(())
    }

    /// Scans for every overdue breach and escalates it; returns the ids
    /// escalated. Intended to be called periodically (or on demand by the
    /// CLI) rather than driven by an in-process scheduler the spec does not
    /// describe (§9: no ambient configuration invents behavior).
    pub async fn run_escalation_sweep(&self, now: DateTime<Utc>) -> Result<Vec<BreachId>, BreachError> {
        let mut escalated = Vec::new();
        for breach in self.overdue_for_escalation(now).await {
            self.escalate(&breach, now).await?;
            escalated.push(breach.breach_id);
        }
        Ok(escalated)
    }
}
