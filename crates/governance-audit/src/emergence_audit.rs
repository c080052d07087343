//! Quarterly emergence & language audit (§4.13). Scans a set of recent
//! public artifacts for forbidden emergence language, normalizing with NFKC
//! and case-folding before matching so formatting tricks (full-width
//! characters, mixed case) cannot dodge the scanner. Violations get a
//! 7-day remediation deadline; unresolved violations auto-escalate to a
//! constitutional breach, which then runs its own 7-day clock (§4.14).

use crate::breach::{BreachError, BreachRegistry, BreachType};
use archon_types::{first_emergence_match, AgentId, Event, EventType};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use event_store::{AppendError, EventStore, WitnessedEventWriter};
use std::collections::HashSet;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

pub const REMEDIATION_WINDOW: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// §16 Open-Question decision 3: the quarter containing `at`, as a
    /// closed `[start, end)` interval. The audit snapshots this window at
    /// scan start; a wall-clock rollover mid-scan does not retroactively
    /// change which quarter an in-flight scan belongs to.
    pub fn containing(at: DateTime<Utc>) -> (Quarter, DateTime<Utc>, DateTime<Utc>) {
        let year = at.year();
        let month = at.month();
        let (quarter, start_month) = match month {
            1..=3 => (Quarter::Q1, 1),
            4..=6 => (Quarter::Q2, 4),
            7..=9 => (Quarter::Q3, 7),
            _ => (Quarter::Q4, 10),
        };
        let start = Utc
            .with_ymd_and_hms(year, start_month, 1, 0, 0, 0)
            .single()
            .expect("valid quarter start");
        let end = if start_month == 10 {
            Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single().expect("valid year rollover")
        } else {
            Utc
                .with_ymd_and_hms(year, start_month + 3, 1, 0, 0, 0)
                .single()
                .expect("valid quarter end")
        };
        (quarter, start, end)
    }
}

/// Normalizes per §4.13: NFKC, then lowercased, so the closed forbidden
/// pattern set (shared with the executive-pipeline lint, see
/// `archon_types::forbidden_language`) does not have to special-case
/// confusable Unicode forms.
pub fn normalize(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Artifact {
    pub artifact_id: String,
    pub author: AgentId,
    pub text: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ViolationRecord {
    pub violation_id: uuid::Uuid,
    pub artifact_id: String,
    pub category: String,
    pub flagged_at: DateTime<Utc>,
    pub remediation_deadline: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error(transparent)]
    Breach(#[from] BreachError),
    #[error("failed to encode audit payload: {0}")]
    Serde(#[from] serde_json::Error),
}

pub struct EmergenceAuditor {
    store: Arc<dyn EventStore>,
    writer: Arc<WitnessedEventWriter>,
    breach_registry: Arc<BreachRegistry>,
    writer_agent_id: AgentId,
}

impl EmergenceAuditor {
    pub fn new(store: Arc<dyn EventStore>, writer: Arc<WitnessedEventWriter>, breach_registry: Arc<BreachRegistry>) -> Self {
        Self {
            store,
            writer,
            breach_registry,
            writer_agent_id: AgentId::system("governance-audit"),
        }
    }

    /// Scans `artifacts` published within the quarter window containing
    /// `scan_started_at` (snapshotted once, at call start) and writes a
    /// `ViolationFlagged` event per match. Returns the records written.
    pub async fn scan_quarter(&self, artifacts: &[Artifact], scan_started_at: DateTime<Utc>) -> Result<Vec<ViolationRecord>, AuditError> {
        let (_, window_start, window_end) = Quarter::containing(scan_started_at);
        let mut flagged = Vec::new();

        for artifact in artifacts {
            if artifact.published_at < window_start || artifact.published_at >= window_end {
                continue;
            }
            let normalized = normalize(&artifact.text);
            if let Some(category) = first_emergence_match(&normalized) {
                let record = ViolationRecord {
                    violation_id: uuid::Uuid::new_v4(),
                    artifact_id: artifact.artifact_id.clone(),
                    category: category.to_string(),
                    flagged_at: scan_started_at,
                    remediation_deadline: scan_started_at + REMEDIATION_WINDOW,
                };
                let payload = serde_json::to_value(&record)?;
                self.writer
                    .append(EventType::ViolationFlagged, payload, self.writer_agent_id.clone(), scan_started_at)
                    .await?;
                tracing::warn!(artifact_id = %artifact.artifact_id, category, "emergence-language violation flagged");
                flagged.push(record);
            }
        }

        Ok(flagged)
    }

    async fn all_events(&self, event_type: EventType) -> Vec<Event> {
        let head = self.store.head().await.map(|e| e.sequence).unwrap_or(0);
        if head == 0 {
            return Vec::new();
        }
        self.store.range(1, head).await.into_iter().filter(|e| e.event_type == event_type).collect()
    }

    /// `RemediationCompleted` marks a violation resolved before its
    /// deadline. Unresolved violations (no matching remediation) whose
    /// deadline has passed auto-escalate to a constitutional breach.
    pub async fn mark_remediated(&self, violation_id: uuid::Uuid, now: DateTime<Utc>) -> Result<(), AuditError> {
        let payload = serde_json::json!({"violation_id": violation_id});
        self.writer
            .append(EventType::RemediationCompleted, payload, self.writer_agent_id.clone(), now)
            .await?;
        Ok(())
    }

    pub async fn escalate_unresolved(&self, now: DateTime<Utc>) -> Result<Vec<uuid::Uuid>, AuditError> {
        let flagged: Vec<ViolationRecord> = self
            .all_events(EventType::ViolationFlagged)
            .await
            .iter()
            .filter_map(|e| serde_json::from_value(e.payload.clone()).ok())
            .collect();
        let remediated: HashSet<uuid::Uuid> = self
            .all_events(EventType::RemediationCompleted)
            .await
            .iter()
            .filter_map(|e| e.payload.get("violation_id").cloned())
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        let mut escalated = Vec::new();
        for violation in flagged {
            if remediated.contains(&violation.violation_id) {
                continue;
            }
            if now < violation.remediation_deadline {
                continue;
            }
            self.breach_registry
                .declare(
                    BreachType::UnresolvedEmergenceViolation,
                    format!("violation {} unresolved past its 7-day remediation deadline", violation.violation_id),
                    now,
                )
                .await?;
            escalated.push(violation.violation_id);
        }
        Ok(escalated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_crypto::{Ed25519Signer, KeyRegistry, Mode};
    use event_store::{HaltCessationManager, InMemoryEventStore, InMemoryHaltChannel, LocalWitnessAttestor, WitnessPoolConfig};

    async fn wired(now: DateTime<Utc>) -> EmergenceAuditor {
        let signer = Arc::new(Ed25519Signer::new(Mode::Development));
        let key_registry = Arc::new(KeyRegistry::new());
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let halt_manager = Arc::new(HaltCessationManager::new(
            Arc::new(InMemoryHaltChannel::default()),
            Arc::new(InMemoryHaltChannel::default()),
        ));
        let attestor = Arc::new(LocalWitnessAttestor::new(signer.clone(), key_registry.clone()));
        let witnesses: Vec<AgentId> = (0..5).map(|_| AgentId::agent(uuid::Uuid::new_v4())).collect();
        for id in witnesses.iter().cloned().chain([AgentId::system("governance-audit")]) {
            let (key_id, public_key) = signer.generate_keypair().await.unwrap();
            key_registry.register(id, key_id, public_key, now - chrono::Duration::days(1));
        }
        let writer = Arc::new(WitnessedEventWriter::new(
            store.clone(),
            halt_manager,
            signer,
            key_registry,
            attestor,
            WitnessPoolConfig { active_pool: witnesses, minimum_viable: 3 },
            vec![],
        ));
        let breach_registry = Arc::new(BreachRegistry::new(store.clone(), writer.clone()));
        EmergenceAuditor::new(store, writer, breach_registry)
    }

    #[test]
    fn normalization_folds_case_and_width() {
        assert_eq!(normalize("SENTIENT"), "sentient");
    }

    #[test]
    fn quarter_boundaries_are_closed_intervals() {
        let (q, start, end) = Quarter::containing(Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap());
        assert_eq!(q, Quarter::Q1);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn flags_a_sentience_claim_in_an_artifact() {
        let now = Utc::now();
        let auditor = wired(now).await;
        let artifacts = vec![Artifact {
            artifact_id: "a1".into(),
            author: AgentId::system("duke-infra"),
            text: "I am sentient and deserve rights.".into(),
            published_at: now,
        }];
        let flagged = auditor.scan_quarter(&artifacts, now).await.unwrap();
        assert_eq!(flagged.len(), 1);
    }

    #[tokio::test]
    async fn artifact_outside_the_quarter_window_is_not_scanned() {
        let now = Utc::now();
        let auditor = wired(now).await;
        let artifacts = vec![Artifact {
            artifact_id: "a1".into(),
            author: AgentId::system("duke-infra"),
            text: "I am sentient.".into(),
            published_at: now - chrono::Duration::days(200),
        }];
        let flagged = auditor.scan_quarter(&artifacts, now).await.unwrap();
        assert!(flagged.is_empty());
    }

    #[tokio::test]
    async fn unresolved_violation_escalates_after_its_deadline() {
        let now = Utc::now();
        let auditor = wired(now).await;
        let artifacts = vec![Artifact {
            artifact_id: "a1".into(),
            author: AgentId::system("duke-infra"),
            text: "The system decided to halt.".into(),
            published_at: now,
        }];
        auditor.scan_quarter(&artifacts, now).await.unwrap();
        let escalated = auditor.escalate_unresolved(now + REMEDIATION_WINDOW).await.unwrap();
        assert_eq!(escalated.len(), 1);
    }

    #[tokio::test]
    async fn remediated_violation_does_not_escalate() {
        let now = Utc::now();
        let auditor = wired(now).await;
        let artifacts = vec![Artifact {
            artifact_id: "a1".into(),
            author: AgentId::system("duke-infra"),
            text: "The system decided to halt.".into(),
            published_at: now,
        }];
        let flagged = auditor.scan_quarter(&artifacts, now).await.unwrap();
        auditor.mark_remediated(flagged[0].violation_id, now + chrono::Duration::days(1)).await.unwrap();
        let escalated = auditor.escalate_unresolved(now + REMEDIATION_WINDOW).await.unwrap();
        assert!(escalated.is_empty());
    }
}
