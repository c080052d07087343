use crate::ids::CounterId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub task_ref: CounterId,
    pub parent_tactic_id: CounterId,
    pub rfp_id: String,
    pub mandate_id: uuid::Uuid,
    pub proposal_id: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub expected_outcomes: Vec<String>,
    pub capability_tags: Vec<String>,
    pub effort_hours: f64,
    pub deliverable_id: Option<String>,
    pub dependencies: Vec<CounterId>,
}

/// Non-legible placeholder outcomes rejected by the hard lint (§4.8).
pub const NON_LEGIBLE_OUTCOMES: &[&str] = &[
    "tbd", "???", "n/a", "todo", "finished", "done", "complete", "completed",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskDraftLintError {
    #[error("description is empty")]
    EmptyDescription,
    #[error("fewer than 2 expected outcomes")]
    TooFewOutcomes,
    #[error("expected outcome is non-legible placeholder text: {0}")]
    NonLegibleOutcome(String),
    #[error("capability_tags is empty")]
    EmptyCapabilityTags,
    #[error("effort_hours must be > 0")]
    NonPositiveEffort,
    #[error("parent_tactic_id is empty")]
    EmptyParentTactic,
}

impl TaskDraft {
    /// Hard lint (§4.8): rejection, not warning.
    pub fn hard_lint(&self) -> Result<(), TaskDraftLintError> {
        if self.description.trim().is_empty() {
            return Err(TaskDraftLintError::EmptyDescription);
        }
        if self.expected_outcomes.len() < 2 {
            return Err(TaskDraftLintError::TooFewOutcomes);
        }
        for outcome in &self.expected_outcomes {
            let normalized = outcome.trim().to_lowercase();
            if NON_LEGIBLE_OUTCOMES.contains(&normalized.as_str()) {
                return Err(TaskDraftLintError::NonLegibleOutcome(outcome.clone()));
            }
        }
        if self.capability_tags.is_empty() {
            return Err(TaskDraftLintError::EmptyCapabilityTags);
        }
        if !(self.effort_hours > 0.0) {
            return Err(TaskDraftLintError::NonPositiveEffort);
        }
        if self.parent_tactic_id.0.trim().is_empty() {
            return Err(TaskDraftLintError::EmptyParentTactic);
        }
        Ok(())
    }

    /// Soft lint (§4.8): event, not rejection. `true` means
    /// `ProvenanceWeakMapping` should be emitted.
    pub fn has_weak_provenance(&self) -> bool {
        if self.deliverable_id.is_none() {
            return false;
        }
        !self
            .requirements
            .iter()
            .any(|r| r.contains("FR-") || r.contains("NFR-"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    Standard = 0,
    Sensitive = 1,
    Restricted = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerTier {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
}

impl PowerTier {
    /// §4.9: mandatory gates per tier.
    pub fn mandatory_gates(self) -> &'static [&'static str] {
        match self {
            PowerTier::Tier0 => &[],
            PowerTier::Tier1 => &[],
            PowerTier::Tier2 => &["pre_execution", "pre_change"],
            PowerTier::Tier3 => &["human_gate", "reauthorization_window"],
        }
    }

    /// Tier 3 (production effect) requires an authorizing ceremony to add.
    pub fn requires_ceremony(self) -> bool {
        matches!(self, PowerTier::Tier3)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerLease {
    pub lease_id: crate::ids::LeaseId,
    pub task_ref: CounterId,
    pub tier: PowerTier,
    pub auth_level: AuthLevel,
    pub scope: String,
    #[serde(with = "humantime_serde_duration")]
    pub ttl: Duration,
    pub gates: Vec<String>,
}

mod humantime_serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

/// The 11-state task lifecycle of §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Authorized,
    Activated,
    Routed,
    Accepted,
    InProgress,
    Reported,
    Closed,
    Rejected,
    Quarantined,
    Declined,
    Withdrawn,
    Blocked,
    NeedsReroute,
    ClosedPartial,
    Failed,
    /// §5: reached when the activation's `PowerLease.ttl` has elapsed since
    /// issuance. Extension is never a bare renewal — only a fresh
    /// `activate()` call (a new authorization) can move a task forward
    /// again after expiry.
    Expired,
}

impl TaskState {
    /// States past which a task's power lease is no longer open (§15
    /// metrics: the open-power-lease gauge decrements on entry to any of
    /// these).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Closed
                | TaskState::Rejected
                | TaskState::Quarantined
                | TaskState::ClosedPartial
                | TaskState::Failed
                | TaskState::Expired
        )
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Authorized, Activated)
                | (Activated, Routed)
                | (Routed, Accepted)
                | (Routed, Declined)
                | (Accepted, InProgress)
                | (InProgress, Reported)
                | (InProgress, Withdrawn)
                | (Reported, Closed)
                | (Reported, Rejected)
                | (Reported, Quarantined)
                | (Reported, ClosedPartial)
                | (Declined, NeedsReroute)
                | (Withdrawn, NeedsReroute)
                | (NeedsReroute, Routed)
                | (NeedsReroute, Blocked)
                | (Blocked, NeedsReroute)
                | (Activated, Expired)
                | (Routed, Expired)
                | (Accepted, Expired)
                | (InProgress, Expired)
        )
    }
}

/// Settlement rejection reason codes (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    OutcomeNotMet,
    ConstraintViolation,
    ScopeDrift,
    UnsafeContent,
    ProvenanceInsufficient,
}

impl RejectionReason {
    /// Transition from `REPORTED` mandated by the reason code (§4.10 table).
    pub fn target_state(self) -> TaskState {
        match self {
            RejectionReason::OutcomeNotMet => TaskState::Rejected,
            RejectionReason::ConstraintViolation => TaskState::Quarantined,
            RejectionReason::ScopeDrift => TaskState::Rejected,
            RejectionReason::UnsafeContent => TaskState::Quarantined,
            RejectionReason::ProvenanceInsufficient => TaskState::Rejected,
        }
    }
}
