use crate::ids::{AgentId, MotionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionType {
    Constitutional,
    Policy,
    Procedural,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionStatus {
    Proposed,
    Debated,
    Voting,
    Ratified,
    Failed,
    Withdrawn,
}

impl MotionStatus {
    /// Enforces the motion status machine named in §3.1: `PROPOSED →
    /// DEBATED → VOTING → (RATIFIED | FAILED | WITHDRAWN)`.
    pub fn can_transition_to(self, next: MotionStatus) -> bool {
        use MotionStatus::*;
        matches!(
            (self, next),
            (Proposed, Debated)
                | (Proposed, Withdrawn)
                | (Debated, Voting)
                | (Debated, Withdrawn)
                | (Voting, Ratified)
                | (Voting, Failed)
                | (Voting, Withdrawn)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MotionStatus::Ratified | MotionStatus::Failed | MotionStatus::Withdrawn)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motion {
    pub motion_id: MotionId,
    pub title: String,
    pub text: String,
    pub motion_type: MotionType,
    pub proposer_id: AgentId,
    pub created_at: DateTime<Utc>,
    pub status: MotionStatus,
}

/// A ratified motion translated into an actionable unit of work
/// (GLOSSARY: Mandate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mandate {
    pub mandate_id: uuid::Uuid,
    pub motion_id: MotionId,
    pub title: String,
    pub text: String,
    pub ratified_at: DateTime<Utc>,
}
