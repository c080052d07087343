use crate::ids::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed UUID for the halt-state singleton row (§6.5: "a trigger ensures no
/// more than one row exists").
pub fn halt_state_singleton_id() -> Uuid {
    Uuid::parse_str("00000000-0000-0000-0000-000000000001").expect("valid fixed uuid")
}

/// Fixed UUID for the cessation-flag singleton row.
pub fn cessation_flag_singleton_id() -> Uuid {
    Uuid::parse_str("00000000-0000-0000-0000-000000000002").expect("valid fixed uuid")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltState {
    pub is_halted: bool,
    pub reason: Option<String>,
    pub triggered_at: Option<DateTime<Utc>>,
    pub triggered_by: Option<AgentId>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub cleared_by: Option<AgentId>,
    /// Agreement across the two independent channels; `false` means
    /// "assume halted" per §4.1 step 1.
    pub channel_consensus: bool,
}

impl HaltState {
    pub fn operational() -> Self {
        Self {
            is_halted: false,
            reason: None,
            triggered_at: None,
            triggered_by: None,
            cleared_at: None,
            cleared_by: None,
            channel_consensus: true,
        }
    }

    /// CT-11: disagreement between channels is treated as halted.
    pub fn is_effectively_halted(&self) -> bool {
        self.is_halted || !self.channel_consensus
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CessationFlag {
    pub cessation_executed: bool,
}
