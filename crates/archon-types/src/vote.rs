use crate::ids::{AgentId, MotionId, VoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Aye,
    Nay,
    Abstain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub vote_id: VoteId,
    pub motion_id: MotionId,
    pub archon_id: AgentId,
    /// Regex-parsed guess, defaults to `Abstain` on parse failure.
    pub optimistic_choice: VoteChoice,
    pub raw_text: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub vote_id: VoteId,
    pub validator_id: AgentId,
    pub validated_choice: VoteChoice,
    pub agrees_with_optimistic: bool,
    pub attempts: u32,
    pub reason_text: String,
}

/// Derived aggregate per motion (§3.1). `ayes + nays + abstains ==
/// total_votes_cast` must hold after every override application (P6 / I5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Tally {
    pub ayes: u64,
    pub nays: u64,
    pub abstains: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("tally invariant violated: {ayes} + {nays} + {abstains} != {total}")]
pub struct TallyInvariantViolation {
    pub ayes: u64,
    pub nays: u64,
    pub abstains: u64,
    pub total: u64,
}

impl Tally {
    pub fn record(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::Aye => self.ayes += 1,
            VoteChoice::Nay => self.nays += 1,
            VoteChoice::Abstain => self.abstains += 1,
        }
    }

    /// Applies an override: decrement the prior choice's bucket, increment
    /// the new one. Callers must check `verify_invariant` against the known
    /// `total_votes_cast` immediately after (P6).
    pub fn apply_override(&mut self, from: VoteChoice, to: VoteChoice) {
        match from {
            VoteChoice::Aye => self.ayes = self.ayes.saturating_sub(1),
            VoteChoice::Nay => self.nays = self.nays.saturating_sub(1),
            VoteChoice::Abstain => self.abstains = self.abstains.saturating_sub(1),
        }
        self.record(to);
    }

    pub fn total(&self) -> u64 {
        self.ayes + self.nays + self.abstains
    }

    /// I5 / P6.
    pub fn verify_invariant(&self, total_votes_cast: u64) -> Result<(), TallyInvariantViolation> {
        if self.total() == total_votes_cast {
            Ok(())
        } else {
            Err(TallyInvariantViolation {
                ayes: self.ayes,
                nays: self.nays,
                abstains: self.abstains,
                total: total_votes_cast,
            })
        }
    }

    /// Simple majority rule used by the seed scenarios (S1/S2): motion
    /// passes iff ayes strictly outnumber nays.
    pub fn passes_majority(&self) -> bool {
        self.ayes > self.nays
    }
}
