use archon_types::{AgentId, CeremonyId};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyStatus {
    Pending,
    Approved,
    Executing,
    Completed,
    Expired,
}

pub const DEFAULT_WITNESS_FLOOR: usize = 3;
pub const DEFAULT_CEREMONY_TIMEOUT: Duration = Duration::hours(1);

#[derive(Debug, Clone)]
pub struct Ceremony {
    pub id: CeremonyId,
    pub keeper_id: AgentId,
    pub status: CeremonyStatus,
    pub started_at: DateTime<Utc>,
    pub witness_floor: usize,
    pub attestations: HashSet<AgentId>,
    /// Witnesses attested during bootstrap who were not yet present in the
    /// key registry (H2: `WITNESS_BOOTSTRAP_ENABLED`); each is recorded as
    /// an event by the caller, not merely logged.
    pub unverified_bootstrap_witnesses: Vec<AgentId>,
}

#[derive(Debug, thiserror::Error)]
pub enum CeremonyError {
    #[error("keeper {0} already has an active ceremony (CM-5)")]
    KeeperHasActiveCeremony(AgentId),
    #[error("ceremony {0} not found")]
    NotFound(CeremonyId),
    #[error("ceremony {0} is not pending/approved, cannot accept attestations")]
    NotAcceptingAttestations(CeremonyId),
    #[error("ceremony {0} has expired")]
    Expired(CeremonyId),
    #[error("ceremony {0} has not reached its witness floor ({1}/{2})")]
    FloorNotReached(CeremonyId, usize, usize),
}

/// PENDING → APPROVED → EXECUTING → COMPLETED state machine (§4.4).
pub struct CeremonyRegistry {
    ceremonies: RwLock<HashMap<CeremonyId, Ceremony>>,
    /// H2: must be disabled after initial bootstrap.
    witness_bootstrap_enabled: RwLock<bool>,
}

impl Default for CeremonyRegistry {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CeremonyRegistry {
    pub fn new(witness_bootstrap_enabled: bool) -> Self {
        Self {
            ceremonies: RwLock::new(HashMap::new()),
            witness_bootstrap_enabled: RwLock::new(witness_bootstrap_enabled),
        }
    }

    pub fn disable_witness_bootstrap(&self) {
        *self.witness_bootstrap_enabled.write() = false;
    }

    pub fn witness_bootstrap_enabled(&self) -> bool {
        *self.witness_bootstrap_enabled.read()
    }

    pub fn start(
        &self,
        keeper_id: AgentId,
        witness_floor: Option<usize>,
        started_at: DateTime<Utc>,
    ) -> Result<CeremonyId, CeremonyError> {
        let mut ceremonies = self.ceremonies.write();
        if ceremonies
            .values()
            .any(|c| c.keeper_id == keeper_id && matches!(c.status, CeremonyStatus::Pending | CeremonyStatus::Approved | CeremonyStatus::Executing))
        {
            return Err(CeremonyError::KeeperHasActiveCeremony(keeper_id));
        }
        let id = CeremonyId::new();
        ceremonies.insert(
            id,
            Ceremony {
                id,
                keeper_id,
                status: CeremonyStatus::Pending,
                started_at,
                witness_floor: witness_floor.unwrap_or(DEFAULT_WITNESS_FLOOR),
                attestations: HashSet::new(),
                unverified_bootstrap_witnesses: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Reconciles timeouts before any other operation observes state
    /// (mirrors the pattern used for halt-channel checks: evaluate time
    /// first).
    fn expire_if_overdue(&self, ceremony: &mut Ceremony, now: DateTime<Utc>) {
        if matches!(ceremony.status, CeremonyStatus::Completed | CeremonyStatus::Expired) {
            return;
        }
        if now - ceremony.started_at > DEFAULT_CEREMONY_TIMEOUT {
            ceremony.status = CeremonyStatus::Expired;
        }
    }

    /// Records a witness attestation; `known_witness` is `false` when the
    /// witness is not yet present in the key registry, permitted only
    /// during bootstrap (H2).
    pub fn attest(
        &self,
        id: CeremonyId,
        witness_id: AgentId,
        known_witness: bool,
        now: DateTime<Utc>,
    ) -> Result<CeremonyStatus, CeremonyError> {
        let mut ceremonies = self.ceremonies.write();
        let ceremony = ceremonies.get_mut(&id).ok_or(CeremonyError::NotFound(id))?;
        self.expire_if_overdue(ceremony, now);
        if matches!(ceremony.status, CeremonyStatus::Expired) {
            return Err(CeremonyError::Expired(id));
        }
        if !matches!(ceremony.status, CeremonyStatus::Pending | CeremonyStatus::Approved) {
            return Err(CeremonyError::NotAcceptingAttestations(id));
        }
        if !known_witness {
            if !self.witness_bootstrap_enabled() {
                return Err(CeremonyError::NotAcceptingAttestations(id));
            }
            ceremony.unverified_bootstrap_witnesses.push(witness_id.clone());
        }
        ceremony.attestations.insert(witness_id);
        if ceremony.attestations.len() >= ceremony.witness_floor {
            ceremony.status = CeremonyStatus::Approved;
        }
        Ok(ceremony.status)
    }

    pub fn begin_execution(&self, id: CeremonyId, now: DateTime<Utc>) -> Result<(), CeremonyError> {
        let mut ceremonies = self.ceremonies.write();
        let ceremony = ceremonies.get_mut(&id).ok_or(CeremonyError::NotFound(id))?;
        self.expire_if_overdue(ceremony, now);
        match ceremony.status {
            CeremonyStatus::Approved => {
                ceremony.status = CeremonyStatus::Executing;
                Ok(())
            }
            CeremonyStatus::Expired => Err(CeremonyError::Expired(id)),
            _ => Err(CeremonyError::FloorNotReached(
                id,
                ceremony.attestations.len(),
                ceremony.witness_floor,
            )),
        }
    }

    pub fn complete(&self, id: CeremonyId, now: DateTime<Utc>) -> Result<(), CeremonyError> {
        let mut ceremonies = self.ceremonies.write();
        let ceremony = ceremonies.get_mut(&id).ok_or(CeremonyError::NotFound(id))?;
        self.expire_if_overdue(ceremony, now);
        match ceremony.status {
            CeremonyStatus::Executing => {
                ceremony.status = CeremonyStatus::Completed;
                Ok(())
            }
            CeremonyStatus::Expired => Err(CeremonyError::Expired(id)),
            _ => Err(CeremonyError::NotAcceptingAttestations(id)),
        }
    }

    pub fn status(&self, id: CeremonyId, now: DateTime<Utc>) -> Result<CeremonyStatus, CeremonyError> {
        let mut ceremonies = self.ceremonies.write();
        let ceremony = ceremonies.get_mut(&id).ok_or(CeremonyError::NotFound(id))?;
        self.expire_if_overdue(ceremony, now);
        Ok(ceremony.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keeper() -> AgentId {
        AgentId::agent(uuid::Uuid::new_v4())
    }

    #[test]
    fn floor_reached_moves_to_approved() {
        let registry = CeremonyRegistry::new(false);
        let now = Utc::now();
        let id = registry.start(keeper(), Some(2), now).unwrap();
        assert_eq!(
            registry.attest(id, AgentId::agent(uuid::Uuid::new_v4()), true, now).unwrap(),
            CeremonyStatus::Pending
        );
        assert_eq!(
            registry.attest(id, AgentId::agent(uuid::Uuid::new_v4()), true, now).unwrap(),
            CeremonyStatus::Approved
        );
    }

    #[test]
    fn only_one_active_ceremony_per_keeper() {
        let registry = CeremonyRegistry::new(false);
        let keeper_id = keeper();
        let now = Utc::now();
        registry.start(keeper_id.clone(), None, now).unwrap();
        let result = registry.start(keeper_id, None, now);
        assert!(matches!(result, Err(CeremonyError::KeeperHasActiveCeremony(_))));
    }

    #[test]
    fn timeout_expires_ceremony() {
        let registry = CeremonyRegistry::new(false);
        let now = Utc::now();
        let id = registry.start(keeper(), None, now).unwrap();
        let later = now + Duration::hours(2);
        assert_eq!(registry.status(id, later).unwrap(), CeremonyStatus::Expired);
    }

    #[test]
    fn unverified_witness_requires_bootstrap_flag() {
        let registry = CeremonyRegistry::new(false);
        let now = Utc::now();
        let id = registry.start(keeper(), Some(1), now).unwrap();
        let result = registry.attest(id, AgentId::agent(uuid::Uuid::new_v4()), false, now);
        assert!(matches!(result, Err(CeremonyError::NotAcceptingAttestations(_))));

        registry.disable_witness_bootstrap();
        assert!(!registry.witness_bootstrap_enabled());
    }
}
