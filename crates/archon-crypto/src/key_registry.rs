use crate::signing::KeyId;
use archon_types::AgentId;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Identical shape for `AgentKey`/`KeeperKey`/`WitnessKey` (§3.1): the
/// registry does not distinguish owner roles, callers do.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub id: uuid::Uuid,
    pub owner_id: AgentId,
    pub key_id: KeyId,
    pub public_key_bytes: Vec<u8>,
    pub active_from: DateTime<Utc>,
    pub active_until: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// I4: strict `[active_from, active_until)` containment — a signature
    /// at exactly `active_until` is invalid (half-open interval, §8.3).
    pub fn covers(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.active_from
            && self.active_until.map(|until| timestamp < until).unwrap_or(true)
    }
}

pub const DEFAULT_ROTATION_OVERLAP: Duration = Duration::days(30);

#[derive(Debug, thiserror::Error)]
pub enum KeyRegistryError {
    #[error("no key registered for owner {0}")]
    NoKeyForOwner(AgentId),
    #[error("no key active for owner {0} at the given timestamp")]
    NoKeyActiveAtTimestamp(AgentId),
    #[error("key {0} is already deactivated")]
    AlreadyDeactivated(KeyId),
    #[error("unknown key id {0}")]
    UnknownKey(KeyId),
}

/// Append-only key registry (I9: the set of key records strictly grows;
/// `active_until` transitions `null -> timestamp` exactly once, never back).
pub struct KeyRegistry {
    records: RwLock<Vec<KeyRecord>>,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn register(
        &self,
        owner_id: AgentId,
        key_id: KeyId,
        public_key_bytes: Vec<u8>,
        active_from: DateTime<Utc>,
    ) -> KeyRecord {
        let record = KeyRecord {
            id: uuid::Uuid::new_v4(),
            owner_id,
            key_id,
            public_key_bytes,
            active_from,
            active_until: None,
        };
        self.records.write().push(record.clone());
        record
    }

    /// Generates a new key (caller supplies it, already produced by a
    /// `SigningPort`) and closes the owner's current active key with the
    /// default 30-day overlap window, per §4.4.
    pub fn rotate(
        &self,
        owner_id: &AgentId,
        new_key_id: KeyId,
        new_public_key_bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<KeyRecord, KeyRegistryError> {
        self.close_active_key(owner_id, now, now + DEFAULT_ROTATION_OVERLAP)?;
        Ok(self.register(owner_id.clone(), new_key_id, new_public_key_bytes, now))
    }

    /// Bypasses the overlap window entirely: `active_until = now`
    /// immediately.
    pub fn emergency_revoke(
        &self,
        key_id: KeyId,
        now: DateTime<Utc>,
    ) -> Result<(), KeyRegistryError> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|r| r.key_id == key_id)
            .ok_or(KeyRegistryError::UnknownKey(key_id))?;
        if record.active_until.is_some() {
            return Err(KeyRegistryError::AlreadyDeactivated(key_id));
        }
        record.active_until = Some(now);
        Ok(())
    }

    fn close_active_key(
        &self,
        owner_id: &AgentId,
        now: DateTime<Utc>,
        active_until: DateTime<Utc>,
    ) -> Result<(), KeyRegistryError> {
        let mut records = self.records.write();
        let current = records
            .iter_mut()
            .filter(|r| &r.owner_id == owner_id)
            .find(|r| r.covers(now));
        if let Some(current) = current {
            current.active_until = Some(active_until);
            Ok(())
        } else {
            Err(KeyRegistryError::NoKeyForOwner(owner_id.clone()))
        }
    }

    /// Used by the verifier so a signature is checked against the key valid
    /// **at signing time**, not at verification time (§4.4).
    pub fn get_active_key_at(
        &self,
        owner_id: &AgentId,
        timestamp: DateTime<Utc>,
    ) -> Result<KeyRecord, KeyRegistryError> {
        self.records
            .read()
            .iter()
            .find(|r| &r.owner_id == owner_id && r.covers(timestamp))
            .cloned()
            .ok_or_else(|| KeyRegistryError::NoKeyActiveAtTimestamp(owner_id.clone()))
    }

    pub fn all_records(&self) -> Vec<KeyRecord> {
        self.records.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> AgentId {
        AgentId::agent(uuid::Uuid::new_v4())
    }

    #[test]
    fn half_open_interval_excludes_active_until() {
        let now = Utc::now();
        let record = KeyRecord {
            id: uuid::Uuid::new_v4(),
            owner_id: owner(),
            key_id: KeyId::new(),
            public_key_bytes: vec![],
            active_from: now,
            active_until: Some(now + Duration::days(1)),
        };
        assert!(record.covers(now));
        assert!(!record.covers(now + Duration::days(1)));
        assert!(record.covers(now + Duration::hours(23)));
    }

    #[test]
    fn rotation_leaves_overlap_window() {
        let registry = KeyRegistry::new();
        let owner_id = owner();
        let now = Utc::now();
        registry.register(owner_id.clone(), KeyId::new(), vec![1], now - Duration::days(1));

        let rotated = registry
            .rotate(&owner_id, KeyId::new(), vec![2], now)
            .unwrap();
        assert_eq!(rotated.active_from, now);

        let old = registry
            .all_records()
            .into_iter()
            .find(|r| r.public_key_bytes == vec![1])
            .unwrap();
        assert_eq!(old.active_until, Some(now + DEFAULT_ROTATION_OVERLAP));
        // Still valid within the overlap window.
        assert!(old.covers(now + Duration::days(1)));
    }

    #[test]
    fn emergency_revoke_bypasses_overlap() {
        let registry = KeyRegistry::new();
        let owner_id = owner();
        let key_id = KeyId::new();
        let now = Utc::now();
        registry.register(owner_id, key_id, vec![1], now - Duration::days(5));

        registry.emergency_revoke(key_id, now).unwrap();
        let record = registry.all_records().into_iter().next().unwrap();
        assert_eq!(record.active_until, Some(now));
    }

    #[test]
    fn keys_are_never_deleted() {
        let registry = KeyRegistry::new();
        let owner_id = owner();
        let now = Utc::now();
        registry.register(owner_id.clone(), KeyId::new(), vec![1], now - Duration::days(1));
        registry
            .rotate(&owner_id, KeyId::new(), vec![2], now)
            .unwrap();
        assert_eq!(registry.all_records().len(), 2);
    }
}
