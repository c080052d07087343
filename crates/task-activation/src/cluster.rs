use archon_types::AuthLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub String);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Degraded,
    Unavailable,
}

/// §4.9: a cluster's consent policy is not optional configuration — both
/// fields must be `true` for the cluster to be matchable at all (checked in
/// `Cluster::is_consentful`, independent of the four matching rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentPolicy {
    pub requires_explicit_acceptance: bool,
    pub refusal_is_penalty_free: bool,
}

impl ConsentPolicy {
    pub fn compliant(self) -> bool {
        self.requires_explicit_acceptance && self.refusal_is_penalty_free
    }
}

/// An external execution unit (§4.9). Clusters are declared, not discovered:
/// this crate only matches against what's given, it does not probe clusters
/// for liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: ClusterId,
    pub status: ClusterStatus,
    pub availability_status: AvailabilityStatus,
    pub capability_tags: Vec<String>,
    pub max_concurrent_tasks: u32,
    pub current_task_count: u32,
    pub steward_auth_level: AuthLevel,
    pub consent_policy: ConsentPolicy,
}

impl Cluster {
    pub fn has_capacity(&self) -> bool {
        self.current_task_count < self.max_concurrent_tasks
    }
}
