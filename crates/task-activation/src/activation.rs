use crate::cluster::Cluster;
use crate::earl_routing::EarlRoutingTable;
use crate::matching::match_clusters;
use crate::ClusterId;
use archon_types::{
    AgentId, AuthLevel, CounterId, EventType, LeaseId, PowerLease, PowerTier, TaskActivationId,
    TaskState,
};
use chrono::{DateTime, Utc};
use event_store::{AppendError, WitnessedEventWriter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("no cluster satisfies the required tags and sensitivity gate")]
    NoEligibleCluster,
    #[error("task {0} cannot move from {1:?} to {2:?}")]
    IllegalTransition(TaskActivationId, TaskState, TaskState),
    #[error("power lease for task {0} expired at {1}; a fresh activate() is required, not a renewal")]
    LeaseExpired(TaskActivationId, DateTime<Utc>),
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error("failed to encode event payload: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Everything needed to activate and run a task against one cluster (§4.9).
/// `state` is advanced only through `TaskActivator`'s transition methods so
/// every move is checked against `TaskState::can_transition_to`.
#[derive(Debug, Clone)]
pub struct TaskActivation {
    pub activation_id: TaskActivationId,
    pub task_ref: CounterId,
    pub cluster_id: ClusterId,
    pub earl_id: AgentId,
    pub lease: PowerLease,
    pub state: TaskState,
    pub excluded_clusters: Vec<ClusterId>,
    /// When the current `lease` was issued. Reset only by a fresh
    /// `activate()` call — §5's "extension requires a new authorization"
    /// means there is no renewal path that advances this in place.
    pub lease_issued_at: DateTime<Utc>,
}

impl TaskActivation {
    /// §5: "on expiry, activation becomes EXPIRED". `ttl` is measured from
    /// `lease_issued_at`, the timestamp of the authorization that produced
    /// the currently-held lease.
    pub fn lease_expires_at(&self) -> DateTime<Utc> {
        self.lease_issued_at + chrono_duration_from_std(self.lease.ttl)
    }

    pub fn lease_has_expired(&self, now: DateTime<Utc>) -> bool {
        !self.state.is_terminal() && now >= self.lease_expires_at()
    }
}

fn chrono_duration_from_std(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::max_value())
}

/// Matches a task to a cluster, issues its power lease, and advances it
/// through `AUTHORIZED → ACTIVATED → ROUTED` (§4.9). Consent is a structural
/// precondition enforced upstream in `match_clusters`, never bypassed here —
/// there is no "urgent override" path (§4.9's consent discipline).
pub struct TaskActivator {
    writer: Arc<WitnessedEventWriter>,
    writer_agent_id: AgentId,
}

impl TaskActivator {
    pub fn new(writer: Arc<WitnessedEventWriter>) -> Self {
        Self {
            writer,
            writer_agent_id: AgentId::system("task-activation"),
        }
    }

    /// Default `K=1` (§4.9): the single best-matching cluster by
    /// `cluster_id` ordering is selected, no load-balancing across ties.
    #[allow(clippy::too_many_arguments)]
    pub async fn activate(
        &self,
        task_ref: CounterId,
        required_tags: &[String],
        sensitivity_gate: AuthLevel,
        tier: PowerTier,
        auth_level: AuthLevel,
        scope: String,
        ttl: Duration,
        clusters: &[Cluster],
        earl_routing: &EarlRoutingTable,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<TaskActivation, ActivationError> {
        let matched = match_clusters(clusters, required_tags, sensitivity_gate, 1);
        let cluster_id = matched.into_iter().next().ok_or(ActivationError::NoEligibleCluster)?;

        let earl_id = earl_routing.route(domain);
        let lease = PowerLease {
            lease_id: LeaseId::new(),
            task_ref: task_ref.clone(),
            tier,
            auth_level,
            scope,
            ttl,
            gates: tier.mandatory_gates().iter().map(|g| g.to_string()).collect(),
        };

        let activation = TaskActivation {
            activation_id: TaskActivationId::new(),
            task_ref,
            cluster_id,
            earl_id,
            lease,
            state: TaskState::Authorized,
            excluded_clusters: Vec::new(),
            lease_issued_at: now,
        };

        let mut activation = activation;
        self.transition(&mut activation, TaskState::Activated, None, now).await?;
        self.transition(&mut activation, TaskState::Routed, Some(EventType::TaskActivated), now)
            .await?;
        crate::metrics::OPEN_POWER_LEASES.inc();

        Ok(activation)
    }

    /// Advances `activation.state` to `next`, rejecting the move if it is
    /// not in `TaskState::can_transition_to`'s closed set, and optionally
    /// witnesses the move with `event_type` when one exists in the closed
    /// event vocabulary for this transition (not every internal state move
    /// has a dedicated event, per §6.2).
    ///
    /// §5 lease TTL: any transition attempted once the current lease has
    /// expired is refused with `LeaseExpired` instead of proceeding — the
    /// activation must first be moved to `Expired` via `expire_if_due` and
    /// re-authorized through a fresh `activate()` call.
    pub async fn transition(
        &self,
        activation: &mut TaskActivation,
        next: TaskState,
        event_type: Option<EventType>,
        now: DateTime<Utc>,
    ) -> Result<(), ActivationError> {
        if next != TaskState::Expired && activation.lease_has_expired(now) {
            return Err(ActivationError::LeaseExpired(activation.activation_id, activation.lease_expires_at()));
        }
        if !activation.state.can_transition_to(next) {
            return Err(ActivationError::IllegalTransition(activation.activation_id, activation.state, next));
        }
        let from = activation.state;
        if let Some(event_type) = event_type {
            let payload = serde_json::json!({
                "activation_id": activation.activation_id,
                "task_ref": activation.task_ref,
                "cluster_id": activation.cluster_id,
                "from": from,
                "to": next,
            });
            self.writer
                .append(event_type, payload, self.writer_agent_id.clone(), now)
                .await?;
        }
        activation.state = next;
        if next.is_terminal() {
            crate::metrics::OPEN_POWER_LEASES.dec();
        }
        tracing::info!(activation_id = %activation.activation_id.0, ?from, to = ?next, "task activation transitioned");
        Ok(())
    }

    /// §5's periodic-sweep half of lease TTL enforcement: moves `activation`
    /// to `Expired` if its lease's `ttl` has elapsed since issuance. A no-op
    /// (returns `false`) for terminal activations or leases still live.
    /// Extending an expired activation is never a renewal of this same
    /// `TaskActivation` — callers must run a fresh `activate()` instead.
    pub async fn expire_if_due(&self, activation: &mut TaskActivation, now: DateTime<Utc>) -> Result<bool, ActivationError> {
        if !activation.lease_has_expired(now) {
            return Ok(false);
        }
        self.transition(activation, TaskState::Expired, None, now).await?;
        tracing::warn!(activation_id = %activation.activation_id.0, "power lease expired, activation moved to EXPIRED");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{AvailabilityStatus, ClusterStatus, ConsentPolicy};
    use archon_crypto::{Ed25519Signer, KeyRegistry, Mode, SigningPort};
    use event_store::{HaltCessationManager, InMemoryEventStore, InMemoryHaltChannel, LocalWitnessAttestor, WitnessPoolConfig};

    async fn wired_activator(now: DateTime<Utc>) -> TaskActivator {
        let signer = Arc::new(Ed25519Signer::new(Mode::Development));
        let key_registry = Arc::new(KeyRegistry::new());
        let store = Arc::new(InMemoryEventStore::new());
        let halt_manager = Arc::new(HaltCessationManager::new(
            Arc::new(InMemoryHaltChannel::default()),
            Arc::new(InMemoryHaltChannel::default()),
        ));
        let attestor = Arc::new(LocalWitnessAttestor::new(signer.clone(), key_registry.clone()));
        let witnesses: Vec<AgentId> = (0..5).map(|_| AgentId::agent(uuid::Uuid::new_v4())).collect();
        for id in witnesses.iter().cloned().chain([AgentId::system("task-activation")]) {
            let (key_id, public_key) = signer.generate_keypair().await.unwrap();
            key_registry.register(id, key_id, public_key, now - chrono::Duration::days(1));
        }
        let writer = Arc::new(WitnessedEventWriter::new(
            store,
            halt_manager,
            signer,
            key_registry,
            attestor,
            WitnessPoolConfig { active_pool: witnesses, minimum_viable: 3 },
            vec![],
        ));
        TaskActivator::new(writer)
    }

    fn cluster(id: &str) -> Cluster {
        Cluster {
            cluster_id: ClusterId(id.into()),
            status: ClusterStatus::Active,
            availability_status: AvailabilityStatus::Available,
            capability_tags: vec!["dev_backend".into()],
            max_concurrent_tasks: 4,
            current_task_count: 0,
            steward_auth_level: AuthLevel::Standard,
            consent_policy: ConsentPolicy { requires_explicit_acceptance: true, refusal_is_penalty_free: true },
        }
    }

    #[tokio::test]
    async fn activation_reaches_routed_via_authorized_and_activated() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let clusters = vec![cluster("alpha")];
        let table = EarlRoutingTable::new(AgentId::system("earl-default"));

        let activation = activator
            .activate(
                CounterId::new("TASK", "GUSI", 1),
                &["dev_backend".into()],
                AuthLevel::Standard,
                PowerTier::Tier1,
                AuthLevel::Standard,
                "repo:infra".into(),
                Duration::from_secs(3600),
                &clusters,
                &table,
                "infrastructure",
                now,
            )
            .await
            .unwrap();

        assert_eq!(activation.state, TaskState::Routed);
        assert_eq!(activation.cluster_id, ClusterId("alpha".into()));
    }

    #[tokio::test]
    async fn no_matching_cluster_fails_activation() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let table = EarlRoutingTable::new(AgentId::system("earl-default"));

        let result = activator
            .activate(
                CounterId::new("TASK", "GUSI", 2),
                &["dev_backend".into()],
                AuthLevel::Standard,
                PowerTier::Tier1,
                AuthLevel::Standard,
                "repo:infra".into(),
                Duration::from_secs(3600),
                &[],
                &table,
                "infrastructure",
                now,
            )
            .await;
        assert!(matches!(result, Err(ActivationError::NoEligibleCluster)));
    }

    #[tokio::test]
    async fn expire_if_due_moves_a_stale_lease_to_expired() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let clusters = vec![cluster("alpha")];
        let table = EarlRoutingTable::new(AgentId::system("earl-default"));

        let mut activation = activator
            .activate(
                CounterId::new("TASK", "GUSI", 3),
                &["dev_backend".into()],
                AuthLevel::Standard,
                PowerTier::Tier1,
                AuthLevel::Standard,
                "repo:infra".into(),
                Duration::from_secs(3600),
                &clusters,
                &table,
                "infrastructure",
                now,
            )
            .await
            .unwrap();

        let still_live = now + chrono::Duration::minutes(30);
        assert!(!activator.expire_if_due(&mut activation, still_live).await.unwrap());
        assert_eq!(activation.state, TaskState::Routed);

        let past_ttl = now + chrono::Duration::hours(2);
        assert!(activator.expire_if_due(&mut activation, past_ttl).await.unwrap());
        assert_eq!(activation.state, TaskState::Expired);

        // A lease already marked expired is never re-expired.
        assert!(!activator.expire_if_due(&mut activation, past_ttl).await.unwrap());
    }

    #[tokio::test]
    async fn transition_refuses_to_advance_an_expired_lease() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let clusters = vec![cluster("alpha")];
        let table = EarlRoutingTable::new(AgentId::system("earl-default"));

        let mut activation = activator
            .activate(
                CounterId::new("TASK", "GUSI", 4),
                &["dev_backend".into()],
                AuthLevel::Standard,
                PowerTier::Tier1,
                AuthLevel::Standard,
                "repo:infra".into(),
                Duration::from_secs(3600),
                &clusters,
                &table,
                "infrastructure",
                now,
            )
            .await
            .unwrap();

        let past_ttl = now + chrono::Duration::hours(2);
        let result = activator
            .transition(&mut activation, TaskState::Accepted, None, past_ttl)
            .await;
        assert!(matches!(result, Err(ActivationError::LeaseExpired(_, _))));
        // Extension is only ever a fresh activate(), never a bare renewal:
        // the stale activation stays put until expire_if_due or a new lease.
        assert_eq!(activation.state, TaskState::Routed);
    }
}
