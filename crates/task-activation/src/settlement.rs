use crate::activation::{ActivationError, TaskActivation, TaskActivator};
use crate::cluster::Cluster;
use crate::earl_routing::EarlRoutingTable;
use crate::matching::match_clusters_excluding;
use crate::ClusterId;
use archon_types::{AgentId, AuthLevel, EventType, RejectionReason, TaskState};
use chrono::{DateTime, Utc};
use event_store::AppendError;
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Activation(#[from] ActivationError),
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error("failed to encode event payload: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Terminal outcome of settlement (§4.10): every activation settles as
/// exactly one of these, never silently drops out of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Accepted,
    Rejected(RejectionReason),
    /// Rerouting exhausted every remaining cluster; escalated to the owning
    /// Duke rather than left unresolved.
    EscalatedToDuke { excluded: Vec<ClusterId> },
    Rerouted(ClusterId),
}

/// Applies §4.10's settlement table and the decline/withdraw → reroute →
/// escalate path. Shares `TaskActivator` so rerouting reuses the exact same
/// matching and transition machinery activation used.
pub struct SettlementEngine<'a> {
    activator: &'a TaskActivator,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(activator: &'a TaskActivator) -> Self {
        Self { activator }
    }

    /// `REPORTED → CLOSED` (§4.10, accepted outcome).
    pub async fn accept(
        &self,
        activation: &mut TaskActivation,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.activator
            .transition(activation, TaskState::Closed, Some(EventType::TaskClosed), now)
            .await?;
        Ok(SettlementOutcome::Accepted)
    }

    /// `REPORTED → {REJECTED, QUARANTINED}` per the §4.10 reason-code table.
    pub async fn reject(
        &self,
        activation: &mut TaskActivation,
        reason: RejectionReason,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let target = reason.target_state();
        let event_type = match target {
            TaskState::Rejected => EventType::TaskRejected,
            TaskState::Quarantined => EventType::TaskQuarantined,
            other => unreachable!("RejectionReason::target_state never yields {other:?}"),
        };
        let payload_event = event_type;
        self.activator.transition(activation, target, Some(payload_event), now).await?;
        Ok(SettlementOutcome::Rejected(reason))
    }

    /// `ROUTED → DECLINED` or `IN_PROGRESS → WITHDRAWN`, then the §4.10
    /// rerouter: next eligible cluster excluding every cluster already
    /// tried, or `BLOCKED` + escalation to the owning Duke on exhaustion.
    pub async fn decline_or_withdraw(
        &self,
        activation: &mut TaskActivation,
        clusters: &[Cluster],
        required_tags: &[String],
        sensitivity_gate: AuthLevel,
        earl_routing: &EarlRoutingTable,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let decline_event = match activation.state {
            TaskState::Routed => Some(EventType::TaskDeclined),
            TaskState::InProgress => None,
            _ => None,
        };
        let interim = match activation.state {
            TaskState::Routed => TaskState::Declined,
            TaskState::InProgress => TaskState::Withdrawn,
            other => {
                return Err(SettlementError::Activation(ActivationError::IllegalTransition(
                    activation.activation_id,
                    other,
                    TaskState::NeedsReroute,
                )))
            }
        };
        self.activator.transition(activation, interim, decline_event, now).await?;
        self.activator
            .transition(activation, TaskState::NeedsReroute, None, now)
            .await?;

        self.reroute(activation, clusters, required_tags, sensitivity_gate, earl_routing, domain, now)
            .await
    }

    /// Re-entrant: `BLOCKED` activations can be retried once new clusters
    /// become available, without re-running the decline/withdraw step.
    pub async fn reroute(
        &self,
        activation: &mut TaskActivation,
        clusters: &[Cluster],
        required_tags: &[String],
        sensitivity_gate: AuthLevel,
        earl_routing: &EarlRoutingTable,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let excluded: BTreeSet<ClusterId> = activation.excluded_clusters.iter().cloned().collect();
        let matched = match_clusters_excluding(clusters, required_tags, sensitivity_gate, 1, &excluded);

        match matched.into_iter().next() {
            Some(next_cluster) => {
                activation.excluded_clusters.push(activation.cluster_id.clone());
                activation.cluster_id = next_cluster.clone();
                activation.earl_id = earl_routing.route(domain);
                self.activator.transition(activation, TaskState::Routed, None, now).await?;
                tracing::info!(
                    activation_id = %activation.activation_id,
                    cluster_id = %next_cluster,
                    "task rerouted to next eligible cluster"
                );
                Ok(SettlementOutcome::Rerouted(next_cluster))
            }
            None => {
                activation.excluded_clusters.push(activation.cluster_id.clone());
                self.activator.transition(activation, TaskState::Blocked, None, now).await?;
                tracing::warn!(
                    activation_id = %activation.activation_id,
                    excluded = ?activation.excluded_clusters,
                    "rerouting exhausted every eligible cluster; escalating to owning Duke"
                );
                Ok(SettlementOutcome::EscalatedToDuke { excluded: activation.excluded_clusters.clone() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{AvailabilityStatus, ClusterStatus, ConsentPolicy};
    use archon_crypto::{Ed25519Signer, KeyRegistry, Mode, SigningPort};
    use archon_types::{CounterId, PowerTier};
    use event_store::{HaltCessationManager, InMemoryEventStore, InMemoryHaltChannel, LocalWitnessAttestor, WitnessPoolConfig};
    use std::sync::Arc;
    use std::time::Duration;

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
        let writer = Arc::new(event_store::WitnessedEventWriter::new(
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

    async fn routed_activation(activator: &TaskActivator, clusters: &[Cluster], now: DateTime<Utc>) -> TaskActivation {
        let table = EarlRoutingTable::new(AgentId::system("earl-default"));
        activator
            .activate(
                CounterId::new("TASK", "GUSI", 1),
                &["dev_backend".into()],
                AuthLevel::Standard,
                PowerTier::Tier1,
                AuthLevel::Standard,
                "repo:infra".into(),
                Duration::from_secs(3600),
                clusters,
                &table,
                "infrastructure",
                now,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reporting_then_rejecting_for_unsafe_content_quarantines() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let clusters = vec![cluster("alpha")];
        let mut activation = routed_activation(&activator, &clusters, now).await;

        activator
            .transition(&mut activation, TaskState::Accepted, Some(EventType::TaskAccepted), now)
            .await
            .unwrap();
        activator
            .transition(&mut activation, TaskState::InProgress, None, now)
            .await
            .unwrap();
        activator
            .transition(&mut activation, TaskState::Reported, Some(EventType::TaskReported), now)
            .await
            .unwrap();

        let settlement = SettlementEngine::new(&activator);
        let outcome = settlement.reject(&mut activation, RejectionReason::UnsafeContent, now).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Rejected(RejectionReason::UnsafeContent));
        assert_eq!(activation.state, TaskState::Quarantined);
    }

    #[tokio::test]
    async fn decline_reroutes_to_the_next_eligible_cluster() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let clusters = vec![cluster("alpha"), cluster("bravo")];
        let mut activation = routed_activation(&activator, &clusters, now).await;
        assert_eq!(activation.cluster_id, ClusterId("alpha".into()));

        let table = EarlRoutingTable::new(AgentId::system("earl-default"));
        let settlement = SettlementEngine::new(&activator);
        let outcome = settlement
            .decline_or_withdraw(&mut activation, &clusters, &["dev_backend".into()], AuthLevel::Standard, &table, "infrastructure", now)
            .await
            .unwrap();

        assert_eq!(outcome, SettlementOutcome::Rerouted(ClusterId("bravo".into())));
        assert_eq!(activation.state, TaskState::Routed);
        assert_eq!(activation.cluster_id, ClusterId("bravo".into()));
    }

    #[tokio::test]
    async fn exhausting_every_cluster_blocks_and_escalates() {
        let now = Utc::now();
        let activator = wired_activator(now).await;
        let clusters = vec![cluster("alpha")];
        let mut activation = routed_activation(&activator, &clusters, now).await;

        let table = EarlRoutingTable::new(AgentId::system("earl-default"));
        let settlement = SettlementEngine::new(&activator);
        let outcome = settlement
            .decline_or_withdraw(&mut activation, &clusters, &["dev_backend".into()], AuthLevel::Standard, &table, "infrastructure", now)
            .await
            .unwrap();

        assert_eq!(outcome, SettlementOutcome::EscalatedToDuke { excluded: vec![ClusterId("alpha".into())] });
        assert_eq!(activation.state, TaskState::Blocked);
    }
}
