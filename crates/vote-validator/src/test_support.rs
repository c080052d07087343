#![cfg(test)]

use crate::aggregator::{ConsensusAggregator, ValidatorRoster};
use crate::reconciliation::ReconciliationGate;
use archon_crypto::{Ed25519Signer, KeyRegistry, Mode};
use archon_types::{AgentId, MotionId, TextCompletionPort, VoteId};
use chrono::{DateTime, Utc};
use event_store::{
    HaltCessationManager, InMemoryEventStore, InMemoryHaltChannel, LocalWitnessAttestor, WitnessPoolConfig,
    WitnessedEventWriter,
};
use std::sync::Arc;

async fn wired_writer(now: DateTime<Utc>) -> Arc<WitnessedEventWriter> {
    let signer = Arc::new(Ed25519Signer::new(Mode::Development));
    let key_registry = Arc::new(KeyRegistry::new());
    let store = Arc::new(InMemoryEventStore::new());
    let halt_manager = Arc::new(HaltCessationManager::new(
        Arc::new(InMemoryHaltChannel::default()),
        Arc::new(InMemoryHaltChannel::default()),
    ));
    let attestor = Arc::new(LocalWitnessAttestor::new(signer.clone(), key_registry.clone()));

    let witnesses: Vec<AgentId> = (0..5).map(|_| AgentId::agent(uuid::Uuid::new_v4())).collect();
    for id in witnesses.iter().cloned().chain([AgentId::system("event-store"), AgentId::system("vote-validator")]) {
        let (key_id, public_key) = signer.generate_keypair().await.unwrap();
        key_registry.register(id, key_id, public_key, now - chrono::Duration::days(1));
    }

    Arc::new(WitnessedEventWriter::new(
        store,
        halt_manager,
        signer,
        key_registry,
        attestor,
        WitnessPoolConfig {
            active_pool: witnesses,
            minimum_viable: 3,
        },
        vec![],
    ))
}

pub async fn wired_gate() -> (Arc<ReconciliationGate>, MotionId, VoteId) {
    let writer = wired_writer(Utc::now()).await;
    let gate = Arc::new(ReconciliationGate::new(writer));
    (gate, MotionId::new(), VoteId::new())
}

pub async fn wired_aggregator(
    secretary_text: Arc<dyn TextCompletionPort>,
    secretary_json: Arc<dyn TextCompletionPort>,
    witness: Arc<dyn TextCompletionPort>,
    max_attempts: u32,
) -> (Arc<ConsensusAggregator>, MotionId, AgentId) {
    let now = Utc::now();
    let writer = wired_writer(now).await;
    let gate = Arc::new(ReconciliationGate::new(writer.clone()));

    let roster = ValidatorRoster {
        secretary_text: (AgentId::system("secretary-text"), secretary_text),
        secretary_json: (AgentId::system("secretary-json"), secretary_json),
        witness: (AgentId::system("witness"), witness),
    };

    let aggregator = Arc::new(ConsensusAggregator::new(roster, writer, gate, max_attempts));
    let motion_id = MotionId::new();
    let archon_id = AgentId::agent(uuid::Uuid::new_v4());
    (aggregator, motion_id, archon_id)
}
