// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process wiring shared by every subcommand: the completion provider
//! chosen by `--mode`, the checkpoint store chosen by `--checkpoint-dir`,
//! and the witnessed-event-log stack (store, signer, key registry, halt
//! manager, writer) used by `verify`, `serve`, `cost-snapshot`, and
//! `emergence-audit`.

use crate::cli::Mode;
use crate::llm::LlmCompletion;
use crate::simulation::SimulationCompletion;
use archon_crypto::{Ed25519Signer, KeyRegistry, Mode as CryptoMode, SigningPort};
use archon_types::{AgentId, Event, Motion, TextCompletionPort};
use chrono::{DateTime, Utc};
use event_store::{
    EventStore, HaltCessationManager, InMemoryEventStore, InMemoryHaltChannel, LocalWitnessAttestor,
    WitnessPoolConfig, WitnessedEventWriter,
};
use executive_pipeline::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `mode=auto` uses this env var to decide whether an LLM provider is
/// configured; absent, it falls back to `simulation` (§6.3).
pub const LLM_ENDPOINT_VAR: &str = "ARCHON_LLM_ENDPOINT";

pub fn resolve_completion(mode: Mode) -> anyhow::Result<Arc<dyn TextCompletionPort>> {
    let endpoint = std::env::var(LLM_ENDPOINT_VAR).ok();
    match (mode, endpoint) {
        (Mode::Simulation, _) => Ok(Arc::new(SimulationCompletion)),
        (Mode::Llm, Some(endpoint)) => Ok(Arc::new(LlmCompletion::new(endpoint))),
        (Mode::Llm, None) => anyhow::bail!("--mode llm requires {LLM_ENDPOINT_VAR} to be set"),
        (Mode::Auto, Some(endpoint)) => Ok(Arc::new(LlmCompletion::new(endpoint))),
        (Mode::Auto, None) => Ok(Arc::new(SimulationCompletion)),
    }
}

/// A `VoteValidationDispatchPort` that never dispatches, for the `propose`
/// and `debate` stages of a motion's lifecycle, neither of which casts or
/// validates a vote — `DeliberationEngine` still requires a dispatch port at
/// construction, so this stands in rather than leaving the field optional.
pub struct NoopDispatch;

#[async_trait::async_trait]
impl archon_types::VoteValidationDispatchPort for NoopDispatch {
    async fn dispatch_for_validation(&self, _vote: &archon_types::Vote) {}
}

pub fn resolve_checkpoints(checkpoint_dir: Option<PathBuf>, no_checkpoint: bool) -> Arc<dyn CheckpointStore> {
    if no_checkpoint {
        return Arc::new(InMemoryCheckpointStore::new());
    }
    match checkpoint_dir {
        Some(dir) => Arc::new(FileCheckpointStore::new(dir)),
        None => Arc::new(InMemoryCheckpointStore::new()),
    }
}

/// `--input` names a file directly; without it, the most recently modified
/// `*.json` under `dir` is used (§6.3 "auto-detect most-recent session").
pub fn resolve_input(input: Option<PathBuf>, dir: &std::path::Path) -> anyhow::Result<PathBuf> {
    if let Some(input) = input {
        return Ok(input);
    }
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = std::fs::read_dir(dir)
        .map_err(|error| anyhow::anyhow!("reading session directory {}: {error}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|entry| entry.metadata().ok().and_then(|m| m.modified().ok()).map(|t| (t, entry.path())))
        .collect();
    candidates.sort_by_key(|(modified, _)| *modified);
    candidates
        .pop()
        .map(|(_, path)| path)
        .ok_or_else(|| anyhow::anyhow!("no session file found under {}", dir.display()))
}

/// A fully-wired, single-process witnessed event log: an in-memory store
/// (the persistence substrate is an external port, §1 Non-goals) signed by
/// a development-mode Ed25519 signer with every named agent pre-registered.
pub struct EventLogStack {
    pub store: Arc<event_store::InMemoryEventStore>,
    pub key_registry: Arc<KeyRegistry>,
    pub halt_manager: Arc<HaltCessationManager>,
    pub writer: Arc<WitnessedEventWriter>,
}

/// System identities every in-process module signs its own witnessed events
/// under (`WitnessedEventWriter`'s own `WitnessSelected` sub-events, plus
/// `deliberation`/`vote-validator`/`task-activation`'s registrar/aggregator/
/// activator writer ids). Registered unconditionally so any subcommand can
/// append through any of these modules without a dedicated wiring path per
/// command.
const INTERNAL_WRITER_AGENTS: &[&str] =
    &["archon-node", "event-store", "deliberation-registrar", "vote-validator", "task-activation"];

pub async fn build_event_log_stack(witness_count: usize, now: DateTime<Utc>) -> EventLogStack {
    build_event_log_stack_with_agents(witness_count, now, &[]).await
}

/// As `build_event_log_stack`, plus key registration for `extra_agents` —
/// the archons taking part in a motion's debate/vote, or the proposer,
/// supplied by the caller so they can sign the events attributed to them.
pub async fn build_event_log_stack_with_agents(
    witness_count: usize,
    now: DateTime<Utc>,
    extra_agents: &[AgentId],
) -> EventLogStack {
    let signer = Arc::new(Ed25519Signer::new(CryptoMode::Development));
    let key_registry = Arc::new(KeyRegistry::new());
    let store = Arc::new(InMemoryEventStore::new());
    let halt_manager = Arc::new(HaltCessationManager::new(
        Arc::new(InMemoryHaltChannel::default()),
        Arc::new(InMemoryHaltChannel::default()),
    ));
    let attestor = Arc::new(LocalWitnessAttestor::new(signer.clone(), key_registry.clone()));

    let witnesses: Vec<AgentId> = (0..witness_count).map(|_| AgentId::agent(uuid::Uuid::new_v4())).collect();
    let internal_agents = INTERNAL_WRITER_AGENTS.iter().map(|name| AgentId::system(*name));
    for id in witnesses.iter().cloned().chain(extra_agents.iter().cloned()).chain(internal_agents) {
        let (key_id, public_key) = signer.generate_keypair().await.expect("dev signer keygen is infallible");
        key_registry.register(id, key_id, public_key, now - chrono::Duration::days(1));
    }

    let writer = Arc::new(WitnessedEventWriter::new(
        store.clone(),
        halt_manager.clone(),
        signer,
        key_registry.clone(),
        attestor,
        WitnessPoolConfig { active_pool: witnesses, minimum_viable: witness_count.min(3) },
        vec![],
    ));

    EventLogStack { store, key_registry, halt_manager, writer }
}

/// Reseeds a freshly built `EventLogStack`'s store with events witnessed by
/// an earlier process invocation. Safe to call with events this store has
/// never seen (`InMemoryEventStore::append_batch` only rejects a sequence
/// already occupied), which is always true for a stack that was just built.
pub async fn seed_event_log_stack(stack: &EventLogStack, events: &[Event]) -> anyhow::Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    stack
        .store
        .append_batch(events.to_vec())
        .await
        .map_err(|error| anyhow::anyhow!("reseeding event log with prior session events: {error}"))
}

/// Events appended to `stack` since `prior_len` (the store's length before
/// this invocation's work began), for folding back into the session file.
pub async fn new_events_since(stack: &EventLogStack, prior_len: u64) -> Vec<Event> {
    let head = stack.store.len().await;
    if head <= prior_len {
        return Vec::new();
    }
    stack.store.range(prior_len + 1, head).await
}

/// Cross-invocation state for a motion moving through propose/debate/vote/
/// adjourn (§4.6): the witnessed event log is rebuilt fresh every CLI
/// invocation (`build_event_log_stack`'s doc comment), so the archons taking
/// part, the motion itself, and everything witnessed about it so far travel
/// in this file between one subcommand and the next.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConclaveSession {
    pub archons: Vec<AgentId>,
    pub motion: Option<Motion>,
    pub events: Vec<Event>,
}

pub fn load_conclave_session(path: &Path) -> anyhow::Result<ConclaveSession> {
    if !path.exists() {
        return Ok(ConclaveSession::default());
    }
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

pub async fn save_conclave_session(path: &Path, session: &ConclaveSession) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_vec_pretty(session)?).await?;
    Ok(())
}

/// Cross-invocation state for one task moving through activate/settle
/// (§4.9/§4.10), the `task-activation` counterpart to `ConclaveSession`. The
/// owning Earl is re-routed fresh on every invocation rather than persisted:
/// `EarlRoutingTable::route` is a pure function of `domain` against a table
/// seeded with only the system default fallback, so it is deterministic
/// without needing the table itself to survive the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationSession {
    pub activation: Option<task_activation::TaskActivation>,
    pub clusters: Vec<task_activation::Cluster>,
    pub domain: String,
    pub required_tags: Vec<String>,
    pub sensitivity_gate: archon_types::AuthLevel,
    pub events: Vec<Event>,
}

pub fn load_activation_session(path: &Path) -> anyhow::Result<ActivationSession> {
    Ok(serde_json::from_slice(&std::fs::read(path).map_err(|error| {
        anyhow::anyhow!("reading activation session {}: {error}", path.display())
    })?)?)
}

pub async fn save_activation_session(path: &Path, session: &ActivationSession) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_vec_pretty(session)?).await?;
    Ok(())
}
