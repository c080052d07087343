// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! The uniform CLI shape of §6.3: one `clap::Parser` binary, one
//! `Subcommand` per pipeline stage plus the operational surfaces, grounded
//! in `tempo-spam`'s `Parser`/`Subcommand`/`.run()` dispatch convention.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "archon-node", version, about = "Archon 72 Conclave Execution Core", long_about = None)]
pub struct ArchonNode {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stage 1: gather the Implementation Dossier from the Presidents.
    Rfp(StageArgs),
    /// Stage 2: gather each Duke's proposal against the dossier.
    DukeProposals(StageArgs),
    /// Stage 3: score and select a winning proposal.
    Selection(StageArgs),
    /// Stage 4: decompose the winning Tactics into TaskDrafts.
    Decomposition(StageArgs),
    /// §4.6 step 1: propose a motion, opening a Conclave session file.
    Propose(ProposeArgs),
    /// §4.6 step 2: run the no-preview debate rounds over a proposed motion.
    Debate(ConclaveArgs),
    /// §4.6 step 3: capture optimistic votes, validated before this exits.
    Vote(ConclaveArgs),
    /// §4.6 step 4: reconcile and ratify or fail the motion.
    Adjourn(ConclaveArgs),
    /// §4.9: match a task to a cluster and issue its power lease.
    Activate(ActivateArgs),
    /// §4.10: settle a reported task, or decline/withdraw and reroute it.
    Settle(SettleArgs),
    /// Verify the witnessed event log's hash chain over a sequence range.
    Verify(VerifyArgs),
    /// Serve the public observer read API.
    Serve(ServeArgs),
    /// Publish the cost snapshot for the current cycle.
    CostSnapshot(CostSnapshotArgs),
    /// Run the quarterly emergence/language audit over a directory of artifacts.
    EmergenceAudit(EmergenceAuditArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Llm,
    Simulation,
    Auto,
}

/// Shared shape for the four executive-pipeline stage subcommands (§6.3).
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// Explicit session input file. Without this, the most recently
    /// modified `*.json` under `--session-dir` is used.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory searched for the most recent session when `--input` is omitted.
    #[arg(long, default_value = "sessions")]
    pub session_dir: PathBuf,

    /// Directory artifacts (canonical JSON + Markdown sibling) are written to.
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value = "auto")]
    pub mode: Mode,

    /// Directory used for per-unit checkpointing. Without this (and without
    /// `--no-checkpoint`), checkpoints are held in memory only.
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Disable checkpointing entirely for this run.
    #[arg(long)]
    pub no_checkpoint: bool,

    /// Delete this stage's checkpoints before running, forcing a clean rerun.
    #[arg(long)]
    pub clear_checkpoints: bool,

    /// Restrict the run to a single unit (a President/Duke id for
    /// rfp/duke-proposals, unused for selection, an Earl id for
    /// decomposition).
    #[arg(long)]
    pub unit_id: Option<String>,

    /// Run the full stage without writing artifacts or checkpoints.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// First sequence number to verify (inclusive).
    #[arg(long, default_value_t = 1)]
    pub from: u64,
    /// Last sequence number to verify (inclusive). Defaults to the head.
    #[arg(long)]
    pub to: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
}

#[derive(Parser, Debug)]
pub struct CostSnapshotArgs {}

#[derive(Parser, Debug)]
pub struct EmergenceAuditArgs {
    /// Directory of plain-text artifacts to scan for forbidden language.
    #[arg(long)]
    pub artifacts_dir: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionTypeArg {
    Constitutional,
    Policy,
    Procedural,
    Open,
}

impl From<MotionTypeArg> for archon_types::MotionType {
    fn from(value: MotionTypeArg) -> Self {
        match value {
            MotionTypeArg::Constitutional => archon_types::MotionType::Constitutional,
            MotionTypeArg::Policy => archon_types::MotionType::Policy,
            MotionTypeArg::Procedural => archon_types::MotionType::Procedural,
            MotionTypeArg::Open => archon_types::MotionType::Open,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ProposeArgs {
    /// Conclave session file; created by this command, read and rewritten by
    /// `debate`/`vote`/`adjourn`.
    #[arg(long)]
    pub session: PathBuf,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub text: String,

    #[arg(long, value_enum, default_value = "procedural")]
    pub motion_type: MotionTypeArg,

    /// `agent-{uuid}` or `SYSTEM:{name}`.
    #[arg(long)]
    pub proposer: String,

    /// The full archon roster for this motion's debate and vote, comma
    /// separated, each `agent-{uuid}` or `SYSTEM:{name}`.
    #[arg(long, value_delimiter = ',')]
    pub archons: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct ConclaveArgs {
    #[arg(long)]
    pub session: PathBuf,

    #[arg(long, value_enum, default_value = "auto")]
    pub mode: Mode,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthLevelArg {
    Standard,
    Sensitive,
    Restricted,
}

impl From<AuthLevelArg> for archon_types::AuthLevel {
    fn from(value: AuthLevelArg) -> Self {
        match value {
            AuthLevelArg::Standard => archon_types::AuthLevel::Standard,
            AuthLevelArg::Sensitive => archon_types::AuthLevel::Sensitive,
            AuthLevelArg::Restricted => archon_types::AuthLevel::Restricted,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerTierArg {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
}

impl From<PowerTierArg> for archon_types::PowerTier {
    fn from(value: PowerTierArg) -> Self {
        match value {
            PowerTierArg::Tier0 => archon_types::PowerTier::Tier0,
            PowerTierArg::Tier1 => archon_types::PowerTier::Tier1,
            PowerTierArg::Tier2 => archon_types::PowerTier::Tier2,
            PowerTierArg::Tier3 => archon_types::PowerTier::Tier3,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ActivateArgs {
    /// Activation session file; created by this command, read and
    /// rewritten by `settle`.
    #[arg(long)]
    pub session: PathBuf,

    /// JSON array of candidate `Cluster`s to match the task against.
    #[arg(long)]
    pub clusters: PathBuf,

    #[arg(long)]
    pub task_ref: String,

    #[arg(long, value_delimiter = ',')]
    pub required_tags: Vec<String>,

    #[arg(long, value_enum, default_value = "standard")]
    pub sensitivity_gate: AuthLevelArg,

    #[arg(long, value_enum, default_value = "tier1")]
    pub tier: PowerTierArg,

    #[arg(long, value_enum, default_value = "standard")]
    pub auth_level: AuthLevelArg,

    #[arg(long)]
    pub scope: String,

    #[arg(long, default_value_t = 3600)]
    pub ttl_secs: u64,

    #[arg(long)]
    pub domain: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettleOutcomeArg {
    Accept,
    Reject,
    DeclineOrWithdraw,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionReasonArg {
    OutcomeNotMet,
    ConstraintViolation,
    ScopeDrift,
    UnsafeContent,
    ProvenanceInsufficient,
}

impl From<RejectionReasonArg> for archon_types::RejectionReason {
    fn from(value: RejectionReasonArg) -> Self {
        match value {
            RejectionReasonArg::OutcomeNotMet => archon_types::RejectionReason::OutcomeNotMet,
            RejectionReasonArg::ConstraintViolation => archon_types::RejectionReason::ConstraintViolation,
            RejectionReasonArg::ScopeDrift => archon_types::RejectionReason::ScopeDrift,
            RejectionReasonArg::UnsafeContent => archon_types::RejectionReason::UnsafeContent,
            RejectionReasonArg::ProvenanceInsufficient => archon_types::RejectionReason::ProvenanceInsufficient,
        }
    }
}

#[derive(Parser, Debug)]
pub struct SettleArgs {
    #[arg(long)]
    pub session: PathBuf,

    #[arg(long, value_enum)]
    pub outcome: SettleOutcomeArg,

    /// Required when `--outcome reject`.
    #[arg(long, value_enum)]
    pub rejection_reason: Option<RejectionReasonArg>,

    /// JSON array of candidate `Cluster`s to reroute into; required for
    /// `--outcome decline-or-withdraw`, unused otherwise.
    #[arg(long)]
    pub clusters: Option<PathBuf>,
}
