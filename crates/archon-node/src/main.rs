// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Binary wiring the Conclave Execution Core's pipeline stages and
//! operational surfaces behind a uniform CLI (§6.3). Grounded in
//! `tempo-spam`'s `Parser`/`Subcommand`/`.run()` shape; `anyhow` is used
//! here and nowhere else in the workspace (§12).

mod cli;
mod commands;
mod llm;
mod simulation;
mod wiring;

use clap::Parser;
use cli::{ArchonNode, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let format = if environment == "production" { archon_logger::LogFormat::Json } else { archon_logger::LogFormat::Pretty };
    archon_logger::init_logger(format);

    // Fail fast on the DEV_MODE/ENVIRONMENT cross-check (H1) before anything
    // in the process starts, even for subcommands that never touch the
    // event log directly.
    archon_config::RuntimeConfig::from_env()?;

    let args = ArchonNode::parse();
    let exit_code = match args.command {
        Command::Rfp(stage_args) => commands::rfp::run(stage_args).await?,
        Command::DukeProposals(stage_args) => commands::duke_proposals::run(stage_args).await?,
        Command::Selection(stage_args) => commands::selection::run(stage_args).await?,
        Command::Decomposition(stage_args) => commands::decomposition::run(stage_args).await?,
        Command::Propose(propose_args) => commands::propose::run(propose_args).await?,
        Command::Debate(conclave_args) => commands::debate::run(conclave_args).await?,
        Command::Vote(conclave_args) => commands::vote::run(conclave_args).await?,
        Command::Adjourn(conclave_args) => commands::adjourn::run(conclave_args).await?,
        Command::Activate(activate_args) => commands::activate::run(activate_args).await?,
        Command::Settle(settle_args) => commands::settle::run(settle_args).await?,
        Command::Verify(verify_args) => commands::verify::run(verify_args).await?,
        Command::Serve(serve_args) => commands::serve::run(serve_args).await?,
        Command::CostSnapshot(cost_snapshot_args) => commands::cost_snapshot::run(cost_snapshot_args).await?,
        Command::EmergenceAudit(audit_args) => commands::emergence_audit::run(audit_args).await?,
    };

    std::process::exit(exit_code);
}
