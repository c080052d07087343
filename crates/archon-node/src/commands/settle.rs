// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! §4.10: settles a reported task, or declines/withdraws it and reroutes
//! through the next eligible cluster.

use crate::cli::{SettleArgs, SettleOutcomeArg};
use crate::commands::{EXIT_BLOCKED, EXIT_GREEN};
use crate::wiring::{build_event_log_stack, load_activation_session, new_events_since, save_activation_session, seed_event_log_stack};
use task_activation::{Cluster, EarlRoutingTable, SettlementEngine, SettlementOutcome, TaskActivator};

pub async fn run(args: SettleArgs) -> anyhow::Result<i32> {
    let mut session = load_activation_session(&args.session)?;
    let mut activation = session
        .activation
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no activation recorded yet in session {}", args.session.display()))?;

    let now = chrono::Utc::now();
    let stack = build_event_log_stack(5, now).await;
    seed_event_log_stack(&stack, &session.events).await?;
    let prior_len = stack.store.len().await;

    let activator = TaskActivator::new(stack.writer.clone());
    let settlement = SettlementEngine::new(&activator);

    let outcome = match args.outcome {
        SettleOutcomeArg::Accept => settlement.accept(&mut activation, now).await?,
        SettleOutcomeArg::Reject => {
            let reason = args
                .rejection_reason
                .ok_or_else(|| anyhow::anyhow!("--rejection-reason is required with --outcome reject"))?;
            settlement.reject(&mut activation, reason.into(), now).await?
        }
        SettleOutcomeArg::DeclineOrWithdraw => {
            let clusters_path = args
                .clusters
                .ok_or_else(|| anyhow::anyhow!("--clusters is required with --outcome decline-or-withdraw"))?;
            let clusters: Vec<Cluster> = serde_json::from_slice(
                &std::fs::read(&clusters_path)
                    .map_err(|error| anyhow::anyhow!("reading clusters file {}: {error}", clusters_path.display()))?,
            )?;
            let earl_routing = EarlRoutingTable::new(archon_types::AgentId::system("earl-default"));
            let result = settlement
                .decline_or_withdraw(
                    &mut activation,
                    &clusters,
                    &session.required_tags,
                    session.sensitivity_gate,
                    &earl_routing,
                    &session.domain,
                    now,
                )
                .await?;
            session.clusters = clusters;
            result
        }
    };

    session.activation = Some(activation.clone());
    session.events.extend(new_events_since(&stack, prior_len).await);
    save_activation_session(&args.session, &session).await?;

    let exit_code = match &outcome {
        SettlementOutcome::Accepted | SettlementOutcome::Rerouted(_) => EXIT_GREEN,
        SettlementOutcome::Rejected(_) | SettlementOutcome::EscalatedToDuke { .. } => EXIT_BLOCKED,
    };

    tracing::info!(activation_id = %activation.activation_id.0, ?outcome, "task settled");
    Ok(exit_code)
}
