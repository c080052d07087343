// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! §4.9: matches a task to a cluster, issues its power lease, and opens an
//! activation session file for `settle` to pick up later.

use crate::cli::ActivateArgs;
use crate::commands::EXIT_GREEN;
use crate::wiring::{build_event_log_stack, new_events_since, save_activation_session, ActivationSession};
use archon_types::{AgentId, CounterId};
use std::time::Duration;
use task_activation::{Cluster, EarlRoutingTable, TaskActivator};

pub async fn run(args: ActivateArgs) -> anyhow::Result<i32> {
    let clusters: Vec<Cluster> = serde_json::from_slice(
        &std::fs::read(&args.clusters)
            .map_err(|error| anyhow::anyhow!("reading clusters file {}: {error}", args.clusters.display()))?,
    )?;

    let now = chrono::Utc::now();
    let stack = build_event_log_stack(5, now).await;
    let prior_len = stack.store.len().await;

    let activator = TaskActivator::new(stack.writer.clone());
    let earl_routing = EarlRoutingTable::new(AgentId::system("earl-default"));

    let activation = activator
        .activate(
            CounterId(args.task_ref.clone()),
            &args.required_tags,
            args.sensitivity_gate.into(),
            args.tier.into(),
            args.auth_level.into(),
            args.scope.clone(),
            Duration::from_secs(args.ttl_secs),
            &clusters,
            &earl_routing,
            &args.domain,
            now,
        )
        .await?;

    let session = ActivationSession {
        activation: Some(activation.clone()),
        clusters,
        domain: args.domain,
        required_tags: args.required_tags,
        sensitivity_gate: args.sensitivity_gate.into(),
        events: new_events_since(&stack, prior_len).await,
    };
    save_activation_session(&args.session, &session).await?;

    tracing::info!(
        activation_id = %activation.activation_id.0,
        cluster_id = %activation.cluster_id,
        "task activated and routed"
    );
    Ok(EXIT_GREEN)
}
