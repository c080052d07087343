// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::cli::CostSnapshotArgs;
use crate::commands::EXIT_GREEN;
use crate::wiring::build_event_log_stack;
use governance_audit::CostSnapshot;

pub async fn run(_args: CostSnapshotArgs) -> anyhow::Result<i32> {
    let stack = build_event_log_stack(5, chrono::Utc::now()).await;
    let snapshot = CostSnapshot::at_cycle_open(stack.store.clone()).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(EXIT_GREEN)
}
