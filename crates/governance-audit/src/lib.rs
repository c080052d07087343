// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Breach declarations, keeper-override accounting, cost snapshots, and the
//! quarterly emergence/language audit (§4.11, §4.13, §4.14). Grounded in
//! `aptos-telemetry`'s "collect + report" shape: every public function here
//! is a read over the witnessed event log (or a write of one of the
//! closed-vocabulary governance events) — none of it invents private state
//! that could drift from the record.

pub mod breach;
pub mod cost_snapshot;
pub mod emergence_audit;
pub mod override_tracker;

pub use breach::{Breach, BreachError, BreachRegistry, BreachType, ESCALATION_WINDOW};
pub use cost_snapshot::CostSnapshot;
pub use emergence_audit::{Artifact, AuditError, EmergenceAuditor, Quarter, ViolationRecord, REMEDIATION_WINDOW};
pub use override_tracker::{KeeperOverrideInvoker, OverrideError, OverrideKind, ThresholdStatus};
