// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod activate;
pub mod adjourn;
pub mod cost_snapshot;
pub mod debate;
pub mod decomposition;
pub mod duke_proposals;
pub mod emergence_audit;
pub mod propose;
pub mod rfp;
pub mod selection;
pub mod serve;
pub mod settle;
pub mod verify;
pub mod vote;

/// §6.3 exit codes: 0 on green, 1 on blocked status, for CI gating.
pub const EXIT_GREEN: i32 = 0;
pub const EXIT_BLOCKED: i32 = 1;
