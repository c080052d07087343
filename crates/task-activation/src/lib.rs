// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Capability matching, task activation, power leases, and settlement
//! (§4.9, §4.10): which cluster a task goes to, what it is permitted to do
//! while there, and how it settles or reroutes.

pub mod activation;
pub mod cluster;
pub mod earl_routing;
pub mod matching;
pub mod metrics;
pub mod settlement;

pub use activation::{ActivationError, TaskActivation, TaskActivator};
pub use cluster::{AvailabilityStatus, Cluster, ClusterId, ClusterStatus, ConsentPolicy};
pub use earl_routing::EarlRoutingTable;
pub use matching::{match_clusters, match_clusters_excluding};
pub use settlement::{SettlementEngine, SettlementError, SettlementOutcome};
