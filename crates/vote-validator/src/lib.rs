// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous vote validation (§4.7): a consensus aggregator that runs
//! every cast vote past the Secretary-Text, Secretary-JSON, and Witness
//! validators, a reconciliation gate that blocks motion adjournment until
//! every vote under it is validated or dead-lettered, and a dispatcher-side
//! circuit breaker that falls back to synchronous in-process validation
//! when the bus is unhealthy.
//!
//! Conceptually this fronts five named streams — `pending-validation`,
//! `validation-requests`, `validation-results`, `validated`, and
//! `dead-letter` — collapsed here into direct async calls between the
//! dispatcher, the aggregator, and the reconciliation gate, since this
//! workspace runs all three co-located in one process (§1 scope).

pub mod aggregator;
pub mod breaker;
pub mod dispatcher;
pub mod metrics;
pub mod reconciliation;

#[cfg(test)]
mod test_support;

pub use aggregator::{ConsensusAggregator, ValidatorRoster};
pub use breaker::CircuitBreaker;
pub use dispatcher::{BusPublishPort, InProcessBus, PublishError, ValidationDispatcher};
pub use reconciliation::ReconciliationGate;
