// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Public, unauthenticated read-only HTTP surface over the witnessed event
//! log (§4.12). Grounded in `aptos-api`'s split between a thin `axum`
//! routing layer and the read logic it calls into: `proof`, `gap`, and
//! `subscriptions` each expose pure/async logic independent of HTTP, and
//! `routes` is the only module that knows about `axum` request/response
//! types.

pub mod gap;
pub mod proof;
pub mod routes;
pub mod subscriptions;

pub use gap::{GapError, GapOutcome, GapReconciler};
pub use proof::{ChainProof, ProofError, ProofLink, ProofService};
pub use routes::{build_router, AppState, MAX_RANGE};
pub use subscriptions::{Subscription, WebhookDispatchPort, WebhookRegistry};
