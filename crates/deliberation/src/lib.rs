// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Motion lifecycle orchestration (§4.6): propose, no-preview debate rounds,
//! and optimistic vote capture bounded by a configurable concurrency limit.

pub mod engine;
pub mod optimistic_vote;
pub mod registrar;

pub use engine::{DeliberationConfig, DeliberationEngine, DeliberationError};
pub use optimistic_vote::parse_optimistic_choice;
pub use registrar::{Registrar, RegistrarError, RegistrarOutcome};
