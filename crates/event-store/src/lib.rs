// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! The witnessed, hash-chained event log (§3, §4.1-§4.3): append-only
//! storage, the dual-channel halt/cessation controller, the witnessed
//! append algorithm, and the startup hash-chain verifier.

pub mod halt_channel;
pub mod halt_manager;
pub mod metrics;
pub mod store;
pub mod verifier;
pub mod writer;

pub use halt_channel::{HaltChannel, InMemoryHaltChannel};
pub use halt_manager::{HaltCessationManager, HaltError, QUIET_PERIOD};
pub use store::{EventStore, InMemoryEventStore, StoreError};
pub use verifier::{HashChainVerifier, IntegrityViolation, VerificationReport};
pub use writer::{
    AppendError, AttestationError, EventSink, LocalWitnessAttestor, WitnessAttestationPort,
    WitnessPoolConfig, WitnessedEventWriter,
};
