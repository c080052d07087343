// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data model for the Conclave Execution Core: events, motions, votes,
//! halt/cessation state and the executive pipeline's task-drafting types.
//! This crate is intentionally inert — no I/O, no locking, no crypto — so
//! every other crate in the workspace can depend on it without risking a
//! cycle.

pub mod canonical_json;
pub mod event;
pub mod forbidden_language;
pub mod halt;
pub mod ids;
pub mod motion;
pub mod ports;
pub mod task;
pub mod vote;

pub use canonical_json::{CanonicalJsonError, ContentHash};
pub use event::{Event, EventType, HashableEventFields, ModeWatermark, WitnessAttribution};
pub use forbidden_language::{first_emergence_match, first_mechanism_match, has_cross_branch_assignment};
pub use halt::{CessationFlag, HaltState};
pub use ids::{
    Archon, ArchonRole, AgentId, BreachId, CeremonyId, CounterId, LeaseId, MotionId,
    TaskActivationId, VoteId,
};
pub use motion::{Mandate, Motion, MotionStatus, MotionType};
pub use ports::{
    CompletionError, ReconciliationIncomplete, ReconciliationPort, TextCompletionPort,
    VoteValidationDispatchPort,
};
pub use task::{
    AuthLevel, PowerLease, PowerTier, RejectionReason, TaskDraft, TaskDraftLintError, TaskState,
};
pub use vote::{Tally, TallyInvariantViolation, ValidationResult, Vote, VoteChoice};
