// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! The four-stage executive pipeline (§4.8): RFP generation, Duke proposals,
//! selection, and tactic decomposition, each stage LLM-orchestrated with
//! per-agent checkpointing and a constitutional lint gating its output.

pub mod artifact;
pub mod checkpoint;
pub mod counters;
pub mod decomposition;
pub mod duke_proposal;
pub mod rfp;
pub mod sections;
pub mod selection;

pub use artifact::{
    render_decomposition_markdown, render_dossier_markdown, render_duke_proposal_markdown,
    render_selection_markdown, write_artifact, ArtifactError,
};
pub use checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use counters::CounterAllocator;
pub use decomposition::{
    DecompositionError, DecompositionOrchestrator, Earl, EarlRoutingEntry, TacticDecomposition,
    TacticPolicy,
};
pub use duke_proposal::{
    CoverageEntry, Duke, DukeProposal, DukeProposalError, DukeProposalOrchestrator, ResourceRequest,
    Risk, Tactic,
};
pub use rfp::{
    Constraint, Deliverable, DossierStatus, EvaluationCriterion, FunctionalRequirement,
    ImplementationDossier, NonFunctionalRequirement, President, RfpError, RfpOrchestrator,
};
pub use sections::{extract_all_labeled_lines, extract_labeled_lines};
pub use selection::{
    Decision, ProposalScore, ScoringDimensions, SelectionError, SelectionOrchestrator,
    SelectionResult, Tier,
};
