// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Signing, key registry, and key-ceremony state machine. Deliberately
//! isolated: nothing outside this crate reaches into `ed25519-dalek`
//! directly (mirrors the teacher's "no inter-project dependencies into the
//! leaf crypto crate" discipline, applied in the other direction — this is
//! the leaf everyone else depends on).

pub mod ceremony;
pub mod key_registry;
pub mod mode;
pub mod signing;

pub use ceremony::{Ceremony, CeremonyError, CeremonyRegistry, CeremonyStatus};
pub use key_registry::{KeyRecord, KeyRegistry, KeyRegistryError, DEFAULT_ROTATION_OVERLAP};
pub use mode::{resolve_mode, Mode, ModeResolutionError};
pub use signing::{verify_detached, Ed25519Signer, KeyId, SigningError, SigningPort};
