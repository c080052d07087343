// Copyright © Archon 72 Contributors
// SPDX-License-Identifier: Apache-2.0

//! Verifiable-random witness selection (§4.5) plus out-of-band anomaly
//! detection (concentration, collusion, pool exhaustion).

pub mod anomaly;
pub mod selection;

pub use anomaly::{AnomalyMonitor, AnomalyWarning};
pub use selection::{compute_seed, select_witnesses, SelectionError};
