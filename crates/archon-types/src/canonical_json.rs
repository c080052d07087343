//! Canonical JSON: UTF-8, sorted keys, `(",", ":")` separators, no trailing
//! whitespace (§6.1, §9). This is required wherever bytes cross a trust
//! boundary: signatures, hashes, checkpoints.
//!
//! `serde_json::Map` is a `BTreeMap` as long as the `preserve_order` feature
//! is not enabled (it is not, workspace-wide) so round-tripping a value
//! through `serde_json::Value` is sufficient to obtain sorted keys; the
//! default (de)serializer already writes the compact `,`/`:` separators with
//! no inserted whitespace.

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum CanonicalJsonError {
    #[error("failed to canonicalize value: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalJsonError> {
    let normalized = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&normalized)?)
}

/// Content hash as used throughout the event log: `sha256` over the
/// canonical bytes, hex-encoded. Kept as a plain newtype (not an opaque hash
/// type from a crypto crate) so `archon-types` has no dependency on
/// `archon-crypto` (avoids a cycle: `archon-crypto` will want `archon-types`
/// for key-registry records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn of_canonical_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn of<T: Serialize>(value: &T) -> Result<Self, CanonicalJsonError> {
        Ok(Self::of_canonical_bytes(&to_canonical_bytes(value)?))
    }

    /// Fixed genesis anchor referenced by the event at `sequence == 1`.
    pub fn genesis_anchor() -> Self {
        Self::of_canonical_bytes(b"archon72/genesis")
    }

    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn xor(self, other: Self) -> Self {
        let mut out = [0u8; 32];
        for i in 0..32 {
            out[i] = self.0[i] ^ other.0[i];
        }
        Self(out)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
