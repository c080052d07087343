use crate::mode::Mode;
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use rand_core::OsRng;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct KeyId(pub uuid::Uuid);

impl KeyId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("unknown key id: {0}")]
    UnknownKey(KeyId),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("malformed signature bytes")]
    MalformedSignature,
}

/// The capability set named in §4.4. Kept as a trait (not a concrete type)
/// so a production HSM-backed implementation can be swapped in without
/// touching any caller — the HSM itself is out of scope (§1).
#[async_trait]
pub trait SigningPort: Send + Sync {
    async fn sign(&self, key_id: KeyId, bytes: &[u8]) -> Result<Vec<u8>, SigningError>;
    async fn verify(&self, key_id: KeyId, bytes: &[u8], signature: &[u8]) -> Result<bool, SigningError>;
    async fn generate_keypair(&self) -> Result<(KeyId, Vec<u8>), SigningError>;
    fn get_mode(&self) -> Mode;
}

/// Dev/prod Ed25519 signer. In production mode this still signs in-process
/// (the HSM-backed port is out of scope, §1's `SigningPort`); the only
/// behavioral difference between modes is the `mode_watermark` the caller
/// embeds in signed content (RT-1) — this type never inspects the payload,
/// it only reports its mode via `get_mode`.
pub struct Ed25519Signer {
    mode: Mode,
    keys: RwLock<HashMap<KeyId, SigningKey>>,
}

impl Ed25519Signer {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a previously-generated key (e.g. restored from the key
    /// registry) for signing by this port.
    pub fn install_key(&self, key_id: KeyId, signing_key: SigningKey) {
        self.keys.write().insert(key_id, signing_key);
    }
}

#[async_trait]
impl SigningPort for Ed25519Signer {
    async fn sign(&self, key_id: KeyId, bytes: &[u8]) -> Result<Vec<u8>, SigningError> {
        let keys = self.keys.read();
        let key = keys.get(&key_id).ok_or(SigningError::UnknownKey(key_id))?;
        Ok(key.sign(bytes).to_bytes().to_vec())
    }

    async fn verify(&self, key_id: KeyId, bytes: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        let keys = self.keys.read();
        let key = keys.get(&key_id).ok_or(SigningError::UnknownKey(key_id))?;
        let verifying_key: VerifyingKey = key.verifying_key();
        let sig = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|_| SigningError::MalformedSignature)?;
        Ok(verifying_key.verify(bytes, &sig).is_ok())
    }

    async fn generate_keypair(&self) -> Result<(KeyId, Vec<u8>), SigningError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_bytes = signing_key.verifying_key().to_bytes().to_vec();
        let key_id = KeyId::new();
        self.keys.write().insert(key_id, signing_key);
        Ok((key_id, public_bytes))
    }

    fn get_mode(&self) -> Mode {
        self.mode
    }
}

/// Verifies a detached public key + signature pair without needing a
/// registered signer — used by the hash-chain verifier and observer API,
/// which only ever read.
pub fn verify_detached(public_key_bytes: &[u8], bytes: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
    let verifying_key = VerifyingKey::try_from(public_key_bytes).map_err(|_| SigningError::MalformedSignature)?;
    let sig = ed25519_dalek::Signature::from_slice(signature).map_err(|_| SigningError::MalformedSignature)?;
    Ok(verifying_key.verify(bytes, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_and_verify_round_trips() {
        let signer = Ed25519Signer::new(Mode::Development);
        let (key_id, public_key) = signer.generate_keypair().await.unwrap();
        let sig = signer.sign(key_id, b"hello").await.unwrap();
        assert!(signer.verify(key_id, b"hello", &sig).await.unwrap());
        assert!(verify_detached(&public_key, b"hello", &sig).unwrap());
        assert!(!verify_detached(&public_key, b"goodbye", &sig).unwrap());
    }

    #[tokio::test]
    async fn unknown_key_errors() {
        let signer = Ed25519Signer::new(Mode::Production);
        let result = signer.sign(KeyId::new(), b"x").await;
        assert!(matches!(result, Err(SigningError::UnknownKey(_))));
    }
}
