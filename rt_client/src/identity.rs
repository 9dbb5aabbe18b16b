//! Local long-term identity: a keypair persisted to disk, created on first
//! run. Grounded on `rogue_talk.bot.client.BotIdentity` (`load_or_create`,
//! a JSON file of hex-encoded keys under a per-identity directory),
//! generalized here to a single `keyfile` path shared by `rt_client` and
//! `rt_bot` rather than one directory per bot name.

use crate::error::IdentityError;
use rt_core::crypto;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredIdentity {
    public_key: String,
    secret_key: String,
}

/// A long-term Ed25519 identity kept on disk across reconnects.
#[derive(Debug, Clone)]
pub struct Identity {
    pub public_key: [u8; 32],
    pub secret_key: [u8; 64],
}

impl Identity {
    /// Loads the identity at `path`, generating and persisting a fresh one
    /// if the file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, IdentityError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let stored: StoredIdentity = serde_json::from_str(&text)?;
                let public_key: [u8; 32] = hex::decode(&stored.public_key)
                    .ok()
                    .and_then(|b| b.try_into().ok())
                    .ok_or(IdentityError::BadKeyLength("32"))?;
                let secret_key: [u8; 64] = hex::decode(&stored.secret_key)
                    .ok()
                    .and_then(|b| b.try_into().ok())
                    .ok_or(IdentityError::BadKeyLength("64"))?;
                Ok(Identity { public_key, secret_key })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (public_key, secret_key) = crypto::generate_keypair();
                let identity = Identity { public_key, secret_key };
                identity.persist(path)?;
                Ok(identity)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, path: &Path) -> Result<(), IdentityError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredIdentity {
            public_key: hex::encode(self.public_key),
            secret_key: hex::encode(self.secret_key),
        };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    /// Signs `nonce ∥ name` for the `AUTH_RESPONSE` (`spec.md` §4.2).
    pub fn sign_challenge(&self, nonce: &[u8; 32], name: &str) -> [u8; 64] {
        let mut message = Vec::with_capacity(32 + name.len());
        message.extend_from_slice(nonce);
        message.extend_from_slice(name.as_bytes());
        crypto::sign(&message, &self.secret_key)
    }
}
