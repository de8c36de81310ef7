// Signing key provider — resolves an actor account to its FID and key.
//
// Key material arrives already decrypted from the account store. It is
// handed to the message builder and dropped; it is never logged and never
// written anywhere by this crate.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::db::Database;

/// The actor's identity and signing material for one list run.
#[derive(Clone)]
pub struct SignerKey {
    /// Internal account id the list refers to.
    pub account_id: String,
    /// The actor's FID, as a decimal string.
    pub fid: String,
    /// Hex-encoded Ed25519 private key.
    pub private_key: String,
}

impl std::fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerKey")
            .field("account_id", &self.account_id)
            .field("fid", &self.fid)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("account {0} not found or has no signer key")]
    NotFound(String),
    #[error("account store lookup failed: {0:#}")]
    Store(anyhow::Error),
}

/// Resolves an account identifier to a ready-to-use signer.
#[async_trait]
pub trait SigningKeyProvider: Send + Sync {
    async fn resolve_key(&self, account_id: &str) -> Result<SignerKey, KeyError>;
}

/// Reads signer accounts from the `accounts` table.
pub struct DatabaseKeyProvider {
    db: Arc<dyn Database>,
}

impl DatabaseKeyProvider {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SigningKeyProvider for DatabaseKeyProvider {
    async fn resolve_key(&self, account_id: &str) -> Result<SignerKey, KeyError> {
        let account = self
            .db
            .get_signer_account(account_id)
            .await
            .map_err(KeyError::Store)?
            .ok_or_else(|| KeyError::NotFound(account_id.to_string()))?;

        if account.private_key.trim().is_empty() {
            return Err(KeyError::NotFound(account_id.to_string()));
        }

        Ok(SignerKey {
            account_id: account.id,
            fid: account.platform_account_id,
            private_key: account.private_key,
        })
    }
}
