use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::obfuscate::{decode_secret, encode_secret, mask_secret};
use super::vault::{CredentialVault, UserCredential, VaultError};

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("API key cannot be empty")]
    EmptySecret,

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Obfuscation(#[from] super::obfuscate::ObfuscationError),
}

/// Whether a save created a fresh record or replaced an existing one; the
/// HTTP surface phrases its success message off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Masked view of a stored credential. Never carries the plaintext.
#[derive(Debug, Clone)]
pub struct MaskedCredential {
    pub masked_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credential operations over a vault plus the server-held obfuscation
/// passphrase. Callers must pass the authenticated caller's own user id;
/// the HTTP layer derives it from the verified token and nothing else, so
/// cross-user access never reaches this type.
pub struct KeyStore {
    vault: Arc<dyn CredentialVault>,
    passphrase: String,
}

impl KeyStore {
    pub fn new(vault: Arc<dyn CredentialVault>, passphrase: String) -> Self {
        debug_assert!(!passphrase.is_empty());
        Self { vault, passphrase }
    }

    /// Encode and upsert the caller's secret. An existing record keeps its
    /// `created_at`; `updated_at` advances on every write.
    pub async fn save(&self, user_id: &str, raw_secret: &str) -> Result<SaveOutcome, KeyStoreError> {
        if raw_secret.trim().is_empty() {
            return Err(KeyStoreError::EmptySecret);
        }
        let encoded = encode_secret(raw_secret, &self.passphrase);
        let now = Utc::now();
        let existing = self.vault.find(user_id).await?;
        let outcome = match existing {
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Created,
        };
        let record = UserCredential {
            user_id: user_id.to_string(),
            encoded_secret: encoded,
            created_at: existing.map(|record| record.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.vault.upsert(record).await?;
        Ok(outcome)
    }

    /// Masked rendering for display, or `None` when the caller has no
    /// stored credential (a normal condition, not an error).
    pub async fn masked(&self, user_id: &str) -> Result<Option<MaskedCredential>, KeyStoreError> {
        let Some(record) = self.vault.find(user_id).await? else {
            return Ok(None);
        };
        let decoded = decode_secret(&record.encoded_secret, &self.passphrase)?;
        Ok(Some(MaskedCredential {
            masked_key: mask_secret(&decoded),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }))
    }

    /// Fully decoded secret for the outbound generation call. Server-side
    /// use only; never serialized into a client response.
    pub async fn raw(&self, user_id: &str) -> Result<Option<String>, KeyStoreError> {
        let Some(record) = self.vault.find(user_id).await? else {
            return Ok(None);
        };
        Ok(Some(decode_secret(&record.encoded_secret, &self.passphrase)?))
    }

    /// Remove the caller's credential; reports whether one existed.
    pub async fn delete(&self, user_id: &str) -> Result<bool, KeyStoreError> {
        Ok(self.vault.remove(user_id).await?)
    }
}
