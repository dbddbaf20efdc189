use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

/// One stored credential per user. Only the obfuscated form of the secret is
/// ever persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub user_id: String,
    pub encoded_secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt credential record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persistence seam for credential records. Implementations must keep at
/// most one record per `user_id`; `upsert` replaces any existing record.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    async fn find(&self, user_id: &str) -> Result<Option<UserCredential>, VaultError>;
    async fn upsert(&self, record: UserCredential) -> Result<(), VaultError>;
    async fn remove(&self, user_id: &str) -> Result<bool, VaultError>;
}

fn hashed_file_name(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// File-backed vault: one JSON document per user under
/// `<base_dir>/credentials/`. User ids come from the identity provider and
/// are not filesystem-safe, so files are named by their SHA-256.
#[derive(Debug, Clone)]
pub struct LocalFileVault {
    base_dir: PathBuf,
}

impl LocalFileVault {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn record_path(&self, user_id: &str) -> PathBuf {
        self.base_dir
            .join("credentials")
            .join(format!("{}.json", hashed_file_name(user_id)))
    }
}

#[async_trait]
impl CredentialVault for LocalFileVault {
    async fn find(&self, user_id: &str) -> Result<Option<UserCredential>, VaultError> {
        let path = self.record_path(user_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn upsert(&self, record: UserCredential) -> Result<(), VaultError> {
        let path = self.record_path(&record.user_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(&record)?;
        fs::write(path, bytes).await?;
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<bool, VaultError> {
        let path = self.record_path(user_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory vault used by tests.
#[derive(Debug, Default)]
pub struct MemoryVault {
    records: Mutex<HashMap<String, UserCredential>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn find(&self, user_id: &str) -> Result<Option<UserCredential>, VaultError> {
        Ok(self.records.lock().unwrap().get(user_id).cloned())
    }

    async fn upsert(&self, record: UserCredential) -> Result<(), VaultError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<bool, VaultError> {
        Ok(self.records.lock().unwrap().remove(user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, encoded: &str) -> UserCredential {
        let now = Utc::now();
        UserCredential {
            user_id: user_id.to_string(),
            encoded_secret: encoded.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("prompt-gallery-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn file_vault_round_trips_a_record() {
        let dir = scratch_dir("roundtrip");
        let vault = LocalFileVault::new(dir.clone());

        assert!(vault.find("user_a").await.unwrap().is_none());
        vault.upsert(record("user_a", "Zm9v")).await.unwrap();
        let found = vault.find("user_a").await.unwrap().unwrap();
        assert_eq!(found.user_id, "user_a");
        assert_eq!(found.encoded_secret, "Zm9v");

        assert!(vault.remove("user_a").await.unwrap());
        assert!(!vault.remove("user_a").await.unwrap());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn file_vault_upsert_replaces_in_place() {
        let dir = scratch_dir("upsert");
        let vault = LocalFileVault::new(dir.clone());

        vault.upsert(record("user_b", "first")).await.unwrap();
        vault.upsert(record("user_b", "second")).await.unwrap();
        let found = vault.find("user_b").await.unwrap().unwrap();
        assert_eq!(found.encoded_secret, "second");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn file_vault_handles_hostile_user_ids() {
        let dir = scratch_dir("hostile");
        let vault = LocalFileVault::new(dir.clone());

        let user_id = "user|with/odd:chars ../..";
        vault.upsert(record(user_id, "enc")).await.unwrap();
        assert!(vault.find(user_id).await.unwrap().is_some());
        assert!(vault.find("user|other").await.unwrap().is_none());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn memory_vault_keeps_one_record_per_user() {
        let vault = MemoryVault::new();
        vault.upsert(record("u", "one")).await.unwrap();
        vault.upsert(record("u", "two")).await.unwrap();
        assert_eq!(
            vault.find("u").await.unwrap().unwrap().encoded_secret,
            "two"
        );
        assert!(vault.remove("u").await.unwrap());
        assert!(vault.find("u").await.unwrap().is_none());
    }
}
