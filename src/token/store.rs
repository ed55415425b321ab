use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Error;

/// Get/set access to the session's credentials. Token values are opaque.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: String) -> Result<(), Error>;
    fn set_refresh_token(&self, token: String) -> Result<(), Error>;
    fn clear(&self) -> Result<(), Error>;
}

/// Snapshot of stored credentials, also the on-disk format of [`FileCredentialStore`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub updated_at: Option<Timestamp>,
}

/// Credentials held for the lifetime of the client.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<StoredCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            inner: RwLock::new(StoredCredentials {
                access_token,
                refresh_token,
                updated_at: None,
            }),
        }
    }

    pub fn snapshot(&self) -> StoredCredentials {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut StoredCredentials)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        guard.updated_at = Some(Timestamp::now());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.snapshot().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.snapshot().refresh_token
    }

    fn set_access_token(&self, token: String) -> Result<(), Error> {
        self.update(|creds| creds.access_token = Some(token));
        Ok(())
    }

    fn set_refresh_token(&self, token: String) -> Result<(), Error> {
        self.update(|creds| creds.refresh_token = Some(token));
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.update(|creds| {
            creds.access_token = None;
            creds.refresh_token = None;
        });
        Ok(())
    }
}

/// Memory store that writes every change through to a JSON file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    memory: MemoryCredentialStore,
}

impl FileCredentialStore {
    /// Opens the store, loading existing credentials when the file is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let stored = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str::<StoredCredentials>(&contents)?
        } else {
            StoredCredentials::default()
        };
        debug!(path = %path.display(), loaded = stored.refresh_token.is_some(), "credential file opened");
        Ok(Self {
            path,
            memory: MemoryCredentialStore {
                inner: RwLock::new(stored),
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(&self.memory.snapshot())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.memory.access_token()
    }

    fn refresh_token(&self) -> Option<String> {
        self.memory.refresh_token()
    }

    fn set_access_token(&self, token: String) -> Result<(), Error> {
        self.memory.set_access_token(token)?;
        self.flush()
    }

    fn set_refresh_token(&self, token: String) -> Result<(), Error> {
        self.memory.set_refresh_token(token)?;
        self.flush()
    }

    fn clear(&self) -> Result<(), Error> {
        self.memory.clear()?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("session-refresh-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn memory_store_starts_empty_and_records_updates() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);

        store.set_access_token("A1".into()).unwrap();
        store.set_refresh_token("R1".into()).unwrap();
        assert_eq!(store.access_token().as_deref(), Some("A1"));
        assert_eq!(store.refresh_token().as_deref(), Some("R1"));
        assert!(store.snapshot().updated_at.is_some());
    }

    #[test]
    fn memory_store_clear_drops_both_tokens() {
        let store = MemoryCredentialStore::seeded(Some("A1".into()), Some("R1".into()));
        store.clear().unwrap();
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(store.snapshot().updated_at.is_some());
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path();
        {
            let store = FileCredentialStore::open(&path).unwrap();
            assert_eq!(store.refresh_token(), None);
            store.set_access_token("A1".into()).unwrap();
            store.set_refresh_token("R1".into()).unwrap();
        }
        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.access_token().as_deref(), Some("A1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("R1"));

        reopened.clear().unwrap();
        let cleared = FileCredentialStore::open(&path).unwrap();
        assert_eq!(cleared.refresh_token(), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileCredentialStore::open(&path), Err(Error::Json(_))));
        std::fs::remove_file(&path).ok();
    }
}
