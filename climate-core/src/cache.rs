//! Persistent on-disk cache for archive responses.

use std::{
    fmt,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use fjall::Keyspace;
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::{EnrichError, Result};

/// How long a cached response stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Entries are served forever once stored.
    #[default]
    Never,
    /// Entries expire this many seconds after being stored.
    AfterSeconds(u64),
}

impl ExpiryPolicy {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            ExpiryPolicy::Never => None,
            ExpiryPolicy::AfterSeconds(secs) => Some(Duration::from_secs(*secs)),
        }
    }

    fn expires_at(&self, now: u64) -> Option<u64> {
        self.ttl().map(|ttl| now.saturating_add(ttl.as_secs()))
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    body: Vec<u8>,
    /// Unix timestamp (seconds); `None` never expires.
    expires_at: Option<u64>,
}

/// Key/value store of raw response bodies keyed by request URL.
#[derive(Clone)]
pub struct ResponseCache {
    store: Keyspace,
    expiry: ExpiryPolicy,
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(EnrichError::cache)?
        .as_secs())
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store
        .get(key)
        .map_err(EnrichError::cache)?
        .map(|v| v.to_vec()))
}

impl ResponseCache {
    /// Open (or create) the cache under `path`.
    pub fn open(path: impl AsRef<Path>, expiry: ExpiryPolicy) -> Result<Self> {
        let db = fjall::Database::builder(path.as_ref())
            .open()
            .map_err(EnrichError::cache)?;
        let store = db
            .keyspace("responses", fjall::KeyspaceCreateOptions::default)
            .map_err(EnrichError::cache)?;
        tracing::debug!(path = %path.as_ref().display(), ?expiry, "opened response cache");
        Ok(Self { store, expiry })
    }

    pub fn expiry(&self) -> ExpiryPolicy {
        self.expiry
    }

    /// Store a response body under `key`.
    pub async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let entry = StoredEntry {
            body,
            expires_at: self.expiry.expires_at(now_secs()?),
        };
        let bytes = postcard::to_stdvec(&entry).map_err(EnrichError::cache)?;
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();

        task::spawn_blocking(move || store.insert(key, bytes))
            .await
            .map_err(EnrichError::cache)?
            .map_err(EnrichError::cache)?;
        Ok(())
    }

    /// Fetch a body if present and fresh. Expired entries are removed.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || get_from_store(store, key_bytes))
            .await
            .map_err(EnrichError::cache)??;

        let Some(bytes) = maybe_bytes else {
            tracing::debug!(key, "cache miss");
            return Ok(None);
        };

        let entry: StoredEntry = postcard::from_bytes(&bytes).map_err(EnrichError::cache)?;
        match entry.expires_at {
            Some(expires_at) if now_secs()? >= expires_at => {
                tracing::debug!(key, "cache entry expired");
                self.remove(key).await?;
                Ok(None)
            }
            _ => {
                tracing::debug!(key, "cache hit");
                Ok(Some(entry.body))
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || store.remove(key))
            .await
            .map_err(EnrichError::cache)?
            .map_err(EnrichError::cache)?;
        Ok(())
    }
}
