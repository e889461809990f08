//! Progress store - where completion records live
//!
//! - [`LocalStore`]: SQLite only, used when no remote backend is configured
//! - [`RemoteStore`]: the account-scoped table on the hosted backend
//! - [`CachedStore`]: local cache in front of a remote store, two-phase append

mod cached;
mod remote;

pub use cached::{CachedStore, SyncReport};
pub use remote::RemoteStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::db::{CompletionRecord, Database, LOCAL_OWNER};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

/// How far an appended record got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Durably accepted
    Synced,
    /// Kept locally, not yet accepted remotely
    Pending { reason: String },
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Every record visible to this account, oldest first
    async fn load(&self) -> Result<Vec<CompletionRecord>, StoreError>;

    /// Add one record. Records are never edited or deleted through this trait.
    async fn append(&self, record: &CompletionRecord) -> Result<AppendOutcome, StoreError>;

    /// Account the records belong to, if the store is account-scoped
    fn account_id(&self) -> Option<String> {
        None
    }
}

/// SQLite-backed store for local-only mode
pub struct LocalStore {
    db: Mutex<Database>,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub async fn database(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }
}

#[async_trait]
impl ProgressStore for LocalStore {
    async fn load(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        let db = self.db.lock().await;
        Ok(db.get_completions(LOCAL_OWNER)?.into_iter().map(|c| c.record).collect())
    }

    async fn append(&self, record: &CompletionRecord) -> Result<AppendOutcome, StoreError> {
        let db = self.db.lock().await;
        db.add_completion(LOCAL_OWNER, record, true)?;
        Ok(AppendOutcome::Synced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_local_store_append_is_synced() {
        let store = LocalStore::new(Database::open_in_memory().unwrap());
        let record = CompletionRecord::new(1, 900, Utc::now());

        let outcome = store.append(&record).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Synced);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![record]);
        assert!(store.database().await.get_pending(LOCAL_OWNER).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_store_empty() {
        let store = LocalStore::new(Database::open_in_memory().unwrap());
        assert!(store.load().await.unwrap().is_empty());
    }
}
