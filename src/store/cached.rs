//! Local cache in front of a remote store
//!
//! Append is a two-phase commit:
//! 1. the record goes into the local cache as pending, visible to reads at once;
//! 2. it is sent to the remote store and marked synced on success.
//!
//! A failed remote write never rolls the cache back. The record stays pending,
//! the caller gets `AppendOutcome::Pending`, and `sync_pending()` sends it later.
//!
//! The cache file may hold rows of several accounts. A `CachedStore` reads and
//! sends only the rows of the account it was opened for, and sends nothing
//! while the remote is signed in as someone else.

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::{AppendOutcome, ProgressStore, StoreError};
use crate::db::{CompletionRecord, Database};

/// Result of a pending-record sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
}

pub struct CachedStore<R> {
    cache: Mutex<Database>,
    remote: R,
    owner: String,
}

impl<R: ProgressStore> CachedStore<R> {
    /// `owner` is the account id whose rows this store reads and writes
    pub fn new(cache: Database, remote: R, owner: impl Into<String>) -> Self {
        Self {
            cache: Mutex::new(cache),
            remote,
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn database(&self) -> MutexGuard<'_, Database> {
        self.cache.lock().await
    }

    pub async fn pending_count(&self) -> Result<usize, StoreError> {
        Ok(self.cache.lock().await.get_pending(&self.owner)?.len())
    }

    /// `Some(reason)` when the remote is signed in as another account
    fn foreign_remote(&self) -> Option<String> {
        match self.remote.account_id() {
            Some(id) if id != self.owner => Some(format!("signed in as {}, records belong to {}", id, self.owner)),
            _ => None,
        }
    }

    /// Re-send every pending record of this account
    pub async fn sync_pending(&self) -> Result<SyncReport, StoreError> {
        let pending = self.cache.lock().await.get_pending(&self.owner)?;
        let mut report = SyncReport::default();

        if let Some(reason) = self.foreign_remote() {
            warn!("Not syncing {} records: {}", pending.len(), reason);
            report.failed = pending.len();
            return Ok(report);
        }

        for stored in pending {
            match self.remote.append(&stored.record).await {
                Ok(AppendOutcome::Synced) => {
                    self.cache.lock().await.mark_synced(stored.id)?;
                    report.synced += 1;
                }
                Ok(AppendOutcome::Pending { reason }) => {
                    warn!("Day {} still pending: {}", stored.record.day_number, reason);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Day {} still pending: {}", stored.record.day_number, e);
                    report.failed += 1;
                }
            }
        }

        if report.synced > 0 || report.failed > 0 {
            info!("Pending sync: {} synced, {} failed", report.synced, report.failed);
        }
        Ok(report)
    }
}

#[async_trait]
impl<R: ProgressStore> ProgressStore for CachedStore<R> {
    /// Merge the remote log into the cache and return the union. If the
    /// remote is unreachable the cached log is returned on its own.
    async fn load(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        let remote = match self.foreign_remote() {
            Some(reason) => Err(StoreError::Remote { status: 403, body: reason }),
            None => self.remote.load().await,
        };
        match remote {
            Ok(remote) => {
                let db = self.cache.lock().await;
                for record in &remote {
                    if db.add_completion(&self.owner, record, true)?.is_none()
                        && let Some(existing) = db.find_completion(&self.owner, record)?
                        && !existing.synced
                    {
                        // Accepted remotely even though we never saw the reply
                        db.mark_synced(existing.id)?;
                    }
                }
            }
            Err(e) => warn!("Remote load failed, using local cache: {}", e),
        }

        let db = self.cache.lock().await;
        Ok(db.get_completions(&self.owner)?.into_iter().map(|c| c.record).collect())
    }

    async fn append(&self, record: &CompletionRecord) -> Result<AppendOutcome, StoreError> {
        let id = {
            let db = self.cache.lock().await;
            match db.add_completion(&self.owner, record, false)? {
                Some(id) => id,
                None => match db.find_completion(&self.owner, record)? {
                    Some(existing) if existing.synced => return Ok(AppendOutcome::Synced),
                    Some(existing) => existing.id,
                    None => return Ok(AppendOutcome::Synced),
                },
            }
        };

        if let Some(reason) = self.foreign_remote() {
            warn!("Day {} saved locally only: {}", record.day_number, reason);
            return Ok(AppendOutcome::Pending { reason });
        }

        match self.remote.append(record).await {
            Ok(AppendOutcome::Synced) => {
                self.cache.lock().await.mark_synced(id)?;
                info!("Day {} synced", record.day_number);
                Ok(AppendOutcome::Synced)
            }
            Ok(pending @ AppendOutcome::Pending { .. }) => Ok(pending),
            Err(e) => {
                warn!("Day {} saved locally, remote write failed: {}", record.day_number, e);
                Ok(AppendOutcome::Pending { reason: e.to_string() })
            }
        }
    }

    fn account_id(&self) -> Option<String> {
        Some(self.owner.clone())
    }
}
