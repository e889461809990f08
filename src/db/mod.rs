//! Database module - SQLite log of completed sessions
//!
//! Serves as the whole progress store in local-only mode and as the local
//! cache in front of the remote store otherwise.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};

/// One finished (or rest-confirmed) session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub day_number: u8,
    pub duration_secs: u64,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    /// Timestamps are kept at whole seconds so local and remote copies of a
    /// record compare equal.
    pub fn new(day_number: u8, duration_secs: u64, completed_at: DateTime<Utc>) -> Self {
        Self {
            day_number,
            duration_secs,
            completed_at: completed_at.trunc_subsecs(0),
        }
    }
}

/// Row as stored locally, with its sync flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCompletion {
    pub id: i64,
    pub record: CompletionRecord,
    pub synced: bool,
}

/// Owner of rows written in local-only mode
pub const LOCAL_OWNER: &str = "";

/// Database wrapper. Every row belongs to one account; queries only ever
/// see the rows of the owner they are given.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS completions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL DEFAULT '',
                day_number INTEGER NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed_at TEXT NOT NULL,
                UNIQUE (user_id, day_number, completed_at)
            )",
            [],
        )?;

        // Migration: add synced column if missing
        let has_synced: bool = self.conn
            .prepare("SELECT synced FROM completions LIMIT 1")
            .is_ok();
        if !has_synced {
            self.conn.execute(
                "ALTER TABLE completions ADD COLUMN synced INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }

        Ok(())
    }

    /// Insert a completion for `owner`. Returns the row id, or `None` if the
    /// same `(day_number, completed_at)` is already stored for that owner.
    pub fn add_completion(&self, owner: &str, record: &CompletionRecord, synced: bool) -> Result<Option<i64>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO completions (user_id, day_number, duration_secs, completed_at, synced)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                owner,
                record.day_number as i64,
                record.duration_secs as i64,
                record.completed_at.to_rfc3339(),
                synced,
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    /// All completions of `owner`, oldest first
    pub fn get_completions(&self, owner: &str) -> Result<Vec<StoredCompletion>> {
        self.query_completions(
            "SELECT id, day_number, duration_secs, completed_at, synced
             FROM completions WHERE user_id = ?1 ORDER BY completed_at ASC, id ASC",
            owner,
        )
    }

    /// Completions of `owner` not yet accepted by the remote store
    pub fn get_pending(&self, owner: &str) -> Result<Vec<StoredCompletion>> {
        self.query_completions(
            "SELECT id, day_number, duration_secs, completed_at, synced
             FROM completions WHERE user_id = ?1 AND synced = 0 ORDER BY completed_at ASC, id ASC",
            owner,
        )
    }

    /// Unsynced rows across every account
    pub fn count_all_pending(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM completions WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn mark_synced(&self, id: i64) -> Result<bool> {
        let updated = self.conn.execute("UPDATE completions SET synced = 1 WHERE id = ?1", params![id])?;
        Ok(updated > 0)
    }

    pub fn find_completion(&self, owner: &str, record: &CompletionRecord) -> Result<Option<StoredCompletion>> {
        self.conn
            .query_row(
                "SELECT id, day_number, duration_secs, completed_at, synced
                 FROM completions WHERE user_id = ?1 AND day_number = ?2 AND completed_at = ?3",
                params![owner, record.day_number as i64, record.completed_at.to_rfc3339()],
                row_to_completion,
            )
            .optional()
    }

    /// Drop every row the remote store already has. Pending rows exist
    /// nowhere else, so they stay.
    pub fn clear_synced(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM completions WHERE synced = 1", [])
    }

    fn query_completions(&self, sql: &str, owner: &str) -> Result<Vec<StoredCompletion>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![owner], row_to_completion)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_to_completion(row: &rusqlite::Row<'_>) -> Result<StoredCompletion> {
    let date_str: String = row.get(3)?;
    let completed_at = DateTime::parse_from_rfc3339(&date_str)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    let day_number: i64 = row.get(1)?;
    let duration_secs: i64 = row.get(2)?;

    Ok(StoredCompletion {
        id: row.get(0)?,
        record: CompletionRecord {
            day_number: day_number as u8,
            duration_secs: duration_secs.max(0) as u64,
            completed_at,
        },
        synced: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALICE: &str = "alice";

    fn record(day: u8, minutes_ago: i64) -> CompletionRecord {
        CompletionRecord::new(day, 600, Utc::now() - Duration::minutes(minutes_ago))
    }

    #[test]
    fn test_add_and_get() {
        let db = Database::open_in_memory().unwrap();
        let r = record(1, 0);
        let id = db.add_completion(ALICE, &r, false).unwrap();
        assert!(id.is_some());

        let all = db.get_completions(ALICE).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.day_number, 1);
        assert_eq!(all[0].record.duration_secs, 600);
        assert!(!all[0].synced);
    }

    #[test]
    fn test_duplicate_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let r = record(2, 5);
        assert!(db.add_completion(ALICE, &r, true).unwrap().is_some());
        assert!(db.add_completion(ALICE, &r, false).unwrap().is_none());
        assert_eq!(db.get_completions(ALICE).unwrap().len(), 1);
    }

    #[test]
    fn test_same_day_repeated() {
        let db = Database::open_in_memory().unwrap();
        db.add_completion(ALICE, &record(3, 60), true).unwrap();
        db.add_completion(ALICE, &record(3, 0), true).unwrap();
        assert_eq!(db.get_completions(ALICE).unwrap().len(), 2);
    }

    #[test]
    fn test_ordered_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        db.add_completion(ALICE, &record(2, 10), true).unwrap();
        db.add_completion(ALICE, &record(1, 100), true).unwrap();
        let days: Vec<u8> = db.get_completions(ALICE).unwrap().iter().map(|c| c.record.day_number).collect();
        assert_eq!(days, vec![1, 2]);
    }

    #[test]
    fn test_pending_and_mark_synced() {
        let db = Database::open_in_memory().unwrap();
        let id = db.add_completion(ALICE, &record(1, 0), false).unwrap().unwrap();
        db.add_completion(ALICE, &record(2, 0), true).unwrap();

        let pending = db.get_pending(ALICE).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        assert!(db.mark_synced(id).unwrap());
        assert!(db.get_pending(ALICE).unwrap().is_empty());
    }

    #[test]
    fn test_find_completion() {
        let db = Database::open_in_memory().unwrap();
        let r = record(5, 0);
        assert!(db.find_completion(ALICE, &r).unwrap().is_none());
        db.add_completion(ALICE, &r, false).unwrap();
        let found = db.find_completion(ALICE, &r).unwrap().unwrap();
        assert_eq!(found.record, r);
    }

    #[test]
    fn test_rows_are_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let r = record(5, 0);
        db.add_completion(ALICE, &r, false).unwrap();

        assert!(db.get_completions("bob").unwrap().is_empty());
        assert!(db.get_pending("bob").unwrap().is_empty());
        assert!(db.find_completion("bob", &r).unwrap().is_none());
        assert!(db.get_completions(LOCAL_OWNER).unwrap().is_empty());

        // The same record may exist once per owner
        assert!(db.add_completion("bob", &r, true).unwrap().is_some());
        assert_eq!(db.get_completions(ALICE).unwrap().len(), 1);
        assert_eq!(db.get_completions("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_new_truncates_subseconds() {
        let r = CompletionRecord::new(1, 0, Utc::now());
        assert_eq!(r.completed_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_clear_synced_keeps_pending() {
        let db = Database::open_in_memory().unwrap();
        db.add_completion(ALICE, &record(1, 0), true).unwrap();
        db.add_completion(ALICE, &record(2, 0), false).unwrap();
        db.add_completion("bob", &record(3, 0), false).unwrap();

        assert_eq!(db.clear_synced().unwrap(), 1);
        let left: Vec<u8> = db.get_completions(ALICE).unwrap().iter().map(|c| c.record.day_number).collect();
        assert_eq!(left, vec![2]);
        assert_eq!(db.count_all_pending().unwrap(), 2);
    }

    #[test]
    fn test_reopen_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.db");
        let path = path.to_str().unwrap();
        {
            let db = Database::open(path).unwrap();
            db.add_completion(ALICE, &record(9, 0), false).unwrap();
        }
        let db = Database::open(path).unwrap();
        assert_eq!(db.get_completions(ALICE).unwrap().len(), 1);
        assert_eq!(db.get_pending(ALICE).unwrap().len(), 1);
    }
}
