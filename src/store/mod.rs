//! SQLite-backed follower store.
//!
//! Every write commits immediately, so later stages of the same run read what
//! earlier stages wrote.

pub mod types;

use crate::engine::filter::FollowerQuery;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use types::{
    format_attempt_ts, format_created_at, parse_stored_ts, Follower, FollowerId, FollowerPoint,
    MessageAttempt, SkipEntry, StoreCounts,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS follower (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        followers_count INTEGER NOT NULL,
        friends_count INTEGER NOT NULL,
        verified INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS message_attempt (
        follower_id INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_attempt_follower ON message_attempt(follower_id, timestamp);
    CREATE TABLE IF NOT EXISTS skip_entry (
        follower_id INTEGER PRIMARY KEY,
        timestamp TEXT NOT NULL
    );
";

const FOLLOWER_COLUMNS: &str =
    "id, name, created_at, description, followers_count, friends_count, verified";

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::init(conn)
    }

    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to create schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("store lock poisoned: {}", e))
    }

    pub fn get_follower(&self, id: FollowerId) -> Result<Option<Follower>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM follower WHERE id = ?1", FOLLOWER_COLUMNS),
            params![id],
            follower_from_row,
        )
        .optional()
        .context("follower lookup failed")
    }

    /// Inserts a follower unless its id is already stored. Existing rows are
    /// never updated. Returns whether a row was written.
    pub fn insert_follower(&self, follower: &Follower) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO follower
                    (id, name, created_at, description, followers_count, friends_count, verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    follower.id,
                    follower.name,
                    format_created_at(&follower.created_at),
                    follower.description,
                    follower.followers_count,
                    follower.friends_count,
                    follower.verified,
                ],
            )
            .context("follower insert failed")?;
        Ok(changed == 1)
    }

    /// Attempts for one follower, oldest first.
    pub fn list_attempts(&self, id: FollowerId) -> Result<Vec<MessageAttempt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT follower_id, timestamp FROM message_attempt
             WHERE follower_id = ?1 ORDER BY timestamp",
        )?;
        let rows = stmt.query_map(params![id], attempt_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("attempt lookup failed")
    }

    /// Appends an attempt. Timestamps per follower must not go backwards.
    pub fn append_attempt(&self, id: FollowerId, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(timestamp) FROM message_attempt WHERE follower_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        let stamp = format_attempt_ts(&timestamp);
        if let Some(latest) = latest {
            if stamp < latest {
                anyhow::bail!(
                    "attempt for {} at {} precedes latest attempt {}",
                    id, stamp, latest
                );
            }
        }
        conn.execute(
            "INSERT INTO message_attempt (follower_id, timestamp) VALUES (?1, ?2)",
            params![id, stamp],
        )
        .context("attempt insert failed")?;
        Ok(())
    }

    pub fn get_skip(&self, id: FollowerId) -> Result<Option<SkipEntry>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT follower_id, timestamp FROM skip_entry WHERE follower_id = ?1",
            params![id],
            skip_from_row,
        )
        .optional()
        .context("skip lookup failed")
    }

    /// Idempotent: a repeat insert for the same id writes nothing and returns false.
    pub fn insert_skip(&self, id: FollowerId, timestamp: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO skip_entry (follower_id, timestamp) VALUES (?1, ?2)",
                params![id, format_attempt_ts(&timestamp)],
            )
            .context("skip insert failed")?;
        Ok(changed == 1)
    }

    /// Followers matching `query`, in the table's default order.
    pub fn query_followers(&self, query: &FollowerQuery) -> Result<Vec<Follower>> {
        let (clause, values) = query.to_sql();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM follower{}",
            FOLLOWER_COLUMNS, clause
        ))?;
        let rows = stmt.query_map(params_from_iter(values), follower_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("follower query failed")
    }

    pub fn all_attempts(&self) -> Result<Vec<MessageAttempt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT follower_id, timestamp FROM message_attempt ORDER BY timestamp",
        )?;
        let rows = stmt.query_map([], attempt_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("attempt listing failed")
    }

    pub fn all_skips(&self) -> Result<Vec<SkipEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT follower_id, timestamp FROM skip_entry ORDER BY timestamp",
        )?;
        let rows = stmt.query_map([], skip_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("skip listing failed")
    }

    /// Follower and friend counts of every stored follower with its attempt count.
    pub fn follower_points(&self) -> Result<Vec<FollowerPoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT f.followers_count, f.friends_count, f.verified, COUNT(a.follower_id)
             FROM follower f LEFT JOIN message_attempt a ON a.follower_id = f.id
             GROUP BY f.id ORDER BY f.id",
        )?;
        let rows = stmt.query_map([], |row| {
            let attempts: i64 = row.get(3)?;
            Ok(FollowerPoint {
                followers_count: row.get(0)?,
                friends_count: row.get(1)?,
                verified: row.get(2)?,
                attempts: attempts.max(0) as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("follower points query failed")
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        };
        Ok(StoreCounts {
            followers: count("SELECT COUNT(*) FROM follower")?,
            skipped: count("SELECT COUNT(*) FROM skip_entry")?,
            messaged: count("SELECT COUNT(DISTINCT follower_id) FROM message_attempt")?,
            retried: count(
                "SELECT COUNT(*) FROM (SELECT follower_id FROM message_attempt
                 GROUP BY follower_id HAVING COUNT(*) >= 2)",
            )?,
        })
    }
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_stored_ts(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("bad timestamp {:?}", raw).into(),
        )
    })
}

fn follower_from_row(row: &Row<'_>) -> rusqlite::Result<Follower> {
    Ok(Follower {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: timestamp_column(row, 2)?,
        description: row.get(3)?,
        followers_count: row.get(4)?,
        friends_count: row.get(5)?,
        verified: row.get(6)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<MessageAttempt> {
    Ok(MessageAttempt {
        follower_id: row.get(0)?,
        timestamp: timestamp_column(row, 1)?,
    })
}

fn skip_from_row(row: &Row<'_>) -> rusqlite::Result<SkipEntry> {
    Ok(SkipEntry {
        follower_id: row.get(0)?,
        timestamp: timestamp_column(row, 1)?,
    })
}
