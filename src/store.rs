//! SQLite-backed durable store for published postings and the seen-set.
//!
//! Every write is a single autocommitted statement, so once a call returns
//! `Ok` the row survives a crash of the process.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{Connection, params};

use crate::error::ScoutError;
use crate::model::JobPosting;

pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScoutError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    fn bootstrap(&self) -> Result<(), ScoutError> {
        // In-memory databases answer "memory" here.
        let _mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS extracted_jobs (
                job_id        TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                company       TEXT NOT NULL,
                location      TEXT NOT NULL,
                postal_code   TEXT NOT NULL,
                url           TEXT NOT NULL,
                candidate_id  TEXT NOT NULL,
                is_easy_apply INTEGER NOT NULL,
                extracted_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS seen_jobs (
                job_id  TEXT PRIMARY KEY,
                seen_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            ",
        )?;
        Ok(())
    }

    /// Insert or replace the posting keyed by `job_id`.
    pub fn upsert_posting(&self, posting: &JobPosting) -> Result<(), ScoutError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO extracted_jobs
                (job_id, title, company, location, postal_code, url, candidate_id,
                 is_easy_apply, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                posting.job_id,
                posting.title,
                posting.company,
                posting.location_text,
                posting.postal_code,
                posting.url,
                posting.candidate_id,
                posting.is_easy_apply,
                posting.extracted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Record `job_id` as seen. Returns `true` when the row is new.
    pub fn insert_seen(&self, job_id: &str) -> Result<bool, ScoutError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO seen_jobs (job_id) VALUES (?1)",
            params![job_id],
        )?;
        Ok(changed > 0)
    }

    /// Every job id known to the store, published or merely seen.
    pub fn load_seen_ids(&self) -> Result<HashSet<String>, ScoutError> {
        let mut stmt = self.conn.prepare(
            "SELECT job_id FROM seen_jobs UNION SELECT job_id FROM extracted_jobs",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let ids = rows.collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    pub fn count_postings(&self) -> Result<u64, ScoutError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM extracted_jobs", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    #[cfg(test)]
    pub fn count_postings_for(&self, candidate_id: &str) -> Result<u64, ScoutError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM extracted_jobs WHERE candidate_id = ?1",
            params![candidate_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn count_seen(&self) -> Result<u64, ScoutError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_jobs", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
