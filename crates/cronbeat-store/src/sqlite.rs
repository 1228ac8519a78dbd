use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cronbeat_core::{validate_interval, CronMeta, Job, JobPatch};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::gateway::{ClaimQuery, JobStore};

const JOB_COLUMNS: &str = "id, name, payload, enabled, start_at, stop_at, interval, \
     remove_expired, started_at, processed_at, processed_count, locked, last_error";

/// SQLite store backend.
///
/// All instances sharing one database file coordinate through the claim
/// transaction. Timestamps are RFC 3339 TEXT, so lexicographic SQL
/// comparisons order them correctly; the payload is JSON TEXT.
///
/// Uses its own `Connection` behind a mutex so several engines in one
/// process can share a store handle.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap a connection, initialising the schema if needed.
    ///
    /// A busy timeout is set so claim transactions from other processes
    /// wait for the write lock instead of failing immediately.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn claim_next(&self, query: &ClaimQuery) -> Result<Option<Job>> {
        let now_str = query.now.to_rfc3339();
        let mut conn = self.conn.lock().unwrap();
        // IMMEDIATE: take the write lock before reading, so a claimant in
        // another process cannot select the same row between our SELECT and
        // UPDATE.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Walk eligible rows in start_at order and take the first one the
        // extra predicate accepts. Selection and the lock update below sit
        // in the same transaction.
        let picked = {
            let mut stmt = tx.prepare_cached(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE enabled = 1 AND locked = 0
                   AND start_at <= ?1
                   AND (stop_at IS NULL OR stop_at >= ?1)
                 ORDER BY start_at, id"
            ))?;
            let mut rows = stmt.query([&now_str])?;
            let mut picked: Option<Job> = None;
            while let Some(row) = rows.next()? {
                let job = job_from_row(row)?;
                if query.extra.as_ref().is_none_or(|pred| pred(&job)) {
                    picked = Some(job);
                    break;
                }
            }
            picked
        };

        let Some(mut job) = picked else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE jobs SET locked = 1, started_at = ?1 WHERE id = ?2",
            params![now_str, job.id],
        )?;
        tx.commit()?;

        job.cron.locked = true;
        job.cron.started_at = Some(query.now);
        Ok(Some(job))
    }

    async fn update(&self, id: &str, patch: &JobPatch) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        // read-modify-write, same locking rationale as claim_next
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut job = {
            let mut stmt =
                tx.prepare_cached(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
            stmt.query_row([id], job_from_row).optional()?
        }
        .ok_or_else(|| StoreError::JobNotFound { id: id.to_string() })?;

        patch.apply(&mut job.cron);
        tx.execute(
            "UPDATE jobs SET enabled = ?1, start_at = ?2, started_at = ?3,
                    processed_at = ?4, processed_count = ?5, locked = ?6,
                    last_error = ?7
             WHERE id = ?8",
            params![
                job.cron.enabled,
                job.cron.start_at.to_rfc3339(),
                job.cron.started_at.map(|dt| dt.to_rfc3339()),
                job.cron.processed_at.map(|dt| dt.to_rfc3339()),
                job.cron.processed_count,
                job.cron.locked,
                job.cron.last_error,
                id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::JobNotFound { id: id.to_string() });
        }
        info!(job_id = %id, "job removed");
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))?;
        Ok(stmt.query_row([id], job_from_row).optional()?)
    }

    async fn insert(&self, mut job: Job) -> Result<Job> {
        if let Some(expr) = &job.cron.interval {
            validate_interval(expr)?;
        }
        if job.id.is_empty() {
            job.id = Uuid::new_v4().to_string();
        }
        job.cron.apply_insert_defaults();

        let payload = serde_json::to_string(&job.payload)
            .map_err(cronbeat_core::CoreError::Serialization)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs
             (id, name, payload, enabled, start_at, stop_at, interval,
              remove_expired, started_at, processed_at, processed_count,
              locked, last_error)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                job.id,
                job.name,
                payload,
                job.cron.enabled,
                job.cron.start_at.to_rfc3339(),
                job.cron.stop_at.map(|dt| dt.to_rfc3339()),
                job.cron.interval,
                job.cron.remove_expired,
                job.cron.started_at.map(|dt| dt.to_rfc3339()),
                job.cron.processed_at.map(|dt| dt.to_rfc3339()),
                job.cron.processed_count,
                job.cron.locked,
                job.cron.last_error,
            ],
        )?;
        info!(job_id = %job.id, name = %job.name, "job inserted");
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY start_at, id"))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let payload_raw: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        payload,
        cron: CronMeta {
            enabled: row.get(3)?,
            start_at: required_ts(row, 4)?,
            stop_at: optional_ts(row, 5)?,
            interval: row.get(6)?,
            remove_expired: row.get(7)?,
            started_at: optional_ts(row, 8)?,
            processed_at: optional_ts(row, 9)?,
            processed_count: row.get(10)?,
            locked: row.get(11)?,
            last_error: row.get(12)?,
        },
    })
}

fn required_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw, idx)
}

fn optional_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(&s, idx)).transpose()
}

fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
