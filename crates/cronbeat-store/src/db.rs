use rusqlite::Connection;

use crate::error::Result;

/// Initialise the job store schema in `conn`.
///
/// Creates the `jobs` table (idempotent) and the compound eligibility index
/// so the claim query stays efficient even with thousands of jobs.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id              TEXT    NOT NULL PRIMARY KEY,
            name            TEXT    NOT NULL,
            payload         TEXT    NOT NULL,   -- opaque JSON forwarded to the handler
            enabled         INTEGER,            -- NULL until cleared/set; 1 = claimable
            start_at        TEXT    NOT NULL,   -- RFC 3339
            stop_at         TEXT,               -- RFC 3339 or NULL (unbounded)
            interval        TEXT,               -- cron expression, NULL = one-shot
            remove_expired  INTEGER NOT NULL DEFAULT 0,
            started_at      TEXT,
            processed_at    TEXT,
            processed_count INTEGER NOT NULL DEFAULT 0,
            locked          INTEGER NOT NULL DEFAULT 0,
            last_error      TEXT
        ) STRICT;

        -- Claim: WHERE enabled=1 AND locked=0 AND start_at <= ? AND (stop_at ...)
        --        ORDER BY start_at
        CREATE INDEX IF NOT EXISTS idx_jobs_claim
            ON jobs (enabled, locked, start_at, stop_at);
        ",
    )?;
    Ok(())
}
