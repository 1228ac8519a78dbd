use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cronbeat_core::{Job, JobPatch};

use crate::error::Result;

/// Caller-supplied claim predicate, merged with the built-in eligibility
/// filter. Evaluated inside the claim's critical section so it cannot race
/// a concurrent claimant.
pub type JobPredicate = Arc<dyn Fn(&Job) -> bool + Send + Sync>;

/// Parameters of one claim attempt.
#[derive(Clone)]
pub struct ClaimQuery {
    /// The tick instant: eligibility window checks and the persisted
    /// `started_at` both use this value.
    pub now: DateTime<Utc>,
    /// Extra eligibility predicate, if the engine was configured with one.
    pub extra: Option<JobPredicate>,
}

impl ClaimQuery {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, extra: None }
    }

    pub fn with_extra(mut self, extra: JobPredicate) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Store gateway: every cross-instance coordination flows through here.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically select-and-lock one job.
    ///
    /// Among the jobs eligible at `query.now` (and passing `query.extra`),
    /// the one with the earliest `start_at` is marked `locked` with
    /// `started_at = query.now` in the same indivisible operation, and the
    /// claimed snapshot is returned. `Ok(None)` when nothing matches — an
    /// empty store is not an error.
    async fn claim_next(&self, query: &ClaimQuery) -> Result<Option<Job>>;

    /// Apply a partial update to a job's scheduling metadata.
    async fn update(&self, id: &str, patch: &JobPatch) -> Result<()>;

    /// Remove a job entirely.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetch a single job by ID.
    async fn find(&self, id: &str) -> Result<Option<Job>>;

    /// Persist a new job, applying first-persist defaults (switch forced on
    /// when unset) and validating the cron interval when present. Returns
    /// the stored record.
    async fn insert(&self, job: Job) -> Result<Job>;

    /// All jobs ordered by `start_at` — operator/debug surface.
    async fn list(&self) -> Result<Vec<Job>>;
}
