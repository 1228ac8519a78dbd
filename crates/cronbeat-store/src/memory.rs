use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cronbeat_core::{validate_interval, Job, JobPatch};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::gateway::{ClaimQuery, JobStore};

/// In-memory store backend.
///
/// Claim atomicity comes from holding the map lock for the whole
/// scan-and-mark: a concurrent claimant cannot observe the job between
/// selection and locking. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn claim_next(&self, query: &ClaimQuery) -> Result<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        // id is the tie-break so equal start_at claims are deterministic
        let picked = jobs
            .values()
            .filter(|job| job.cron.is_eligible(query.now))
            .filter(|job| query.extra.as_ref().is_none_or(|pred| pred(job)))
            .min_by(|a, b| {
                a.cron
                    .start_at
                    .cmp(&b.cron.start_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|job| job.id.clone());

        let Some(id) = picked else {
            return Ok(None);
        };
        match jobs.get_mut(&id) {
            Some(job) => {
                job.cron.locked = true;
                job.cron.started_at = Some(query.now);
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, id: &str, patch: &JobPatch) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(id).ok_or_else(|| StoreError::JobNotFound {
            id: id.to_string(),
        })?;
        patch.apply(&mut job.cron);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.remove(id).ok_or_else(|| StoreError::JobNotFound {
            id: id.to_string(),
        })?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn insert(&self, mut job: Job) -> Result<Job> {
        if let Some(expr) = &job.cron.interval {
            validate_interval(expr)?;
        }
        if job.id.is_empty() {
            job.id = Uuid::new_v4().to_string();
        }
        job.cron.apply_insert_defaults();

        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateJob { id: job.id });
        }
        info!(job_id = %job.id, name = %job.name, "job inserted");
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| {
            a.cron
                .start_at
                .cmp(&b.cron.start_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn demo_job(name: &str) -> Job {
        Job::new(name, serde_json::json!({}))
    }

    #[tokio::test]
    async fn insert_applies_defaults_and_find_returns_them() {
        let store = MemoryStore::new();
        let job = store.insert(demo_job("a")).await.unwrap();
        assert_eq!(job.cron.enabled, Some(true));

        let found = store.find(&job.id).await.unwrap().unwrap();
        assert_eq!(found.cron.enabled, Some(true));
        assert!(!found.cron.locked);
    }

    #[tokio::test]
    async fn insert_rejects_malformed_interval() {
        let store = MemoryStore::new();
        let job = demo_job("a").with_interval("definitely not cron");
        assert!(store.insert(job).await.is_err());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let job = store.insert(demo_job("a")).await.unwrap();
        let dup = Job {
            id: job.id.clone(),
            ..demo_job("b")
        };
        assert!(matches!(
            store.insert(dup).await,
            Err(StoreError::DuplicateJob { .. })
        ));
    }

    #[tokio::test]
    async fn claim_prefers_earliest_start_and_locks() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let late = store
            .insert(demo_job("late").with_start_at(now - Duration::seconds(1)))
            .await
            .unwrap();
        let early = store
            .insert(demo_job("early").with_start_at(now - Duration::seconds(10)))
            .await
            .unwrap();

        let claimed = store.claim_next(&ClaimQuery::at(now)).await.unwrap().unwrap();
        assert_eq!(claimed.id, early.id);
        assert!(claimed.cron.locked);
        assert_eq!(claimed.cron.started_at, Some(now));

        // the locked job is skipped, the other one is claimed next
        let second = store.claim_next(&ClaimQuery::at(now)).await.unwrap().unwrap();
        assert_eq!(second.id, late.id);

        assert!(store.claim_next(&ClaimQuery::at(now)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_respects_window_and_switch() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert(demo_job("future").with_start_at(now + Duration::seconds(30)))
            .await
            .unwrap();
        store
            .insert(
                demo_job("expired")
                    .with_start_at(now - Duration::seconds(60))
                    .with_stop_at(now - Duration::seconds(30)),
            )
            .await
            .unwrap();
        let mut off = demo_job("off");
        off.cron.enabled = Some(false);
        store.insert(off).await.unwrap();

        assert!(store.claim_next(&ClaimQuery::at(now)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_applies_extra_predicate() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert(demo_job("skipped").with_start_at(now - Duration::seconds(10)))
            .await
            .unwrap();
        let wanted = store
            .insert(demo_job("wanted").with_start_at(now - Duration::seconds(1)))
            .await
            .unwrap();

        let query = ClaimQuery::at(now).with_extra(Arc::new(|job: &Job| job.name == "wanted"));
        let claimed = store.claim_next(&query).await.unwrap().unwrap();
        assert_eq!(claimed.id, wanted.id);
    }

    #[tokio::test]
    async fn update_patches_and_missing_id_errors() {
        let store = MemoryStore::new();
        let job = store.insert(demo_job("a")).await.unwrap();

        let patch = JobPatch::new().clear_enabled().set_error("boom");
        store.update(&job.id, &patch).await.unwrap();

        let found = store.find(&job.id).await.unwrap().unwrap();
        assert_eq!(found.cron.enabled, None);
        assert_eq!(found.cron.last_error.as_deref(), Some("boom"));

        assert!(matches!(
            store.update("nope", &JobPatch::new()).await,
            Err(StoreError::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_and_missing_id_errors() {
        let store = MemoryStore::new();
        let job = store.insert(demo_job("a")).await.unwrap();
        store.delete(&job.id).await.unwrap();
        assert!(store.find(&job.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&job.id).await,
            Err(StoreError::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_orders_by_start_at() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert(demo_job("b").with_start_at(now + Duration::seconds(10)))
            .await
            .unwrap();
        store
            .insert(demo_job("a").with_start_at(now - Duration::seconds(10)))
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "a");
        assert_eq!(all[1].name, "b");
    }
}
