use chrono::{DateTime, Utc};

use crate::job::CronMeta;

/// One field of a partial update: leave untouched, clear, or overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

/// Typed partial update of a job's scheduling metadata.
///
/// Every backend applies patches through [`JobPatch::apply`], so the
/// set/clear semantics are identical whether the job lives in memory or in
/// SQLite. `bump_processed` rides along with the rest of the patch and is
/// applied in the same store operation.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub enabled: Patch<bool>,
    /// Overwrites the claim-window start. Never cleared: a job always has
    /// an earliest eligible moment.
    pub start_at: Option<DateTime<Utc>>,
    pub locked: Option<bool>,
    pub started_at: Patch<DateTime<Utc>>,
    pub processed_at: Patch<DateTime<Utc>>,
    pub last_error: Patch<String>,
    /// Increment `processed_count` by one.
    pub bump_processed: bool,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Patch::Set(enabled);
        self
    }

    /// Unset the switch entirely (the job is parked, neither on nor off by
    /// an explicit choice — re-enabling is an operator action).
    pub fn clear_enabled(mut self) -> Self {
        self.enabled = Patch::Clear;
        self
    }

    pub fn start_at(mut self, at: DateTime<Utc>) -> Self {
        self.start_at = Some(at);
        self
    }

    pub fn unlock(mut self) -> Self {
        self.locked = Some(false);
        self
    }

    pub fn processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.processed_at = Patch::Set(at);
        self
    }

    pub fn set_error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Patch::Set(message.into());
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.last_error = Patch::Clear;
        self
    }

    pub fn bump_processed(mut self) -> Self {
        self.bump_processed = true;
        self
    }

    /// Apply this patch to `meta` in place.
    pub fn apply(&self, meta: &mut CronMeta) {
        match self.enabled {
            Patch::Keep => {}
            Patch::Clear => meta.enabled = None,
            Patch::Set(v) => meta.enabled = Some(v),
        }
        if let Some(at) = self.start_at {
            meta.start_at = at;
        }
        if let Some(locked) = self.locked {
            meta.locked = locked;
        }
        match self.started_at {
            Patch::Keep => {}
            Patch::Clear => meta.started_at = None,
            Patch::Set(at) => meta.started_at = Some(at),
        }
        match self.processed_at {
            Patch::Keep => {}
            Patch::Clear => meta.processed_at = None,
            Patch::Set(at) => meta.processed_at = Some(at),
        }
        match &self.last_error {
            Patch::Keep => {}
            Patch::Clear => meta.last_error = None,
            Patch::Set(msg) => meta.last_error = Some(msg.clone()),
        }
        if self.bump_processed {
            meta.processed_count = meta.processed_count.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut meta = CronMeta {
            enabled: Some(true),
            locked: true,
            last_error: Some("boom".into()),
            processed_count: 3,
            ..CronMeta::default()
        };
        let before = meta.clone();
        JobPatch::new().apply(&mut meta);
        assert_eq!(meta.enabled, before.enabled);
        assert_eq!(meta.locked, before.locked);
        assert_eq!(meta.last_error, before.last_error);
        assert_eq!(meta.processed_count, before.processed_count);
    }

    #[test]
    fn reschedule_patch_shape() {
        let mut meta = CronMeta {
            enabled: Some(true),
            locked: true,
            started_at: Some(at(0)),
            last_error: Some("old".into()),
            processed_count: 1,
            ..CronMeta::default()
        };
        JobPatch::new()
            .unlock()
            .clear_error()
            .processed_at(at(2))
            .start_at(at(60))
            .bump_processed()
            .apply(&mut meta);

        assert_eq!(meta.enabled, Some(true));
        assert!(!meta.locked);
        assert_eq!(meta.last_error, None);
        assert_eq!(meta.processed_at, Some(at(2)));
        assert_eq!(meta.start_at, at(60));
        assert_eq!(meta.processed_count, 2);
    }

    #[test]
    fn failure_patch_parks_the_job() {
        let mut meta = CronMeta {
            enabled: Some(true),
            locked: true,
            ..CronMeta::default()
        };
        JobPatch::new()
            .clear_enabled()
            .unlock()
            .set_error("handler exploded")
            .apply(&mut meta);

        assert_eq!(meta.enabled, None);
        assert!(!meta.locked);
        assert_eq!(meta.last_error.as_deref(), Some("handler exploded"));
        assert_eq!(meta.processed_count, 0);
    }
}
