use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Scheduling sub-structure embedded in every [`Job`].
///
/// The engine owns every transition of these fields; records are created
/// externally with at least `start_at` set (the default is the creation
/// instant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronMeta {
    /// Master on/off switch. `None` on a fresh record; the store forces it
    /// to `Some(true)` on first persist.
    pub enabled: Option<bool>,
    /// Earliest moment the job is eligible for a claim.
    pub start_at: DateTime<Utc>,
    /// Last eligible moment. `None` means unbounded.
    pub stop_at: Option<DateTime<Utc>>,
    /// Cron expression (six fields, seconds resolution). `None` = one-shot.
    pub interval: Option<String>,
    /// Delete the job once no further occurrence exists, instead of
    /// disabling it.
    #[serde(default)]
    pub remove_expired: bool,
    /// Set together with `locked` when a claim succeeds.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when handling completes (success or retirement).
    pub processed_at: Option<DateTime<Utc>>,
    /// Successful-completion counter, monotone non-decreasing.
    #[serde(default)]
    pub processed_count: u32,
    /// Claimed by some engine instance right now.
    #[serde(default)]
    pub locked: bool,
    /// Message from the most recent handler failure.
    pub last_error: Option<String>,
}

impl Default for CronMeta {
    fn default() -> Self {
        Self {
            enabled: None,
            start_at: Utc::now(),
            stop_at: None,
            interval: None,
            remove_expired: false,
            started_at: None,
            processed_at: None,
            processed_count: 0,
            locked: false,
            last_error: None,
        }
    }
}

impl CronMeta {
    /// A job is claimable iff it is switched on, not locked by another
    /// instance, and `now` falls inside its `[start_at, stop_at]` window.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.enabled == Some(true)
            && !self.locked
            && self.start_at <= now
            && self.stop_at.is_none_or(|stop| stop >= now)
    }

    /// First-persist normalisation: a record saved without an explicit
    /// switch state is switched on.
    pub fn apply_insert_defaults(&mut self) {
        if self.enabled.is_none() {
            self.enabled = Some(true);
        }
    }

    /// Wall time spent in the most recent handling, when both ends are known.
    pub fn process_duration(&self) -> Option<Duration> {
        match (self.processed_at, self.started_at) {
            (Some(processed), Some(started)) => Some(processed - started),
            _ => None,
        }
    }

    /// True while a claim is in flight: started but not yet processed.
    pub fn processing(&self) -> bool {
        self.processed_at.is_none() && self.started_at.is_some()
    }
}

/// A persisted record representing one schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4 string — primary key.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Opaque JSON payload forwarded verbatim to the handler.
    pub payload: serde_json::Value,
    /// Scheduling metadata.
    pub cron: CronMeta,
}

impl Job {
    /// New record with default scheduling metadata (`start_at` = now,
    /// one-shot, switch state decided on first persist).
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            payload,
            cron: CronMeta::default(),
        }
    }

    pub fn with_interval(mut self, expr: impl Into<String>) -> Self {
        self.cron.interval = Some(expr.into());
        self
    }

    pub fn with_start_at(mut self, at: DateTime<Utc>) -> Self {
        self.cron.start_at = at;
        self
    }

    pub fn with_stop_at(mut self, at: DateTime<Utc>) -> Self {
        self.cron.stop_at = Some(at);
        self
    }

    pub fn with_remove_expired(mut self, remove: bool) -> Self {
        self.cron.remove_expired = remove;
        self
    }
}

/// Reject a cron expression the six-field grammar cannot parse.
///
/// Stores call this before persisting a record so a malformed interval is
/// caught at insert time rather than silently retiring the job on its first
/// reschedule.
pub fn validate_interval(expr: &str) -> Result<()> {
    cron::Schedule::from_str(expr)
        .map(|_| ())
        .map_err(|e| CoreError::InvalidInterval {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn eligible_meta(now: DateTime<Utc>) -> CronMeta {
        CronMeta {
            enabled: Some(true),
            start_at: now - Duration::seconds(1),
            ..CronMeta::default()
        }
    }

    #[test]
    fn fresh_record_is_not_eligible_until_persisted() {
        let now = at(0);
        let mut meta = eligible_meta(now);
        meta.enabled = None;
        assert!(!meta.is_eligible(now));

        meta.apply_insert_defaults();
        assert_eq!(meta.enabled, Some(true));
        assert!(meta.is_eligible(now));
    }

    #[test]
    fn insert_defaults_keep_explicit_switch_state() {
        let mut meta = CronMeta {
            enabled: Some(false),
            ..CronMeta::default()
        };
        meta.apply_insert_defaults();
        assert_eq!(meta.enabled, Some(false));
    }

    #[test]
    fn locked_record_is_not_eligible() {
        let now = at(0);
        let mut meta = eligible_meta(now);
        meta.locked = true;
        assert!(!meta.is_eligible(now));
    }

    #[test]
    fn window_bounds_eligibility() {
        let now = at(0);
        let mut meta = eligible_meta(now);

        meta.start_at = now + Duration::seconds(5);
        assert!(!meta.is_eligible(now));

        meta.start_at = now;
        meta.stop_at = Some(now - Duration::seconds(1));
        assert!(!meta.is_eligible(now));

        meta.stop_at = Some(now);
        assert!(meta.is_eligible(now));
    }

    #[test]
    fn processing_and_duration_accessors() {
        let mut meta = CronMeta::default();
        assert!(!meta.processing());
        assert_eq!(meta.process_duration(), None);

        meta.started_at = Some(at(0));
        assert!(meta.processing());

        meta.processed_at = Some(at(3));
        assert!(!meta.processing());
        assert_eq!(meta.process_duration(), Some(Duration::seconds(3)));
    }

    #[test]
    fn interval_validation() {
        assert!(validate_interval("* * * * * *").is_ok());
        assert!(validate_interval("0 30 9 * * Mon").is_ok());
        assert!(validate_interval("not a cron line").is_err());
    }
}
