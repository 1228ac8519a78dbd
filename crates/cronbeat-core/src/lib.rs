//! `cronbeat-core` — shared job model and configuration.
//!
//! A [`Job`] is a persisted record augmented with a scheduling sub-structure
//! ([`CronMeta`]): an on/off switch, a claimable `[start_at, stop_at]`
//! window, an optional cron-expression recurrence rule, and the bookkeeping
//! fields the engine maintains (`started_at`, `processed_at`,
//! `processed_count`, `locked`, `last_error`).
//!
//! State transitions are expressed as typed partial updates ([`JobPatch`])
//! so every store backend applies the exact same set/clear semantics.

pub mod config;
pub mod error;
pub mod job;
pub mod patch;

pub use config::{CronbeatConfig, DatabaseConfig, EngineSettings};
pub use error::{CoreError, Result};
pub use job::{validate_interval, CronMeta, Job};
pub use patch::{JobPatch, Patch};
