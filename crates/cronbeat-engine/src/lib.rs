//! `cronbeat-engine` — the claim-and-execute heartbeat loop.
//!
//! # Overview
//!
//! A [`CronEngine`] instance runs one cooperative loop: claim the eligible
//! job with the earliest `start_at` through the store's atomic
//! [`claim_next`](cronbeat_store::JobStore::claim_next), invoke the
//! caller-supplied [`JobHandler`], compute the next occurrence, and persist
//! the outcome. Any number of instances may point at the same store; the
//! claim is the only coordination between them.
//!
//! # Tick outcomes
//!
//! | Outcome                 | Next heartbeat after | Persisted |
//! |-------------------------|----------------------|-----------|
//! | no eligible job         | `idle_delay` (1 s)   | nothing |
//! | handled, has next start | `tick_delay` (0)     | unlock, `processed_at`, new `start_at`, count+1 |
//! | handled, no next start  | `tick_delay`         | retire (switch off) or delete (`remove_expired`) |
//! | handler/store failure   | `tick_delay`         | park: switch off, unlock, `last_error` |
//!
//! The loop never exits on job- or store-level failures; only
//! [`CronEngine::stop`] (or dropping the engine) halts it.

pub mod engine;
pub mod error;
pub mod events;
pub mod handler;
pub mod schedule;

pub use engine::{CronConfig, CronEngine};
pub use error::{EngineError, Result};
pub use events::CronEvent;
pub use handler::{handler_fn, FnHandler, HandlerError, JobHandler};
pub use schedule::next_start;
