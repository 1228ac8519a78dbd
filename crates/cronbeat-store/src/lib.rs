//! `cronbeat-store` — the store gateway the engine coordinates through.
//!
//! The [`JobStore`] trait is the sole shared-mutable boundary between
//! engine instances. Its one non-trivial operation is [`JobStore::claim_next`]:
//! select the eligible job with the earliest `start_at` and mark it locked
//! in the same indivisible operation, so concurrent claimants always observe
//! disjoint sets of claimed jobs.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`] — mutexed map; single process, test double
//! - [`SqliteStore`] — shared SQLite file, claim runs in one transaction

pub mod db;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod sqlite;

pub use db::init_db;
pub use error::{Result, StoreError};
pub use gateway::{ClaimQuery, JobPredicate, JobStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
