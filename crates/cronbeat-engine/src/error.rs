use thiserror::Error;

/// Classification of a failed heartbeat.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No job matched the eligibility filter. Expected and transient — this
    /// drives the idle backoff, it is never surfaced as an application
    /// error.
    #[error("no eligible job")]
    NoEligibleJob,

    /// The store gateway failed (claim, update or delete).
    #[error("store error: {0}")]
    Store(#[from] cronbeat_store::StoreError),

    /// The handler returned a failure or panicked.
    #[error("handler failed: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
