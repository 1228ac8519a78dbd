use thiserror::Error;

/// Errors from the shared model and configuration layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cron expression does not parse under the six-field grammar.
    #[error("Invalid cron interval `{expr}`: {reason}")]
    InvalidInterval { expr: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
