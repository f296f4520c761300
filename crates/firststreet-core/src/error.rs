use thiserror::Error;

use crate::classify::ApiError;

/// Invalid or missing client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key cannot be empty (set FIRSTSTREET_API_KEY)")]
    MissingApiKey,
    #[error("connection limit must be a positive integer: '{value}'")]
    InvalidConnectionLimit { value: String },
    #[error("request timeout must be a positive number of seconds: '{value}'")]
    InvalidTimeout { value: String },
    #[error("requests per second must be a positive integer: '{value}'")]
    InvalidRequestRate { value: String },
    #[error("failed to build http transport: {0}")]
    Transport(String),
}

/// Batch-fatal outcome of [`Dispatcher::execute`](crate::Dispatcher::execute).
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A request task panicked or finished without a result. `index` is the
    /// descriptor position when it could be recovered.
    #[error("request task failed: {reason}")]
    TaskFailed {
        index: Option<usize>,
        reason: String,
    },
}

impl BatchError {
    /// The classified API error, when the batch was aborted by one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            Self::TaskFailed { .. } => None,
        }
    }
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("logging initialization failed: {0}")]
    Logging(String),
}
