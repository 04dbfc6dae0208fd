//! Engine error type

/// Result type for this crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything the engine can reject
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0} not trained")]
    NotTrained(&'static str),

    #[error("Feature length mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Unsupported state version {found} (expected {expected})")]
    StateVersion { found: u32, expected: u32 },

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }
}
