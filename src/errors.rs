use thiserror::Error;

#[derive(Debug, Error)]
pub enum TapFlowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Uniform retryable signal surfaced to the driving agent. Carries only a
    /// generic message; the underlying cause is logged locally.
    #[error("{0}")]
    Retry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl TapFlowError {
    /// True for errors the driving agent is expected to retry on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TapFlowError::Retry(_))
    }
}

pub type TapFlowResult<T> = Result<T, TapFlowError>;
