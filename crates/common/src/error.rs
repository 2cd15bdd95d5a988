//! Unified error type for the carbon minimiser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Location not configured: {0}")]
    LocationNotConfigured(String),

    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Cache not available yet")]
    CacheNotReady,

    #[error("No cached entry for {operation}[{param}]")]
    NotFound { operation: String, param: String },

    #[error("Refresh loop is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::LocationNotConfigured(_) | Error::UnknownRegion(_)
        )
    }
}
