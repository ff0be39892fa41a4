//! Error types for the metalink server

use thiserror::Error;

/// Result type alias for metalink operations
pub type Result<T> = std::result::Result<T, MetalinkError>;

/// Error types that can occur while serving a metalink request
#[derive(Error, Debug, Clone)]
pub enum MetalinkError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Render error: {0}")]
    RenderError(String),
}

impl MetalinkError {
    /// Convert error to HTTP status code
    ///
    /// - Client mistakes in the query: 400
    /// - Repository without a catalog entry: 404
    /// - Upstream metadata failures: 502, or 504 when the fetch timed out
    /// - Everything else: 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            MetalinkError::InvalidRequest(_) => 400,
            MetalinkError::NotFound(_) => 404,

            MetalinkError::UpstreamStatus { .. } => 502,
            MetalinkError::UpstreamFetch(_) => 502,
            MetalinkError::UpstreamTimeout(_) => 504,

            MetalinkError::ConfigError(_) => 500,
            MetalinkError::CatalogError(_) => 500,
            MetalinkError::RenderError(_) => 500,
        }
    }

    /// Whether the failure came from the upstream metadata endpoint
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            MetalinkError::UpstreamStatus { .. }
                | MetalinkError::UpstreamFetch(_)
                | MetalinkError::UpstreamTimeout(_)
        )
    }

    /// Create an UpstreamStatus error from a status code and message
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        MetalinkError::UpstreamStatus {
            status,
            message: message.into(),
        }
    }

    /// Create the error returned when a repository has no mirrors
    pub fn no_mirrors() -> Self {
        MetalinkError::NotFound("No mirrors found for this repo".to_string())
    }
}
