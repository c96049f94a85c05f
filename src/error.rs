use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the Mirage proxy
#[derive(Error, Debug)]
pub enum MirageError {
    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    // Page fetch errors
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Fetch failed after {attempts} attempts: {message}")]
    FetchExhausted { attempts: u32, message: String },

    #[error("Fetch deadline of {secs}s exceeded")]
    DeadlineExceeded { secs: u64 },

    #[error("Renderer error: {0}")]
    Render(String),

    #[error("No rendering session available within {secs}s")]
    Overloaded { secs: u64 },

    // Asset errors
    #[error("Upstream asset fetch failed: {0}")]
    UpstreamAsset(String),

    // Rewriting errors
    #[error("Malformed reference: {0}")]
    MalformedReference(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Mirage operations
pub type Result<T> = std::result::Result<T, MirageError>;

impl MirageError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            MirageError::InvalidRequest(_) | MirageError::MalformedReference(_) => {
                StatusCode::BAD_REQUEST
            }

            // 405 Method Not Allowed
            MirageError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,

            // 502 Bad Gateway
            MirageError::UpstreamAsset(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            MirageError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            MirageError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            MirageError::Fetch(_)
            | MirageError::FetchExhausted { .. }
            | MirageError::Render(_)
            | MirageError::InvalidConfig(_)
            | MirageError::Io(_)
            | MirageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable summary used as the `message` field of error bodies
    pub fn summary(&self) -> &'static str {
        match self {
            MirageError::InvalidRequest(_) | MirageError::MalformedReference(_) => {
                "Invalid request"
            }
            MirageError::MethodNotAllowed(_) => "Method not allowed",
            MirageError::UpstreamAsset(_) => "Failed to fetch asset",
            MirageError::Overloaded { .. } => "Renderer at capacity",
            MirageError::DeadlineExceeded { .. } => "Page fetch timed out",
            MirageError::Fetch(_)
            | MirageError::FetchExhausted { .. }
            | MirageError::Render(_) => "Failed to fetch page",
            MirageError::InvalidConfig(_) | MirageError::Io(_) | MirageError::Internal(_) => {
                "Internal server error"
            }
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for MirageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "status": "error",
            "message": self.summary(),
            "details": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for MirageError {
    fn from(err: url::ParseError) -> Self {
        MirageError::InvalidRequest(err.to_string())
    }
}

// Convert from outbound asset client errors
impl From<reqwest::Error> for MirageError {
    fn from(err: reqwest::Error) -> Self {
        MirageError::UpstreamAsset(err.to_string())
    }
}
