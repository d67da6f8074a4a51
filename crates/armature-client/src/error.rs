//! Error taxonomy of the CAD service boundary.

use std::time::Duration;

use thiserror::Error;

/// Per-request timeout applied by client implementations.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(50);

/// Errors crossing the CAD service boundary. Implementations map HTTP
/// statuses onto these variants: 404 → `NotFound`, 401/403 →
/// `Unauthorized`, 429 → `Throttled`, anything else → `Upstream`.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The document URL did not match the strict
    /// `/documents/{did}/{w|v|m}/{wid}/e/{eid}` shape.
    #[error("invalid document url: {0}")]
    InvalidUrl(String),

    /// Credentials were rejected.
    #[error("unauthorized: credentials rejected by the CAD service")]
    Unauthorized,

    /// The addressed document, element or part does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service throttled the request; retrying is the caller's call.
    #[error("throttled by the CAD service (retry after {retry_after:?})")]
    Throttled {
        /// Value of the `Retry-After` header, when present.
        retry_after: Option<Duration>,
    },

    /// Any other upstream failure.
    #[error("upstream error {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated by the implementation.
        body: String,
    },

    /// The per-request timeout elapsed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A payload failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local filesystem failure while writing artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
