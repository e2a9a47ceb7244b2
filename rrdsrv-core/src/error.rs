//! Error types for query sanitization

use thiserror::Error;

/// Result type for sanitizer operations
pub type SanitizeResult<T> = Result<T, SanitizeError>;

/// Errors produced while sanitizing an export query.
///
/// Every variant except `Configuration` reflects a defect in client input
/// and maps to an HTTP 400 at the service layer; none is retriable.
#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("rejected token: {0}")]
    RejectedToken(String),

    #[error("malformed clause: {0}")]
    MalformedClause(String),

    #[error("absolute path rejected: {0}")]
    AbsolutePathRejected(String),

    #[error("path traversal rejected: {0}")]
    TraversalRejected(String),

    #[error("path escapes rrd root: {0}")]
    EscapeRejected(String),

    #[error("no such rrd file: {0}")]
    NotFound(String),

    #[error("empty query")]
    EmptyQuery,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SanitizeError {
    /// Create a new malformed query error
    pub fn malformed_query<S: Into<String>>(message: S) -> Self {
        Self::MalformedQuery(message.into())
    }

    /// Create a new rejected token error
    pub fn rejected_token<S: Into<String>>(message: S) -> Self {
        Self::RejectedToken(message.into())
    }

    /// Create a new malformed clause error
    pub fn malformed_clause<S: Into<String>>(message: S) -> Self {
        Self::MalformedClause(message.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SanitizeError::MalformedQuery(_) => "malformed_query",
            SanitizeError::RejectedToken(_) => "rejected_token",
            SanitizeError::MalformedClause(_) => "malformed_clause",
            SanitizeError::AbsolutePathRejected(_) => "absolute_path",
            SanitizeError::TraversalRejected(_) => "traversal",
            SanitizeError::EscapeRejected(_) => "escape",
            SanitizeError::NotFound(_) => "not_found",
            SanitizeError::EmptyQuery => "empty_query",
            SanitizeError::Configuration(_) => "configuration",
        }
    }

    /// Check whether this error reflects client input (as opposed to
    /// server-side configuration)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SanitizeError::Configuration(_))
    }
}
