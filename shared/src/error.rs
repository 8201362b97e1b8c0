//! Error types for the maintenance expert Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a request before or around the agent call.
///
/// Agent failures are deliberately not part of this enum: they are absorbed
/// into the chat reply, see [`crate::agents::AgentError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Request origin is not on the allow-list
    #[error("Forbidden origin: {0}")]
    Forbidden(String),

    /// Body is not a JSON object of the expected shape
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Query is absent or blank after trimming
    #[error("Missing query parameter")]
    MissingQuery,

    /// Query exceeds the character limit
    #[error("Query too long: {0} characters")]
    QueryTooLong(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not enough execution time left to call the agent
    #[error("Insufficient remaining time: {0}ms")]
    Timeout(u64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidBody(_) | Error::MissingQuery | Error::QueryTooLong(_) => 400,
            Error::Forbidden(_) => 403,
            Error::Timeout(_) => 503,
            Error::Config(_) | Error::Serialization(_) | Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable tag returned in the `error` field.
    pub fn error_tag(&self) -> &'static str {
        match self {
            Error::Forbidden(_) => "Forbidden",
            Error::InvalidBody(_) => "Invalid request format",
            Error::MissingQuery => "Missing query parameter",
            Error::QueryTooLong(_) => "Query too long",
            Error::Config(_) => "Service configuration error",
            Error::Timeout(_) => "Service timeout",
            Error::Serialization(_) => "Response encoding error",
            Error::Internal(_) => "Internal server error",
        }
    }

    /// Human-readable text returned in the `message` field.
    ///
    /// Never includes the inner detail, which is only logged.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Forbidden(_) => "Invalid request origin",
            Error::InvalidBody(_) => "Request body must be valid JSON",
            Error::MissingQuery => "Please provide a question about equipment maintenance",
            Error::QueryTooLong(_) => {
                "Your question is too long. Please keep it under 10,000 characters."
            }
            Error::Config(_) => {
                "The maintenance system is not properly configured. Please contact support."
            }
            Error::Timeout(_) => "The request is taking too long. Please try again.",
            Error::Serialization(_) => "Unable to format response properly",
            Error::Internal(_) => "An unexpected error occurred. Please try again later.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::MissingQuery.status_code(), 400);
        assert_eq!(Error::QueryTooLong(10_001).status_code(), 400);
        assert_eq!(Error::Forbidden("https://evil.com".into()).status_code(), 403);
        assert_eq!(Error::Timeout(500).status_code(), 503);
        assert_eq!(Error::Config("blank agent id".into()).status_code(), 500);
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = Error::Internal("connection reset by peer".to_string());
        assert!(!err.user_message().contains("connection reset"));
        assert_eq!(err.error_tag(), "Internal server error");
    }
}
