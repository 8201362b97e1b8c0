//! Inbound query validation.

use uuid::Uuid;
use validator::Validate;

use crate::models::QueryRequest;
use crate::{Error, Result};

/// A query that passed validation, ready for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    /// Trimmed query text
    pub query: String,
    /// Client session id, or a freshly generated one
    pub session_id: String,
    /// Whether `session_id` was generated for this request
    pub session_generated: bool,
}

/// Parse a raw request body. An empty body is treated as `{}`.
pub fn parse_body(body: &[u8]) -> Result<QueryRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(QueryRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::InvalidBody(e.to_string()))
}

/// Check a parsed request and resolve its session id.
pub fn validate_request(request: QueryRequest) -> Result<ValidatedQuery> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(Error::MissingQuery);
    }
    if request.validate().is_err() {
        return Err(Error::QueryTooLong(request.query.chars().count()));
    }

    let (session_id, session_generated) = match request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        Some(id) => (id.to_string(), false),
        None => (Uuid::new_v4().to_string(), true),
    };

    Ok(ValidatedQuery {
        query: query.to_string(),
        session_id,
        session_generated,
    })
}

/// Parse and validate a raw request body.
pub fn validate_body(body: &[u8]) -> Result<ValidatedQuery> {
    validate_request(parse_body(body)?)
}
