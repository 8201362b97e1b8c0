//! Shared data models.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query request payload.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// At most 10,000 characters.
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Query response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub response: String,
    pub session_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Body of every non-success response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&crate::Error> for ErrorBody {
    fn from(err: &crate::Error) -> Self {
        Self {
            error: err.error_tag().to_string(),
            message: err.user_message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let json = r#"{"query":"How do I reset the pump?","sessionId":"abc-123"}"#;
        let request: QueryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.query, "How do I reset the pump?");
        assert_eq!(request.session_id, Some("abc-123".to_string()));
    }

    #[test]
    fn test_missing_fields_default() {
        let request: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(request.query.is_empty());
        assert!(request.session_id.is_none());
    }

    #[test]
    fn test_response_field_names() {
        let body = serde_json::to_value(QueryResponse {
            response: "Check the valve.".to_string(),
            session_id: "s-1".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            request_id: None,
        })
        .unwrap();
        assert_eq!(body["sessionId"], "s-1");
        assert!(body.get("requestId").is_none());
    }
}
