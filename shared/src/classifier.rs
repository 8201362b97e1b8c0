//! Maps agent failures to conversational replies.
//!
//! The raw service message is logged by the caller and never returned.

use crate::agents::{AgentError, ErrorCode};

/// User-facing reply for an agent failure.
pub fn classify(error: &AgentError) -> &'static str {
    match error.code {
        ErrorCode::Validation => "There was an issue with your request format. Please try again.",
        ErrorCode::AccessDenied => {
            "I don't have permission to access the maintenance system. Please contact support."
        }
        ErrorCode::Throttling => "The system is currently busy. Please wait a moment and try again.",
        ErrorCode::ResourceNotFound => {
            "The maintenance system is temporarily unavailable. Please try again later."
        }
        ErrorCode::Other(_) => "I encountered a technical issue. Please try again in a few moments.",
    }
}
