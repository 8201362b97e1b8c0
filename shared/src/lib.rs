//! Shared library for the maintenance expert Lambda functions.
//!
//! This crate provides the configuration, validation, CORS handling and Bedrock agent
//! client used by the query Lambda, plus the agent status lookups behind the health Lambda.

pub mod agents;
pub mod classifier;
pub mod config;
pub mod cors;
pub mod error;
pub mod http;
pub mod models;
pub mod status;
pub mod validation;

pub use agents::{AgentBackend, AgentError, AgentReply, BedrockAgentClient, ErrorCode, StreamLimits};
pub use classifier::classify;
pub use config::Config;
pub use cors::{build_headers, OriginDecision, OriginPattern, ResponseHeaders};
pub use error::{Error, Result};
pub use models::{ErrorBody, QueryRequest, QueryResponse};
pub use status::{BedrockStatusClient, StatusError, StatusSource};
pub use validation::{validate_body, ValidatedQuery};
