//! Configuration management for Lambda functions.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cors::OriginPattern;
use crate::{Error, Result};

/// Allow-list used when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: &str =
    "https://localhost:8501,https://*.streamlit.app,https://*.herokuapp.com";

/// Remaining-time threshold used when `MIN_REMAINING_TIME_MS` is not set.
pub const DEFAULT_MIN_REMAINING_TIME_MS: u64 = 10_000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bedrock agent identifier
    pub agent_id: String,
    /// Bedrock agent alias identifier
    pub agent_alias_id: String,
    /// Knowledge base backing the agent (reported by the health check)
    pub knowledge_base_id: Option<String>,
    /// AWS region
    pub aws_region: String,
    /// Origins allowed to call the query endpoint
    pub allowed_origins: Vec<OriginPattern>,
    /// Minimum remaining execution time before the agent is invoked
    pub min_remaining_time: Duration,
    /// Upper bound on stream events consumed per reply
    pub max_response_chunks: usize,
    /// Upper bound on characters kept per reply
    pub max_response_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            agent_alias_id: String::new(),
            knowledge_base_id: None,
            aws_region: "us-east-1".to_string(),
            allowed_origins: OriginPattern::parse_list(DEFAULT_ALLOWED_ORIGINS),
            min_remaining_time: Duration::from_millis(DEFAULT_MIN_REMAINING_TIME_MS),
            max_response_chunks: 1000,
            max_response_chars: 50_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            agent_id: required("BEDROCK_AGENT_ID")?,
            agent_alias_id: required("BEDROCK_AGENT_ALIAS_ID")?,
            knowledge_base_id: env::var("KNOWLEDGE_BASE_ID")
                .ok()
                .filter(|id| !id.trim().is_empty()),
            aws_region: env::var("AWS_REGION").unwrap_or(defaults.aws_region),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|list| OriginPattern::parse_list(&list))
                .unwrap_or(defaults.allowed_origins),
            min_remaining_time: Duration::from_millis(parsed(
                "MIN_REMAINING_TIME_MS",
                DEFAULT_MIN_REMAINING_TIME_MS,
            )?),
            max_response_chunks: parsed("MAX_RESPONSE_CHUNKS", defaults.max_response_chunks)?,
            max_response_chars: parsed("MAX_RESPONSE_CHARS", defaults.max_response_chars)?,
        })
    }

    /// Check that the agent identifiers are usable.
    ///
    /// Runs per request so a blank identifier surfaces as a 500 response
    /// instead of a failed cold start.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(Error::Config("BEDROCK_AGENT_ID is blank".to_string()));
        }
        if self.agent_alias_id.trim().is_empty() {
            return Err(Error::Config("BEDROCK_AGENT_ALIAS_ID is blank".to_string()));
        }
        Ok(())
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{} not set", name)))
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_ids() {
        let config = Config {
            agent_id: "GMJGK6RO4S".to_string(),
            agent_alias_id: "  ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            agent_alias_id: "RUWFC5DRPQ".to_string(),
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.allowed_origins.len(), 3);
        assert_eq!(
            config.min_remaining_time,
            Duration::from_millis(DEFAULT_MIN_REMAINING_TIME_MS)
        );
        assert_eq!(
            parsed("MAINTENANCE_TEST_UNSET_THRESHOLD", DEFAULT_MIN_REMAINING_TIME_MS).unwrap(),
            10_000
        );
        assert_eq!(config.max_response_chunks, 1000);
        assert_eq!(config.max_response_chars, 50_000);
    }
}
