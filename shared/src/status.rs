//! Control-plane status lookups for the agent and its knowledge base.

use std::future::Future;

use aws_sdk_bedrockagent::error::{DisplayErrorContext, SdkError};
use aws_sdk_bedrockagent::types::{Agent, KnowledgeBase};
use aws_sdk_bedrockagent::Client as BedrockAgentControlClient;
use thiserror::Error;
use tracing::debug;

use crate::Config;

/// Agent status reported once the agent can serve requests.
pub const AGENT_READY_STATUS: &str = "PREPARED";

/// Knowledge base status reported once it can be queried.
pub const KNOWLEDGE_BASE_READY_STATUS: &str = "ACTIVE";

/// Failed status lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct StatusError(pub String);

impl StatusError {
    fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        Self(DisplayErrorContext(&err).to_string())
    }
}

/// Reports the lifecycle status of Bedrock resources.
pub trait StatusSource: Send + Sync {
    fn agent_status(
        &self,
        agent_id: &str,
    ) -> impl Future<Output = Result<String, StatusError>> + Send;

    fn knowledge_base_status(
        &self,
        knowledge_base_id: &str,
    ) -> impl Future<Output = Result<String, StatusError>> + Send;
}

/// Client for the Bedrock agent control-plane `GetAgent` and `GetKnowledgeBase` APIs.
pub struct BedrockStatusClient {
    client: BedrockAgentControlClient,
}

impl BedrockStatusClient {
    pub fn new(client: BedrockAgentControlClient) -> Self {
        Self { client }
    }

    /// Build an SDK client for the configured region.
    pub async fn from_config(config: &Config) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;

        Self::new(BedrockAgentControlClient::new(&sdk_config))
    }
}

impl StatusSource for BedrockStatusClient {
    async fn agent_status(&self, agent_id: &str) -> Result<String, StatusError> {
        let output = self
            .client
            .get_agent()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(StatusError::from_sdk)?;

        let agent: Option<&Agent> = output.agent().into();
        let agent = agent.ok_or_else(|| StatusError("No agent in response".to_string()))?;
        let status = agent.agent_status().as_str().to_string();
        debug!(agent_id, status = %status, "Fetched agent status");
        Ok(status)
    }

    async fn knowledge_base_status(&self, knowledge_base_id: &str) -> Result<String, StatusError> {
        let output = self
            .client
            .get_knowledge_base()
            .knowledge_base_id(knowledge_base_id)
            .send()
            .await
            .map_err(StatusError::from_sdk)?;

        let knowledge_base: Option<&KnowledgeBase> = output.knowledge_base().into();
        let knowledge_base = knowledge_base
            .ok_or_else(|| StatusError("No knowledge base in response".to_string()))?;
        let status = knowledge_base.status().as_str().to_string();
        debug!(knowledge_base_id, status = %status, "Fetched knowledge base status");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_bedrockagent::operation::get_agent::GetAgentError;

    #[test]
    fn test_transport_error_keeps_detail() {
        let err = SdkError::<GetAgentError, ()>::timeout_error("deadline elapsed");
        let err = StatusError::from_sdk(err);
        assert!(err.to_string().contains("deadline elapsed"));
    }
}
