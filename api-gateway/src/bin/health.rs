//! Health Lambda - Reports whether the Bedrock agent and its knowledge base are ready.

use chrono::{SecondsFormat, Utc};
use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Serialize;
use shared::http::{empty_response, json_response};
use shared::status::{AGENT_READY_STATUS, KNOWLEDGE_BASE_READY_STATUS};
use shared::{build_headers, BedrockStatusClient, Config, OriginDecision, StatusError, StatusSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const ALLOWED_METHODS: &str = "GET, OPTIONS";

/// Ordered so that the worst status compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

#[derive(Debug, Serialize)]
struct ServiceHealth {
    status: HealthStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kb_id: Option<String>,
}

impl ServiceHealth {
    fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            agent_id: None,
            kb_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: HealthStatus,
    timestamp: String,
    version: &'static str,
    services: BTreeMap<&'static str, ServiceHealth>,
}

impl HealthReport {
    fn status_code(&self) -> u16 {
        match self.status {
            HealthStatus::Healthy | HealthStatus::Warning => 200,
            HealthStatus::Unhealthy => 503,
        }
    }
}

struct AppState<S> {
    config: Config,
    source: S,
}

/// Healthy when the lookup reports `ready`, a warning for any other status.
fn from_lookup(name: &str, ready: &str, lookup: Result<String, StatusError>) -> ServiceHealth {
    match lookup {
        Ok(status) if status == ready => {
            ServiceHealth::new(HealthStatus::Healthy, format!("{} status: {}", name, status))
        }
        Ok(status) => {
            ServiceHealth::new(HealthStatus::Warning, format!("{} status: {}", name, status))
        }
        Err(e) => {
            error!("{} check failed: {}", name, e);
            ServiceHealth::new(HealthStatus::Unhealthy, format!("{} check failed: {}", name, e))
        }
    }
}

async fn check_agent<S: StatusSource>(config: &Config, source: &S) -> ServiceHealth {
    let agent_id = config.agent_id.trim();
    if agent_id.is_empty() {
        return ServiceHealth::new(HealthStatus::Warning, "Bedrock Agent ID not configured");
    }

    let lookup = source.agent_status(agent_id).await;
    ServiceHealth {
        agent_id: Some(agent_id.to_string()),
        ..from_lookup("Bedrock Agent", AGENT_READY_STATUS, lookup)
    }
}

async fn check_knowledge_base<S: StatusSource>(config: &Config, source: &S) -> ServiceHealth {
    let Some(kb_id) = config.knowledge_base_id.as_deref() else {
        return ServiceHealth::new(HealthStatus::Warning, "Knowledge Base ID not configured");
    };

    let lookup = source.knowledge_base_status(kb_id).await;
    ServiceHealth {
        kb_id: Some(kb_id.to_string()),
        ..from_lookup("Knowledge Base", KNOWLEDGE_BASE_READY_STATUS, lookup)
    }
}

async fn check<S: StatusSource>(config: &Config, source: &S) -> HealthReport {
    let mut services = BTreeMap::new();
    services.insert("bedrock_agent", check_agent(config, source).await);
    services.insert("knowledge_base", check_knowledge_base(config, source).await);

    let status = services
        .values()
        .map(|service| service.status)
        .max()
        .unwrap_or(HealthStatus::Healthy);

    HealthReport {
        status,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: env!("CARGO_PKG_VERSION"),
        services,
    }
}

async fn handler<S: StatusSource>(
    state: Arc<AppState<S>>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let allowed = &state.config.allowed_origins;
    let decision = OriginDecision::from_headers(event.headers(), allowed);
    let headers = build_headers(&decision, allowed, ALLOWED_METHODS);

    if event.method() == Method::OPTIONS {
        return empty_response(&headers);
    }

    let report = check(&state.config, &state.source).await;
    info!("Health check completed with status: {:?}", report.status);
    json_response(report.status_code(), &headers, &report)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    // Missing identifiers are reported by the check rather than failing cold start
    let config = Config::from_env().unwrap_or_else(|e| {
        warn!("Falling back to default configuration: {}", e);
        Config::default()
    });
    let source = BedrockStatusClient::from_config(&config).await;
    let state = Arc::new(AppState { config, source });

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
