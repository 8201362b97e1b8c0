//! Query Lambda - Handles the chat query endpoint.
//!
//! Validates the caller's origin and request body, forwards the question to the
//! Bedrock agent, and returns the assembled answer. Agent failures are turned into
//! a conversational reply with status 200 so the chat UI always has something to show.

use chrono::{SecondsFormat, Utc};
use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::agents::AgentBackend;
use shared::http::{empty_response, error_response, json_response};
use shared::validation::validate_body;
use shared::{
    build_headers, classify, AgentReply, BedrockAgentClient, Config, OriginDecision,
    QueryResponse, ResponseHeaders,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Application state shared across requests.
struct AppState<A> {
    config: Config,
    agent: A,
}

/// Result of processing one query.
#[derive(Debug)]
enum QueryOutcome {
    /// The agent answered.
    Answered { reply: AgentReply, session_id: String },
    /// The agent failed; the failure is reported as a chat reply.
    Recovered {
        message: &'static str,
        session_id: String,
    },
    /// The request was refused before or instead of calling the agent.
    Rejected(shared::Error),
}

/// Time left before the Lambda deadline, if running under the Lambda runtime.
fn remaining_time(event: &Request) -> Option<Duration> {
    let ctx = event.lambda_context_ref()?;
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    Some(Duration::from_millis(ctx.deadline.saturating_sub(now)))
}

async fn process<A: AgentBackend>(
    state: &AppState<A>,
    event: &Request,
    decision: &OriginDecision,
) -> QueryOutcome {
    if let OriginDecision::Rejected(origin) = decision {
        warn!("Invalid origin: {}", origin);
        return QueryOutcome::Rejected(shared::Error::Forbidden(origin.clone()));
    }

    if let Err(e) = state.config.validate() {
        error!("Missing required configuration: {}", e);
        return QueryOutcome::Rejected(e);
    }

    let validated = match validate_body(event.body().as_ref()) {
        Ok(validated) => validated,
        Err(e) => {
            warn!("Rejected query request: {}", e);
            return QueryOutcome::Rejected(e);
        }
    };

    if validated.session_generated {
        info!(session_id = %validated.session_id, "Generated new session ID");
    }

    if let Some(remaining) = remaining_time(event) {
        if remaining < state.config.min_remaining_time {
            let remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
            warn!("Low remaining time: {}ms", remaining_ms);
            return QueryOutcome::Rejected(shared::Error::Timeout(remaining_ms));
        }
    }

    match state
        .agent
        .invoke(&validated.query, &validated.session_id)
        .await
    {
        Ok(reply) => QueryOutcome::Answered {
            reply,
            session_id: validated.session_id,
        },
        Err(e) => {
            error!(code = %e.code, message = %e.message, "Bedrock agent error");
            QueryOutcome::Recovered {
                message: classify(&e),
                session_id: validated.session_id,
            }
        }
    }
}

fn render(
    outcome: QueryOutcome,
    headers: &ResponseHeaders,
    request_id: Option<String>,
) -> Result<Response<Body>, Error> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    match outcome {
        QueryOutcome::Answered { reply, session_id } => {
            info!(
                response_length = reply.text.chars().count(),
                chunk_count = reply.chunk_count,
                truncated = reply.truncated,
                "Successfully processed query"
            );
            let body = QueryResponse {
                response: reply.text,
                session_id,
                timestamp,
                request_id,
            };
            json_response(200, headers, &body)
        }
        QueryOutcome::Recovered {
            message,
            session_id,
        } => {
            info!(
                response_length = message.chars().count(),
                "Returned fallback reply for agent failure"
            );
            let body = QueryResponse {
                response: message.to_string(),
                session_id,
                timestamp,
                request_id,
            };
            json_response(200, headers, &body)
        }
        QueryOutcome::Rejected(e) => error_response(&e, headers),
    }
}

async fn handler<A: AgentBackend>(
    state: Arc<AppState<A>>,
    event: Request,
) -> Result<Response<Body>, Error> {
    // Headers first, so every response below carries them
    let decision = OriginDecision::from_headers(event.headers(), &state.config.allowed_origins);
    let headers = build_headers(&decision, &state.config.allowed_origins, ALLOWED_METHODS);

    let request_id = event.lambda_context_ref().map(|ctx| ctx.request_id.clone());
    info!(
        request_id = request_id.as_deref().unwrap_or("unknown"),
        method = %event.method(),
        "Lambda invocation"
    );

    if event.method() == Method::OPTIONS {
        info!("Answering CORS preflight");
        return empty_response(&headers);
    }

    let outcome = process(&state, &event, &decision).await;
    render(outcome, &headers, request_id).or_else(|e| {
        error!("Unexpected error in handler: {}", e);
        error_response(&shared::Error::Internal(e.to_string()), &headers)
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    let agent = BedrockAgentClient::from_config(&config).await;
    let state = Arc::new(AppState { config, agent });

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
