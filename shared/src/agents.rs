//! Bedrock agent client and bounded aggregation of its streamed reply.

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;

use aws_sdk_bedrockagentruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use aws_sdk_bedrockagentruntime::Client as BedrockAgentRuntimeClient;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Config;

/// Appended to replies cut short by either stream bound.
pub const TRUNCATION_NOTICE: &str = "\n\n[Response truncated due to length]";

/// Returned when the agent streams nothing but whitespace.
pub const EMPTY_REPLY_FALLBACK: &str = "I apologize, but I couldn't generate a response. \
Please try rephrasing your question or check if the maintenance system is available.";

/// Service error code reported by the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    AccessDenied,
    Throttling,
    ResourceNotFound,
    Other(String),
}

impl ErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "ValidationException" => ErrorCode::Validation,
            "AccessDeniedException" => ErrorCode::AccessDenied,
            "ThrottlingException" => ErrorCode::Throttling,
            "ResourceNotFoundException" => ErrorCode::ResourceNotFound,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Validation => "ValidationException",
            ErrorCode::AccessDenied => "AccessDeniedException",
            ErrorCode::Throttling => "ThrottlingException",
            ErrorCode::ResourceNotFound => "ResourceNotFoundException",
            ErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure invoking the agent or reading its stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct AgentError {
    pub code: ErrorCode,
    pub message: String,
}

impl AgentError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Tag an SDK failure with its service error code.
    ///
    /// Transport failures carry no code and become `ErrorCode::Other("Unknown")`.
    pub fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: fmt::Debug,
    {
        let code = err
            .code()
            .map(ErrorCode::from_code)
            .unwrap_or_else(|| ErrorCode::Other("Unknown".to_string()));
        let message = match err.message() {
            Some(message) => message.to_string(),
            None => DisplayErrorContext(&err).to_string(),
        };
        Self { code, message }
    }
}

/// Bounds applied while consuming a reply stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLimits {
    /// Stream events consumed before giving up
    pub max_chunks: usize,
    /// Characters kept before truncating
    pub max_chars: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            max_chunks: 1000,
            max_chars: 50_000,
        }
    }
}

impl From<&Config> for StreamLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_chunks: config.max_response_chunks,
            max_chars: config.max_response_chars,
        }
    }
}

/// Assembled agent reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    /// Stream events consumed, including ignored trace events
    pub chunk_count: usize,
    pub truncated: bool,
}

/// Concatenates streamed chunks in arrival order under [`StreamLimits`].
#[derive(Debug)]
pub struct ResponseAccumulator {
    limits: StreamLimits,
    text: String,
    chars: usize,
    chunk_count: usize,
    truncated: bool,
}

impl ResponseAccumulator {
    pub fn new(limits: StreamLimits) -> Self {
        Self {
            limits,
            text: String::new(),
            chars: 0,
            chunk_count: 0,
            truncated: false,
        }
    }

    /// Consume one stream event. `payload` is `None` for events without
    /// text (traces and the like), which still count toward the chunk cap.
    ///
    /// Returns `Break` once a bound is hit; further events are ignored.
    pub fn push(&mut self, payload: Option<&[u8]>) -> Result<ControlFlow<()>, AgentError> {
        if self.truncated {
            return Ok(ControlFlow::Break(()));
        }
        if self.chunk_count >= self.limits.max_chunks {
            warn!(
                chunk_count = self.chunk_count,
                "Too many response chunks, truncating"
            );
            self.truncated = true;
            return Ok(ControlFlow::Break(()));
        }
        self.chunk_count += 1;

        let Some(bytes) = payload else {
            return Ok(ControlFlow::Continue(()));
        };
        let chunk = std::str::from_utf8(bytes).map_err(|e| {
            AgentError::new(
                ErrorCode::Other("InvalidChunkEncoding".to_string()),
                format!("chunk {} is not valid UTF-8: {}", self.chunk_count, e),
            )
        })?;

        let remaining = self.limits.max_chars - self.chars;
        let chunk_chars = chunk.chars().count();
        if chunk_chars <= remaining {
            self.text.push_str(chunk);
            self.chars += chunk_chars;
            return Ok(ControlFlow::Continue(()));
        }

        let cut = chunk
            .char_indices()
            .nth(remaining)
            .map_or(chunk.len(), |(idx, _)| idx);
        self.text.push_str(&chunk[..cut]);
        self.chars = self.limits.max_chars;
        self.truncated = true;
        warn!(
            max_chars = self.limits.max_chars,
            "Response too long, truncating"
        );
        Ok(ControlFlow::Break(()))
    }

    /// Consume one result of reading the reply stream. `Ok(None)` is the end
    /// of the stream; errors pass through untouched.
    pub fn receive(
        &mut self,
        received: Result<Option<ResponseStream>, AgentError>,
    ) -> Result<ControlFlow<()>, AgentError> {
        let Some(event) = received? else {
            return Ok(ControlFlow::Break(()));
        };
        let payload: Option<&[u8]> = match &event {
            ResponseStream::Chunk(part) => part.bytes().map(|blob| blob.as_ref()),
            other => {
                debug!("Ignoring stream event: {:?}", other);
                None
            }
        };
        self.push(payload)
    }

    /// Finish the reply: trim it, mark truncation, and substitute the
    /// fallback message for an empty reply.
    pub fn finish(self) -> AgentReply {
        let body = self.text.trim();
        let text = if body.is_empty() {
            warn!("Empty response from Bedrock Agent");
            EMPTY_REPLY_FALLBACK.to_string()
        } else if self.truncated {
            format!("{}{}", body, TRUNCATION_NOTICE)
        } else {
            body.to_string()
        };

        AgentReply {
            text,
            chunk_count: self.chunk_count,
            truncated: self.truncated,
        }
    }
}

/// Something that can answer a query within a conversation session.
pub trait AgentBackend: Send + Sync {
    fn invoke(
        &self,
        query: &str,
        session_id: &str,
    ) -> impl Future<Output = Result<AgentReply, AgentError>> + Send;
}

/// Client for the Bedrock agent runtime `InvokeAgent` API.
pub struct BedrockAgentClient {
    client: BedrockAgentRuntimeClient,
    agent_id: String,
    agent_alias_id: String,
    limits: StreamLimits,
}

impl BedrockAgentClient {
    /// Create a new agent client.
    pub fn new(client: BedrockAgentRuntimeClient, config: &Config) -> Self {
        Self {
            client,
            agent_id: config.agent_id.clone(),
            agent_alias_id: config.agent_alias_id.clone(),
            limits: StreamLimits::from(config),
        }
    }

    /// Build an SDK client for the configured region.
    pub async fn from_config(config: &Config) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;

        Self::new(BedrockAgentRuntimeClient::new(&sdk_config), config)
    }
}

impl AgentBackend for BedrockAgentClient {
    async fn invoke(&self, query: &str, session_id: &str) -> Result<AgentReply, AgentError> {
        info!(
            agent_id = %self.agent_id,
            agent_alias_id = %self.agent_alias_id,
            query_length = query.chars().count(),
            session_id,
            "Invoking Bedrock Agent"
        );

        let output = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.agent_alias_id)
            .session_id(session_id)
            .input_text(query)
            .send()
            .await
            .map_err(AgentError::from_sdk)?;

        let mut completion = output.completion;
        let mut accumulator = ResponseAccumulator::new(self.limits);

        loop {
            let received = completion.recv().await.map_err(AgentError::from_sdk);
            if accumulator.receive(received)?.is_break() {
                break;
            }
        }

        let reply = accumulator.finish();
        info!(
            response_length = reply.text.chars().count(),
            chunk_count = reply.chunk_count,
            "Agent response received"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_bedrockagentruntime::error::ErrorMetadata;
    use aws_sdk_bedrockagentruntime::operation::invoke_agent::InvokeAgentError;
    use aws_sdk_bedrockagentruntime::primitives::Blob;
    use aws_sdk_bedrockagentruntime::types::error::ResponseStreamError;
    use aws_sdk_bedrockagentruntime::types::PayloadPart;

    fn collect(chunks: &[&str], limits: StreamLimits) -> AgentReply {
        let mut accumulator = ResponseAccumulator::new(limits);
        for chunk in chunks {
            if accumulator.push(Some(chunk.as_bytes())).unwrap().is_break() {
                break;
            }
        }
        accumulator.finish()
    }

    #[test]
    fn test_concatenates_in_order() {
        let reply = collect(&["Hello, ", "world!"], StreamLimits::default());
        assert_eq!(reply.text, "Hello, world!");
        assert_eq!(reply.chunk_count, 2);
        assert!(!reply.truncated);
    }

    #[test]
    fn test_trims_reply() {
        let reply = collect(&["\n  Replace the ", "filter.  \n"], StreamLimits::default());
        assert_eq!(reply.text, "Replace the filter.");
    }

    #[test]
    fn test_empty_reply_uses_fallback() {
        let reply = collect(&[" ", "\n"], StreamLimits::default());
        assert_eq!(reply.text, EMPTY_REPLY_FALLBACK);
        assert_eq!(collect(&[], StreamLimits::default()).text, EMPTY_REPLY_FALLBACK);
    }

    #[test]
    fn test_char_cap_truncates_exactly() {
        let limits = StreamLimits {
            max_chunks: 1000,
            max_chars: 10,
        };
        let reply = collect(&["ééééé", "ééééé", "x"], limits);
        assert!(reply.truncated);
        assert_eq!(reply.text, format!("{}{}", "é".repeat(10), TRUNCATION_NOTICE));

        let reply = collect(&["abcdefgh", "ijklmnop"], limits);
        assert_eq!(reply.text, format!("abcdefghij{}", TRUNCATION_NOTICE));
        assert!(reply.text.chars().count() <= 10 + TRUNCATION_NOTICE.chars().count());
    }

    #[test]
    fn test_exactly_at_char_cap_is_not_truncated() {
        let limits = StreamLimits {
            max_chunks: 1000,
            max_chars: 4,
        };
        let reply = collect(&["ab", "cd"], limits);
        assert_eq!(reply.text, "abcd");
        assert!(!reply.truncated);
    }

    #[test]
    fn test_chunk_cap_stops_consuming() {
        let limits = StreamLimits {
            max_chunks: 3,
            max_chars: 50_000,
        };
        let reply = collect(&["a", "b", "c", "d", "e"], limits);
        assert!(reply.truncated);
        assert_eq!(reply.chunk_count, 3);
        assert_eq!(reply.text, format!("abc{}", TRUNCATION_NOTICE));
    }

    #[test]
    fn test_trace_events_count_toward_cap() {
        let mut accumulator = ResponseAccumulator::new(StreamLimits {
            max_chunks: 2,
            max_chars: 100,
        });
        assert!(accumulator.push(None).unwrap().is_continue());
        assert!(accumulator.push(Some(&b"ok"[..])).unwrap().is_continue());
        assert!(accumulator.push(Some(&b"dropped"[..])).unwrap().is_break());
        let reply = accumulator.finish();
        assert_eq!(reply.text, format!("ok{}", TRUNCATION_NOTICE));
    }

    #[test]
    fn test_invalid_utf8_is_an_agent_error() {
        let mut accumulator = ResponseAccumulator::new(StreamLimits::default());
        let err = accumulator.push(Some(&[0xff_u8, 0xfe][..])).unwrap_err();
        assert_eq!(err.code, ErrorCode::Other("InvalidChunkEncoding".to_string()));
    }

    fn chunk(text: &str) -> ResponseStream {
        ResponseStream::Chunk(PayloadPart::builder().bytes(Blob::new(text.as_bytes())).build())
    }

    fn replay(
        events: Vec<Result<Option<ResponseStream>, AgentError>>,
        limits: StreamLimits,
    ) -> Result<AgentReply, AgentError> {
        let mut accumulator = ResponseAccumulator::new(limits);
        for received in events {
            if accumulator.receive(received)?.is_break() {
                break;
            }
        }
        Ok(accumulator.finish())
    }

    #[test]
    fn test_stream_events_are_concatenated() {
        let reply = replay(
            vec![
                Ok(Some(chunk("Hello, "))),
                Ok(Some(ResponseStream::Chunk(PayloadPart::builder().build()))),
                Ok(Some(chunk("world!"))),
                Ok(None),
                Ok(Some(chunk(" never read"))),
            ],
            StreamLimits::default(),
        )
        .unwrap();
        assert_eq!(reply.text, "Hello, world!");
        assert_eq!(reply.chunk_count, 3);
    }

    #[test]
    fn test_stream_error_is_propagated() {
        let stream_error = SdkError::<ResponseStreamError, ()>::service_error(
            ResponseStreamError::generic(
                ErrorMetadata::builder()
                    .code("ThrottlingException")
                    .message("Rate exceeded")
                    .build(),
            ),
            (),
        );
        let err = replay(
            vec![Ok(Some(chunk("partial"))), Err(AgentError::from_sdk(stream_error))],
            StreamLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Throttling);
        assert_eq!(err.message, "Rate exceeded");
    }

    #[test]
    fn test_service_error_code_is_kept() {
        let err = SdkError::<InvokeAgentError, ()>::service_error(
            InvokeAgentError::generic(
                ErrorMetadata::builder()
                    .code("AccessDeniedException")
                    .message("not authorized to perform bedrock:InvokeAgent")
                    .build(),
            ),
            (),
        );
        let err = AgentError::from_sdk(err);
        assert_eq!(err.code, ErrorCode::AccessDenied);
        assert!(err.message.contains("bedrock:InvokeAgent"));
    }

    #[test]
    fn test_transport_errors_have_unknown_code() {
        let timeout = SdkError::<InvokeAgentError, ()>::timeout_error("deadline elapsed");
        let err = AgentError::from_sdk(timeout);
        assert_eq!(err.code, ErrorCode::Other("Unknown".to_string()));
        assert!(err.message.contains("deadline elapsed"));

        let construction =
            SdkError::<InvokeAgentError, ()>::construction_failure("missing agent id");
        let err = AgentError::from_sdk(construction);
        assert_eq!(err.code, ErrorCode::Other("Unknown".to_string()));
        assert!(err.message.contains("missing agent id"));
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ErrorCode::from_code("ThrottlingException"), ErrorCode::Throttling);
        assert_eq!(
            ErrorCode::from_code("DependencyFailedException"),
            ErrorCode::Other("DependencyFailedException".to_string())
        );
        assert_eq!(ErrorCode::AccessDenied.to_string(), "AccessDeniedException");
    }
}
