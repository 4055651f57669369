//! OpenAI Chat Completions client.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ConciergeError, Result};
use crate::types::{CompletionDelta, CompletionResponse, FinishReason, StoredToolCall, ToolCallFragment};
use crate::util::retry::RetryPolicy;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{CompletionClient, CompletionRequest, DeltaStream};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used when opening a request.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Result<serde_json::Value> {
        let mut body = serde_json::Map::new();
        body.insert("model".into(), request.model.clone().into());
        body.insert("messages".into(), serde_json::to_value(&request.messages)?);
        body.insert("stream".into(), stream.into());
        request.settings.apply_to(&mut body);

        if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
            let tool_defs: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
            body.insert("tool_choice".into(), "auto".into());
        }

        Ok(serde_json::Value::Object(body))
    }

    /// POST the body, retrying transient failures until a success status arrives.
    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        self.retry
            .execute(|| {
                let pending = shared_client()
                    .post(&url)
                    .headers(bearer_headers(&self.api_key))
                    .json(body)
                    .send();
                async move {
                    let resp = pending.await?;
                    let status = resp.status().as_u16();
                    if !resp.status().is_success() {
                        let body_text = resp.text().await.unwrap_or_default();
                        return Err(status_to_error(status, &body_text));
                    }
                    Ok(resp)
                }
            })
            .await
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request_body(request, false)?;
        debug!(model = %request.model, messages = request.messages.len(), "OpenAI complete");

        let resp = self.send(&body).await?;
        let data: OpenAiChatResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ConciergeError::Upstream("no choices in completion response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| StoredToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
                kind: tc.kind,
            })
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<DeltaStream> {
        let body = self.build_request_body(request, true)?;
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "OpenAI stream"
        );

        let resp = self.send(&body).await?;
        Ok(decode_sse(resp.bytes_stream()))
    }
}

/// Split an SSE byte stream into lines and parse each complete line into a delta.
///
/// Lines are buffered as bytes and decoded only once complete, so a multi-byte
/// character split across network chunks arrives intact.
fn decode_sse<S, B, E>(byte_stream: S) -> DeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ConciergeError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(byte_stream);

        loop {
            let chunk = match byte_stream.next().await {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                None => break,
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                match decode_line(&line[..line_end]).and_then(|line| parse_line(line.trim())) {
                    Ok(Some(delta)) => yield Ok(delta),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        // the final event may arrive without a trailing newline
        match decode_line(&buffer).and_then(|line| parse_line(line.trim())) {
            Ok(Some(delta)) => yield Ok(delta),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    };

    Box::pin(stream)
}

fn decode_line(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| ConciergeError::Stream(format!("stream line is not valid UTF-8: {e}")))
}

/// Turn one SSE line into a delta. Comments, blanks and `[DONE]` yield `None`.
fn parse_line(line: &str) -> Result<Option<CompletionDelta>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    let Some(data) = parse_sse_data(line) else {
        return Ok(None);
    };
    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(error = %e, "skipping unparseable stream chunk");
            return Ok(None);
        }
    };
    if let Some(err) = chunk.error {
        return Err(ConciergeError::Upstream(err.message));
    }
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let function = tc.function.unwrap_or_default();
            ToolCallFragment {
                index: tc.index,
                id: tc.id,
                name: function.name,
                arguments: function.arguments,
            }
        })
        .collect();

    Ok(Some(CompletionDelta {
        content: choice.delta.content,
        tool_calls,
        finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
    }))
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    s.parse().ok()
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    error: Option<OpenAiStreamError>,
}

#[derive(Deserialize)]
struct OpenAiStreamError {
    message: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize, Default)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
