//! OpenAI-compatible streaming provider.
//!
//! Works with: Gemini (OpenAI endpoint), OpenAI, OpenRouter, Ollama, and any
//! endpoint that speaks `/chat/completions` with `stream: true`.
//!
//! The provider forwards raw deltas. Tool-call fragments leave here exactly
//! as the wire delivered them, tagged by index.

use async_trait::async_trait;
use ferrule_core::error::ProviderError;
use ferrule_core::message::{Message, Role};
use ferrule_core::provider::{
    ChunkReceiver, CompletionRequest, Provider, StreamChunk, ToolCallDelta, Usage,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Google Gemini through its OpenAI-compatible endpoint.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key,
        )
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Project history to the wire form: role, content and tool linkage.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Vec<ApiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect();

                // An assistant turn that only calls tools carries null content
                let content = if m.role == Role::Assistant
                    && m.content.is_empty()
                    && !tool_calls.is_empty()
                {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: m.role.as_str().to_string(),
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Build the JSON request body. `tools: None` leaves the key out.
    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": true,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(ref tools) = request.tools {
            body["tools"] = serde_json::json!(tools);
        }

        body
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Reader task: turns the SSE byte stream into chunks until [DONE],
        // transport end, or the receiver going away.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        SseEvent::Skip => {}
                        SseEvent::Done => return,
                        SseEvent::Malformed(error) => {
                            warn!(provider = %provider_name, error = %error, "Unparseable SSE chunk");
                            let _ = tx.send(Err(ProviderError::MalformedResponse(error))).await;
                            return;
                        }
                        SseEvent::Chunk(chunk) => {
                            if let Some(ref usage) = chunk.usage {
                                debug!(
                                    provider = %provider_name,
                                    prompt_tokens = usage.prompt_tokens,
                                    completion_tokens = usage.completion_tokens,
                                    "Stream usage"
                                );
                            }
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                    }
                }
            }

            // Transport ended without [DONE]; flush a trailing unterminated line
            if let Some(line) = lines.finish() {
                match parse_sse_line(&line) {
                    SseEvent::Chunk(chunk) => {
                        let _ = tx.send(Ok(chunk)).await;
                    }
                    SseEvent::Malformed(error) => {
                        let _ = tx.send(Err(ProviderError::MalformedResponse(error))).await;
                    }
                    SseEvent::Skip | SseEvent::Done => {}
                }
            }
        });

        Ok(rx)
    }
}

/// Splits a byte stream into complete lines, keeping the partial tail.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    fn finish(self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[derive(Debug)]
enum SseEvent {
    /// Blank line, comment, or non-data field
    Skip,
    /// `data: [DONE]`
    Done,
    Chunk(StreamChunk),
    Malformed(String),
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();

    if data.is_empty() {
        return SseEvent::Skip;
    }
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => SseEvent::Chunk(resp.into_chunk()),
        Err(e) => SseEvent::Malformed(e.to_string()),
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// A single SSE `data: {...}` payload.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl StreamResponse {
    fn into_chunk(self) -> StreamChunk {
        let mut chunk = StreamChunk {
            usage: self.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            ..StreamChunk::default()
        };

        if let Some(choice) = self.choices.into_iter().next() {
            chunk.content = choice.delta.content.filter(|c| !c.is_empty());
            chunk.tool_calls = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = match tc.function {
                        Some(f) => (f.name, f.arguments),
                        None => (None, None),
                    };
                    ToolCallDelta {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                    }
                })
                .collect();
        }

        chunk
    }
}
