//! OpenAI-compatible chat generator (Groq wire by default)
//!
//! Blocking generation runs a bounded provider-internal tool loop;
//! streaming generation parses SSE chunks and assembles tool-call
//! deltas into function-call events for the interceptor.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{
    ChatMessage, EventStream, GenerationRequest, Generator, Provider, Role, StreamEvent,
    ToolInvocation, classify_status, retry_after_seconds, wire_error,
};
use crate::error::{Error, Result};
use crate::interceptor::run_tool;
use crate::tools::{ToolExecutor, ToolSpec};

/// Default chat completions endpoint (Groq, OpenAI-compatible)
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool round-trip bound inside one blocking generate call
const MAX_TOOL_ROUNDS: usize = 3;

/// System prompt framing the assistant for spoken output
const SYSTEM_PROMPT: &str = "You are Lyra, a personal voice assistant. \
Your responses are spoken aloud: plain text only, no markdown, no bullet \
points, no emoji. Keep responses under 80 words unless the user asks for \
detail. Detect the user's language (Indonesian or English) and respond in \
the same language. When the user asks you to perform an action, use the \
available tools immediately instead of describing what you would do.";

/// Chat generator over an OpenAI-compatible completions endpoint
pub struct ChatGenerator {
    client: reqwest::Client,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    executor: Option<Arc<dyn ToolExecutor>>,
}

impl ChatGenerator {
    /// Generator against the Groq endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for chat generation".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            name: "groq".to_string(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            executor: None,
        })
    }

    /// Override the provider name used in logs and failure records
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Point at a different OpenAI-compatible endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executor for the blocking tool loop. Without one, tool calls in
    /// blocking mode end the call with whatever text exists.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    async fn post_chat(&self, body: &WireRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| wire_error(&self.name, self.timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status, &body, retry_after));
        }
        Ok(response)
    }

    fn wire_request<'a>(
        &'a self,
        request: &'a GenerationRequest,
        messages: &'a [WireMessage],
        stream: bool,
    ) -> WireRequest<'a> {
        WireRequest {
            model: &self.model,
            messages,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(
                    request
                        .tools
                        .iter()
                        .map(|spec| WireTool {
                            kind: "function",
                            function: spec,
                        })
                        .collect(),
                )
            },
            stream,
            temperature: 0.3,
        }
    }
}

#[async_trait]
impl Provider for ChatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        matches!(response, Ok(r) if r.status().is_success())
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut messages = build_messages(request);

        for round in 0..=MAX_TOOL_ROUNDS {
            let body = self.wire_request(request, &messages, false);
            let response: WireResponse = self.post_chat(&body).await?.json().await?;

            let choice = response.choices.into_iter().next().ok_or_else(|| {
                Error::Provider {
                    provider: self.name.clone(),
                    message: "response had no choices".to_string(),
                }
            })?;

            let tool_calls = choice.message.tool_calls.unwrap_or_default();
            let wants_tools = choice.finish_reason.as_deref() == Some("tool_calls")
                && !tool_calls.is_empty();

            if !wants_tools || round == MAX_TOOL_ROUNDS {
                let text = choice.message.content.unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(Error::Provider {
                        provider: self.name.clone(),
                        message: "empty response".to_string(),
                    });
                }
                tracing::debug!(provider = %self.name, chars = text.len(), "generated response");
                return Ok(text);
            }

            let Some(executor) = self.executor.as_ref() else {
                return Err(Error::Provider {
                    provider: self.name.clone(),
                    message: "backend requested tools but no executor is configured".to_string(),
                });
            };

            messages.push(WireMessage {
                role: "assistant",
                content: choice.message.content,
                tool_calls: Some(
                    tool_calls
                        .iter()
                        .map(|tc| WireToolCall {
                            id: tc.id.clone(),
                            kind: "function",
                            function: WireFunction {
                                name: tc.function.name.clone(),
                                arguments: tc.function.arguments.clone(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            });

            for call in tool_calls {
                let invocation = ToolInvocation {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new())),
                };
                let outcome = run_tool(executor.as_ref(), &invocation).await;
                messages.push(WireMessage {
                    role: "tool",
                    content: Some(outcome),
                    tool_calls: None,
                    tool_call_id: Some(call.id),
                });
            }
        }

        Err(Error::Provider {
            provider: self.name.clone(),
            message: "tool loop ended without a response".to_string(),
        })
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        let messages = build_messages(request);
        let body = self.wire_request(request, &messages, true);
        let response = self.post_chat(&body).await?;
        let provider = self.name.clone();

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut line_buf = String::new();
            let mut pending: Vec<PendingToolCall> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| Error::Provider {
                    provider: provider.clone(),
                    message: format!("stream read failed: {e}"),
                })?;
                line_buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = line_buf.find('\n') {
                    let line = line_buf[..pos].trim().to_string();
                    line_buf.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }

                    let delta: WireStreamChunk = serde_json::from_str(data)?;
                    for choice in delta.choices {
                        if let Some(text) = choice.delta.content
                            && !text.is_empty()
                        {
                            yield StreamEvent::Text(text);
                        }

                        for tc in choice.delta.tool_calls.unwrap_or_default() {
                            if tc.index >= pending.len() {
                                pending.resize_with(tc.index + 1, PendingToolCall::default);
                            }
                            let slot = &mut pending[tc.index];
                            if let Some(id) = tc.id {
                                slot.id = id;
                            }
                            if let Some(function) = tc.function {
                                if let Some(name) = function.name {
                                    slot.name = name;
                                }
                                if let Some(arguments) = function.arguments {
                                    slot.arguments.push_str(&arguments);
                                }
                            }
                        }

                        if choice.finish_reason.as_deref() == Some("tool_calls") {
                            for call in pending.drain(..) {
                                yield StreamEvent::FunctionCall(ToolInvocation {
                                    id: call.id,
                                    name: call.name,
                                    arguments: serde_json::from_str(&call.arguments)
                                        .unwrap_or_else(|_| {
                                            serde_json::Value::Object(serde_json::Map::new())
                                        }),
                                });
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Build the wire message list: system prompt, context, current prompt
fn build_messages(request: &GenerationRequest) -> Vec<WireMessage> {
    let mut messages = vec![WireMessage {
        role: "system",
        content: Some(SYSTEM_PROMPT.to_string()),
        tool_calls: None,
        tool_call_id: None,
    }];

    for message in &request.context {
        messages.push(wire_message(message));
    }

    messages.push(WireMessage {
        role: "user",
        content: Some(request.prompt.clone()),
        tool_calls: None,
        tool_call_id: None,
    });

    messages
}

fn wire_message(message: &ChatMessage) -> WireMessage {
    WireMessage {
        role: match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        },
        content: if message.content.is_empty() && message.tool_calls.is_some() {
            None
        } else {
            Some(message.content.clone())
        },
        tool_calls: message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function",
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect()
        }),
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// In-progress tool call assembled from streaming deltas
#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

// -- wire types ---------------------------------------------------------------

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    stream: bool,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireDeltaToolCall>>,
}

#[derive(Deserialize)]
struct WireDeltaToolCall {
    index: usize,
    id: Option<String>,
    function: Option<WireDeltaFunction>,
}

#[derive(Deserialize)]
struct WireDeltaFunction {
    name: Option<String>,
    arguments: Option<String>,
}
