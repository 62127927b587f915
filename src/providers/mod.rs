//! Provider abstractions: capabilities, typed interfaces, wire helpers
//!
//! Each capability (transcribe / generate / synthesize) has its own
//! trait and an ordered provider list behind a [`Router`]. Concrete
//! providers are built once at startup from available credentials.

mod chat;
mod router;
mod speech;
mod whisper;

pub use chat::ChatGenerator;
pub use router::Router;
pub use speech::{ElevenLabsSynthesizer, OpenAiSynthesizer};
pub use whisper::WhisperTranscriber;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tools::ToolSpec;

/// Provider capability; one router per capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Speech to text
    Transcribe,
    /// Text generation
    Generate,
    /// Text to speech
    Synthesize,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcribe => write!(f, "STT"),
            Self::Generate => write!(f, "LLM"),
            Self::Synthesize => write!(f, "TTS"),
        }
    }
}

/// Surface shared by every provider
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique name within the provider's capability
    fn name(&self) -> &str;

    /// Check if this provider is configured and reachable
    async fn is_available(&self) -> bool;
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and injected context
    System,
    /// The human side of the dialogue
    User,
    /// The model side of the dialogue
    Assistant,
    /// A tool result answering an assistant tool call
    Tool,
}

/// A tool call recorded on an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Backend-assigned call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Raw JSON arguments
    pub arguments: String,
}

/// One message in a generation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,
    /// Message text
    pub content: String,
    /// Tool calls issued by an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Id of the tool call a [`Role::Tool`] message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message recording a tool call
    #[must_use]
    pub fn tool_call(invocation: &ToolInvocation) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(vec![ToolCallRecord {
                id: invocation.id.clone(),
                name: invocation.name.clone(),
                arguments: invocation.arguments.to_string(),
            }]),
            tool_call_id: None,
        }
    }

    /// Tool message answering the call with `call_id`
    pub fn tool_result(call_id: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool invocation requested by the generation backend.
///
/// Created on a function-call signal, consumed immediately, never
/// persisted.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Backend-assigned call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
}

/// Event from a generation stream
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Text tokens
    Text(String),
    /// The backend requests a tool invocation
    FunctionCall(ToolInvocation),
}

/// Lazy sequence of generation events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Inputs to one generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The user's current message
    pub prompt: String,
    /// Prior turns plus injected system context
    pub context: Vec<ChatMessage>,
    /// Tools the backend may call
    pub tools: Vec<ToolSpec>,
}

impl GenerationRequest {
    /// Request with an empty context and no tools
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: Vec::new(),
            tools: Vec::new(),
        }
    }

    /// Replace the context
    #[must_use]
    pub fn with_context(mut self, context: Vec<ChatMessage>) -> Self {
        self.context = context;
        self
    }

    /// Replace the tool list
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// Speech-to-text provider
#[async_trait]
pub trait Transcriber: Provider {
    /// Convert WAV audio bytes to text
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Text generation provider
#[async_trait]
pub trait Generator: Provider {
    /// One blocking completion. Providers with tool support run their
    /// own bounded tool-calling loop before returning final text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Open a streaming completion over the request context
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream>;
}

/// Text-to-speech provider
#[async_trait]
pub trait Synthesizer: Provider {
    /// Convert text to audio bytes (MP3)
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;
}

/// Map an HTTP error response to the matching failure classification
pub(crate) fn classify_status(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
    retry_after: Option<f64>,
) -> Error {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Error::RateLimited {
            provider: provider.to_string(),
            retry_after,
        };
    }
    if status == reqwest::StatusCode::REQUEST_TIMEOUT || status == reqwest::StatusCode::GATEWAY_TIMEOUT
    {
        return Error::Timeout {
            provider: provider.to_string(),
            seconds: retry_after.unwrap_or(0.0),
        };
    }
    Error::Provider {
        provider: provider.to_string(),
        message: format!("{status}: {body}"),
    }
}

/// Extract retry-after seconds from response headers, if present
pub(crate) fn retry_after_seconds(headers: &reqwest::header::HeaderMap) -> Option<f64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Map a transport-level reqwest error to the failure taxonomy
pub(crate) fn wire_error(provider: &str, timeout: std::time::Duration, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            provider: provider.to_string(),
            seconds: timeout.as_secs_f64(),
        }
    } else {
        Error::Provider {
            provider: provider.to_string(),
            message: format!("request failed: {err}"),
        }
    }
}
