//! Mock providers and collaborators for pipeline tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lyra_pipeline::audio::Playback;
use lyra_pipeline::providers::{EventStream, Provider};
use lyra_pipeline::{
    ChatMessage, Error, GenerationRequest, Generator, Result, StreamEvent, Synthesizer,
    ToolExecutor, ToolInvocation, Transcriber,
};

/// Generator that replays scripted event streams, one per call
pub struct ScriptedGenerator {
    name: String,
    scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
    /// Context snapshot captured at each stream open
    pub contexts: Mutex<Vec<Vec<ChatMessage>>>,
    /// Number of streams opened
    pub stream_calls: AtomicUsize,
    blocking_reply: Option<String>,
}

impl ScriptedGenerator {
    pub fn new(name: &str, scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            name: name.to_string(),
            scripts: Mutex::new(scripts.into()),
            contexts: Mutex::new(Vec::new()),
            stream_calls: AtomicUsize::new(0),
            blocking_reply: None,
        }
    }

    pub fn with_blocking_reply(mut self, reply: &str) -> Self {
        self.blocking_reply = Some(reply.to_string());
        self
    }

    pub fn streams_opened(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        self.blocking_reply
            .clone()
            .ok_or_else(|| Error::Provider {
                provider: self.name.clone(),
                message: "no blocking reply scripted".to_string(),
            })
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(request.context.clone());

        let events = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(
            events.into_iter().map(Ok::<_, Error>),
        )))
    }
}

/// Generator whose every call fails with a rate limit
pub struct RateLimitedGenerator {
    name: String,
    pub calls: AtomicUsize,
}

impl RateLimitedGenerator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn failure(&self) -> Error {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Error::RateLimited {
            provider: self.name.clone(),
            retry_after: None,
        }
    }
}

#[async_trait]
impl Provider for RateLimitedGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        false
    }
}

#[async_trait]
impl Generator for RateLimitedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(self.failure())
    }

    async fn generate_stream(&self, _request: &GenerationRequest) -> Result<EventStream> {
        Err(self.failure())
    }
}

/// Generator whose stream opens always fail but whose blocking call works
pub struct BlockingOnlyGenerator {
    name: String,
    reply: String,
}

impl BlockingOnlyGenerator {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl Provider for BlockingOnlyGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl Generator for BlockingOnlyGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Ok(self.reply.clone())
    }

    async fn generate_stream(&self, _request: &GenerationRequest) -> Result<EventStream> {
        Err(Error::Provider {
            provider: self.name.clone(),
            message: "streaming unsupported".to_string(),
        })
    }
}

/// Generator that asks for a tool call on every stream
pub struct ToolLoopGenerator {
    name: String,
}

impl ToolLoopGenerator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Provider for ToolLoopGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl Generator for ToolLoopGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Ok("Jawaban dari jalur cadangan.".to_string())
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<EventStream> {
        let round = request
            .context
            .iter()
            .filter(|m| m.tool_calls.is_some())
            .count();
        let events = vec![
            StreamEvent::Text("Sebentar, saya periksa dulu. ".to_string()),
            StreamEvent::FunctionCall(ToolInvocation {
                id: format!("call_{round}"),
                name: "get_current_time".to_string(),
                arguments: serde_json::json!({}),
            }),
        ];
        Ok(Box::pin(futures::stream::iter(
            events.into_iter().map(Ok::<_, Error>),
        )))
    }
}

/// Synthesizer returning the sentence bytes after an artificial delay
pub struct MockSynthesizer {
    name: String,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Provider for MockSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(text.as_bytes().to_vec())
    }
}

/// Synthesizer whose every call fails
pub struct FailingSynthesizer {
    name: String,
    pub calls: AtomicUsize,
}

impl FailingSynthesizer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Provider for FailingSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        false
    }
}

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Provider {
            provider: self.name.clone(),
            message: "synthesis backend down".to_string(),
        })
    }
}

/// Playback that records what it played, with an artificial delay
pub struct RecordingPlayback {
    delay: Duration,
    pub played: Mutex<Vec<String>>,
}

impl RecordingPlayback {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl Playback for RecordingPlayback {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.played
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(audio).to_string());
        Ok(())
    }
}

/// Tool executor counting invocations and replying with a fixed string
pub struct CountingExecutor {
    reply: String,
    pub calls: AtomicUsize,
}

impl CountingExecutor {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for CountingExecutor {
    async fn execute(&self, _name: &str, _arguments: &serde_json::Value) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Transcriber with a fixed transcript, or a scripted failure
pub struct MockTranscriber {
    name: String,
    transcript: Option<String>,
}

impl MockTranscriber {
    pub fn new(name: &str, transcript: &str) -> Self {
        Self {
            name: name.to_string(),
            transcript: Some(transcript.to_string()),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transcript: None,
        }
    }
}

#[async_trait]
impl Provider for MockTranscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.transcript.is_some()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        self.transcript.clone().ok_or_else(|| Error::Timeout {
            provider: self.name.clone(),
            seconds: 20.0,
        })
    }
}
