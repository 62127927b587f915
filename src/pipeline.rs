//! Per-turn pipeline orchestration
//!
//! One turn in, one spoken response out. The streaming path (generation
//! stream → segmenter → tool interceptor → audio queue) is tried first;
//! on failure or empty output a blocking generate-then-speak fallback
//! runs. A turn never raises: provider exhaustion and unexpected errors
//! both map to fixed apology strings so the next turn stays usable.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::audio::{NullPlayback, Playback, SpeechPipeline};
use crate::config::Config;
use crate::context::ContextProvider;
use crate::conversation::{Conversation, InMemoryConversation};
use crate::error::{Error, Result};
use crate::interceptor::sentence_stream;
use crate::providers::{
    Capability, ChatGenerator, ChatMessage, ElevenLabsSynthesizer, GenerationRequest, Generator,
    OpenAiSynthesizer, Router, Synthesizer, Transcriber, WhisperTranscriber,
};
use crate::tools::{ToolExecutor, ToolRegistry, ToolSpec};

/// Fixed reply when every generation or transcription provider is exhausted
pub const BUSY_MESSAGE: &str = "Semua layanan sedang sibuk, coba lagi sebentar.";

/// Fixed reply for any other turn failure
pub const ERROR_MESSAGE: &str = "Terjadi kesalahan, tapi saya masih berjalan.";

/// Outcome of one turn
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The assistant's response text (possibly an apology string)
    pub text: String,
    /// Wall-clock duration of the turn
    pub elapsed: Duration,
}

/// Coordinates one turn end to end
pub struct Pipeline {
    transcription: Option<Arc<Router<dyn Transcriber>>>,
    generation: Arc<Router<dyn Generator>>,
    synthesis: Arc<Router<dyn Synthesizer>>,
    speech: SpeechPipeline,
    tools: Arc<dyn ToolExecutor>,
    tool_specs: Vec<ToolSpec>,
    conversation: Arc<dyn Conversation>,
    context_providers: Vec<Arc<dyn ContextProvider>>,
    turns: AtomicU64,
}

impl Pipeline {
    /// Builder with no providers configured
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Process one text turn. Never errors; failures become fixed
    /// apology strings.
    pub async fn handle_turn(&self, input: &str) -> PipelineResult {
        let turn = self.turns.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();

        let text = match self.respond(input).await {
            Ok(text) => {
                self.conversation.add_exchange(input, &text).await;
                text
            }
            Err(Error::AllProvidersFailed {
                capability,
                failures,
            }) => {
                tracing::error!(turn, %capability, providers = failures.len(), "all providers failed");
                BUSY_MESSAGE.to_string()
            }
            Err(e) => {
                tracing::error!(turn, error = %e, "turn failed");
                ERROR_MESSAGE.to_string()
            }
        };

        let elapsed = start.elapsed();
        tracing::info!(turn, ?elapsed, chars = text.len(), "turn complete");
        PipelineResult { text, elapsed }
    }

    /// Process one voice turn: transcribe, then run the text path.
    ///
    /// Returns `None` when the audio holds no usable speech.
    pub async fn handle_voice_turn(&self, audio: &[u8]) -> Option<PipelineResult> {
        let start = Instant::now();

        let Some(transcription) = self.transcription.as_ref() else {
            tracing::error!("no transcription providers configured");
            return Some(PipelineResult {
                text: ERROR_MESSAGE.to_string(),
                elapsed: start.elapsed(),
            });
        };

        let transcript = match transcription
            .execute(|provider| {
                let audio = audio.to_vec();
                async move { provider.transcribe(&audio).await }
            })
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                let text = match &e {
                    Error::AllProvidersFailed { .. } => BUSY_MESSAGE,
                    _ => ERROR_MESSAGE,
                };
                tracing::error!(error = %e, "transcription failed");
                return Some(PipelineResult {
                    text: text.to_string(),
                    elapsed: start.elapsed(),
                });
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::debug!("empty transcript, skipping turn");
            return None;
        }

        Some(self.handle_turn(transcript).await)
    }

    /// Speak a text without generation (announcements, reminders)
    pub async fn say(&self, text: &str) {
        if let Err(e) = self.speech.speak_text(text).await {
            tracing::error!(error = %e, "speech synthesis failed");
        }
    }

    /// Availability of every configured provider, keyed `CAP/name`
    pub async fn check_providers(&self) -> Vec<(String, bool)> {
        let mut report = Vec::new();

        if let Some(transcription) = self.transcription.as_ref() {
            for provider in transcription.providers() {
                let key = format!("{}/{}", Capability::Transcribe, provider.name());
                report.push((key, provider.is_available().await));
            }
        }
        for provider in self.generation.providers() {
            let key = format!("{}/{}", Capability::Generate, provider.name());
            report.push((key, provider.is_available().await));
        }
        for provider in self.synthesis.providers() {
            let key = format!("{}/{}", Capability::Synthesize, provider.name());
            report.push((key, provider.is_available().await));
        }

        report
    }

    async fn respond(&self, input: &str) -> Result<String> {
        let request = self.build_request(input).await;

        match self.respond_streaming(request.clone()).await {
            Ok(text) if !text.trim().is_empty() => return Ok(text),
            Ok(_) => {
                tracing::info!("streaming path produced no text, falling back");
            }
            Err(e) => {
                tracing::warn!(error = %e, "streaming path failed, falling back");
            }
        }

        self.respond_blocking(&request).await
    }

    /// Streaming path: generation stream → sentences → overlapped speech
    async fn respond_streaming(&self, request: GenerationRequest) -> Result<String> {
        let sentences = sentence_stream(
            Arc::clone(&self.generation),
            Arc::clone(&self.tools),
            request,
        );
        self.speech.speak_stream(sentences).await
    }

    /// Fallback path: one blocking generate call, then full-text speech
    async fn respond_blocking(&self, request: &GenerationRequest) -> Result<String> {
        let text = self
            .generation
            .execute(|provider| {
                let request = request.clone();
                async move { provider.generate(&request).await }
            })
            .await?;

        if let Err(e) = self.speech.speak_text(&text).await {
            // The text response is still delivered, just without audio.
            tracing::error!(error = %e, "speech synthesis failed");
        }
        Ok(text)
    }

    async fn build_request(&self, input: &str) -> GenerationRequest {
        let mut context = Vec::new();

        for provider in &self.context_providers {
            if let Some(block) = provider.context(input).await {
                tracing::debug!(provider = provider.name(), chars = block.len(), "injecting context");
                context.push(ChatMessage::system(block));
            }
        }
        context.extend(self.conversation.context().await);

        GenerationRequest {
            prompt: input.to_string(),
            context,
            tools: self.tool_specs.clone(),
        }
    }
}

/// Assembles a [`Pipeline`] from providers and collaborators
#[derive(Default)]
pub struct PipelineBuilder {
    transcribers: Vec<Arc<dyn Transcriber>>,
    generators: Vec<Arc<dyn Generator>>,
    synthesizers: Vec<Arc<dyn Synthesizer>>,
    playback: Option<Arc<dyn Playback>>,
    tools: Option<Arc<dyn ToolExecutor>>,
    tool_specs: Vec<ToolSpec>,
    conversation: Option<Arc<dyn Conversation>>,
    context_providers: Vec<Arc<dyn ContextProvider>>,
    language: Option<String>,
}

impl PipelineBuilder {
    /// Providers and collaborators wired from config credentials.
    ///
    /// Generation: Groq (primary), `OpenAI` (fallback). Transcription:
    /// Groq whisper. Synthesis: `OpenAI` (primary), ElevenLabs
    /// (fallback). Tools: the built-in registry.
    ///
    /// # Errors
    ///
    /// Returns an error when no generation or synthesis credentials are
    /// configured, or a provider rejects its key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::default().with_language(config.voice.language.clone());

        let registry = Arc::new(ToolRegistry::with_builtins());
        let specs = registry.specs();

        if let Some(key) = config.api_keys.groq.clone() {
            let mut generator =
                ChatGenerator::new(key.clone())?.with_executor(Arc::clone(&registry) as Arc<dyn ToolExecutor>);
            if let Some(model) = config.generation.model.clone() {
                generator = generator.with_model(model);
            }
            generator = generator.with_timeout(config.generation.timeout);
            builder = builder
                .add_generator(Arc::new(generator))
                .add_transcriber(Arc::new(WhisperTranscriber::new(key)?));
        }

        if let Some(key) = config.api_keys.openai.clone() {
            let generator = ChatGenerator::new(key.clone())?
                .with_name("openai")
                .with_base_url("https://api.openai.com/v1")
                .with_model("gpt-4o-mini")
                .with_timeout(config.generation.timeout)
                .with_executor(Arc::clone(&registry) as Arc<dyn ToolExecutor>);
            builder = builder.add_generator(Arc::new(generator));

            builder = builder.add_synthesizer(Arc::new(OpenAiSynthesizer::new(
                key,
                config.voice.tts_voice.clone(),
                config.voice.tts_speed,
            )?));
        }

        if let Some(key) = config.api_keys.elevenlabs.clone() {
            let voice = config
                .voice
                .elevenlabs_voice
                .clone()
                .unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".to_string());
            builder = builder.add_synthesizer(Arc::new(ElevenLabsSynthesizer::new(key, voice)?));
        }

        builder = builder
            .with_tools(registry, specs)
            .with_conversation(Arc::new(InMemoryConversation::new(config.history_messages)));

        Ok(builder)
    }

    /// Append a transcription provider (priority order)
    #[must_use]
    pub fn add_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcribers.push(transcriber);
        self
    }

    /// Append a generation provider (priority order)
    #[must_use]
    pub fn add_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generators.push(generator);
        self
    }

    /// Append a synthesis provider (priority order)
    #[must_use]
    pub fn add_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizers.push(synthesizer);
        self
    }

    /// Set the playback collaborator (defaults to [`NullPlayback`])
    #[must_use]
    pub fn with_playback(mut self, playback: Arc<dyn Playback>) -> Self {
        self.playback = Some(playback);
        self
    }

    /// Set the tool executor and the specs advertised to the backend
    #[must_use]
    pub fn with_tools(mut self, executor: Arc<dyn ToolExecutor>, specs: Vec<ToolSpec>) -> Self {
        self.tools = Some(executor);
        self.tool_specs = specs;
        self
    }

    /// Set the conversation collaborator (defaults to in-memory)
    #[must_use]
    pub fn with_conversation(mut self, conversation: Arc<dyn Conversation>) -> Self {
        self.conversation = Some(conversation);
        self
    }

    /// Append a context provider
    #[must_use]
    pub fn add_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_providers.push(provider);
        self
    }

    /// Set the response language (defaults to Indonesian)
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// Returns an error when no generation or no synthesis providers are
    /// configured.
    pub fn build(self) -> Result<Pipeline> {
        let generation = Arc::new(Router::new(Capability::Generate, self.generators)?);
        let synthesis = Arc::new(Router::new(Capability::Synthesize, self.synthesizers)?);
        let transcription = if self.transcribers.is_empty() {
            None
        } else {
            Some(Arc::new(Router::new(
                Capability::Transcribe,
                self.transcribers,
            )?))
        };

        let playback = self
            .playback
            .unwrap_or_else(|| Arc::new(NullPlayback) as Arc<dyn Playback>);
        let language = self.language.unwrap_or_else(|| "id".to_string());
        let speech = SpeechPipeline::new(Arc::clone(&synthesis), playback, language);

        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(ToolRegistry::new()) as Arc<dyn ToolExecutor>);
        let conversation = self
            .conversation
            .unwrap_or_else(|| Arc::new(InMemoryConversation::default()) as Arc<dyn Conversation>);

        tracing::info!(
            generators = generation.providers().len(),
            synthesizers = synthesis.providers().len(),
            transcribers = transcription.as_ref().map_or(0, |t| t.providers().len()),
            tools = self.tool_specs.len(),
            "pipeline assembled"
        );

        Ok(Pipeline {
            transcription,
            generation,
            synthesis,
            speech,
            tools,
            tool_specs: self.tool_specs,
            conversation,
            context_providers: self.context_providers,
            turns: AtomicU64::new(0),
        })
    }
}
