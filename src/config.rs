//! Environment-driven configuration
//!
//! Providers are constructed once at startup from whichever credentials
//! are present; nothing is probed lazily mid-turn.

use std::time::Duration;

/// Default response language
const DEFAULT_LANGUAGE: &str = "id";

/// Default per-request LLM timeout
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default conversation window (messages, i.e. 10 exchanges)
const DEFAULT_HISTORY_MESSAGES: usize = 20;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API keys for external services
    pub api_keys: ApiKeys,
    /// Text generation settings
    pub generation: GenerationConfig,
    /// Voice output settings
    pub voice: VoiceConfig,
    /// Conversation window in messages
    pub history_messages: usize,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Groq (chat completions + whisper transcription)
    pub groq: Option<String>,
    /// `OpenAI` (chat fallback + TTS)
    pub openai: Option<String>,
    /// ElevenLabs (TTS fallback)
    pub elevenlabs: Option<String>,
}

/// Text generation settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Model override for the primary generator
    pub model: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }
}

/// Voice output settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Response language passed to synthesizers
    pub language: String,
    /// TTS voice identifier (`OpenAI`-style synthesizers)
    pub tts_voice: String,
    /// TTS speed multiplier
    pub tts_speed: f32,
    /// ElevenLabs voice id
    pub elevenlabs_voice: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            elevenlabs_voice: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: ApiKeys::default(),
            generation: GenerationConfig::default(),
            voice: VoiceConfig::default(),
            history_messages: DEFAULT_HISTORY_MESSAGES,
        }
    }
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Provider keys come from `GROQ_API_KEY`, `OPENAI_API_KEY`, and
    /// `ELEVENLABS_API_KEY`; tunables from `LYRA_*` variables. Missing
    /// values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.api_keys.groq = env_opt("GROQ_API_KEY");
        config.api_keys.openai = env_opt("OPENAI_API_KEY");
        config.api_keys.elevenlabs = env_opt("ELEVENLABS_API_KEY");

        config.generation.model = env_opt("LYRA_MODEL");
        if let Some(secs) = env_opt("LYRA_LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.generation.timeout = Duration::from_secs(secs);
        }

        if let Some(language) = env_opt("LYRA_LANGUAGE") {
            config.voice.language = language;
        }
        if let Some(voice) = env_opt("LYRA_TTS_VOICE") {
            config.voice.tts_voice = voice;
        }
        if let Some(speed) = env_opt("LYRA_TTS_SPEED").and_then(|v| v.parse().ok()) {
            config.voice.tts_speed = speed;
        }
        config.voice.elevenlabs_voice = env_opt("ELEVENLABS_VOICE_ID");

        if let Some(messages) = env_opt("LYRA_HISTORY_MESSAGES").and_then(|v| v.parse().ok()) {
            config.history_messages = messages;
        }

        config
    }
}

/// Non-empty environment variable
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
