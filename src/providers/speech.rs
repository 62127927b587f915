//! Text-to-speech providers (HTTP, MP3 out)

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{Provider, Synthesizer, classify_status, retry_after_seconds, wire_error};
use crate::error::{Error, Result};

/// Default per-request timeout for synthesis
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Synthesizer over the `OpenAI` speech endpoint
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    timeout: Duration,
}

impl OpenAiSynthesizer {
    /// New synthesizer with the given voice and speed
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(api_key: String, voice: String, speed: f32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model: "tts-1".to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Provider for OpenAiSynthesizer {
    fn name(&self) -> &str {
        "openai_tts"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    // Voice models are multilingual; the language hint is not needed on
    // this wire.
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| wire_error(self.name(), self.timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &body, retry_after));
        }

        let audio = response.bytes().await?;
        tracing::debug!(provider = self.name(), bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}

/// Synthesizer over the ElevenLabs text-to-speech endpoint
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    model: String,
    timeout: Duration,
}

impl ElevenLabsSynthesizer {
    /// New synthesizer for the given voice id
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(api_key: String, voice_id: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id,
            model: "eleven_multilingual_v2".to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Provider for ElevenLabsSynthesizer {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| wire_error(self.name(), self.timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &body, retry_after));
        }

        let audio = response.bytes().await?;
        tracing::debug!(provider = self.name(), bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
