//! Overlapped synthesis and playback
//!
//! A producer/consumer pair over a bounded queue: while sentence N
//! plays, sentence N+1 synthesizes. The queue holds at most
//! [`QUEUE_CAPACITY`] items, so synthesis never runs more than one
//! sentence ahead of playback.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::Playback;
use crate::error::{Error, Result};
use crate::providers::{Router, Synthesizer};
use crate::segment::split_sentences;

/// Queue capacity: at most one sentence of synthesis ahead of playback
pub const QUEUE_CAPACITY: usize = 2;

/// One queued unit of audio
enum AudioItem {
    /// Synthesized sentence audio
    Chunk(Vec<u8>),
    /// End of response
    Done,
}

/// Synthesis/playback coordinator for one pipeline instance
pub struct SpeechPipeline {
    synthesis: Arc<Router<dyn Synthesizer>>,
    playback: Arc<dyn Playback>,
    language: String,
}

impl SpeechPipeline {
    /// New coordinator speaking in `language`
    pub fn new(
        synthesis: Arc<Router<dyn Synthesizer>>,
        playback: Arc<dyn Playback>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            synthesis,
            playback,
            language: language.into(),
        }
    }

    /// Speak a known-complete text.
    ///
    /// Single-sentence responses bypass the queue (nothing to overlap);
    /// longer responses go through [`Self::speak_stream`].
    ///
    /// # Errors
    ///
    /// Returns an error only when the single-sentence synthesis call
    /// exhausts every provider; per-sentence failures on the queue path
    /// are logged and skipped.
    pub async fn speak_text(&self, text: &str) -> Result<Duration> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(Duration::ZERO);
        }

        let start = Instant::now();
        if let [sentence] = sentences.as_slice() {
            let audio = self.synthesize(sentence).await?;
            if let Err(e) = self.playback.play(&audio).await {
                tracing::warn!(error = %e, "playback failed");
            }
            return Ok(start.elapsed());
        }

        tracing::debug!(sentences = sentences.len(), chars = text.len(), "streaming synthesis");
        let stream = futures::stream::iter(sentences.into_iter().map(Ok::<_, Error>));
        self.speak_stream(stream).await?;
        Ok(start.elapsed())
    }

    /// Drive a sentence stream through the queue, synthesizing and
    /// playing each sentence in emission order. Returns the accumulated
    /// response text.
    ///
    /// # Errors
    ///
    /// Propagates an error item from the sentence source (the stream is
    /// abandoned and the queue drained). Synthesis and playback failures
    /// are logged, never propagated.
    pub async fn speak_stream<S>(&self, sentences: S) -> Result<String>
    where
        S: Stream<Item = Result<String>> + Send,
    {
        let (tx, mut rx) = mpsc::channel::<AudioItem>(QUEUE_CAPACITY);
        let start = Instant::now();

        let producer = async {
            futures::pin_mut!(sentences);
            let mut spoken: Vec<String> = Vec::new();
            let mut failure: Option<Error> = None;
            let mut first_audio: Option<Duration> = None;

            while let Some(item) = sentences.next().await {
                match item {
                    Ok(sentence) => {
                        spoken.push(sentence.clone());
                        match self.synthesize(&sentence).await {
                            Ok(audio) => {
                                if first_audio.is_none() {
                                    first_audio = Some(start.elapsed());
                                    tracing::debug!(
                                        elapsed = ?start.elapsed(),
                                        "first audio ready"
                                    );
                                }
                                if tx.send(AudioItem::Chunk(audio)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                // Skip this sentence, keep the response going.
                                tracing::warn!(
                                    error = %e,
                                    sentence = %truncate(&sentence),
                                    "synthesis failed, skipping sentence"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            let _ = tx.send(AudioItem::Done).await;
            (spoken, failure)
        };

        let consumer = async {
            loop {
                match rx.recv().await {
                    Some(AudioItem::Chunk(audio)) => {
                        if let Err(e) = self.playback.play(&audio).await {
                            tracing::warn!(error = %e, "playback failed");
                        }
                    }
                    Some(AudioItem::Done) | None => break,
                }
            }
        };

        // One cancellation unit: dropping this future drops both halves.
        let ((spoken, failure), ()) = tokio::join!(producer, consumer);

        if let Some(e) = failure {
            return Err(e);
        }
        tracing::debug!(
            sentences = spoken.len(),
            elapsed = ?start.elapsed(),
            "speech stream complete"
        );
        Ok(spoken.join(" "))
    }

    async fn synthesize(&self, sentence: &str) -> Result<Vec<u8>> {
        self.synthesis
            .execute(|provider| {
                let text = sentence.to_string();
                let language = self.language.clone();
                async move { provider.synthesize(&text, &language).await }
            })
            .await
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(50).collect()
}
