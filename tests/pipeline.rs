//! Pipeline integration tests
//!
//! Exercises the full turn path with mock providers: streaming
//! generation, tool round-trips, synthesis/playback overlap, and the
//! fallback and apology behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use lyra_pipeline::audio::Playback;
use lyra_pipeline::interceptor::sentence_stream;
use lyra_pipeline::{
    BUSY_MESSAGE, Capability, Conversation, GenerationRequest, Generator, InMemoryConversation,
    Pipeline, PipelineBuilder, Role, Router, StreamEvent, ToolInvocation,
};

use common::{
    BlockingOnlyGenerator, CountingExecutor, FailingSynthesizer, MockSynthesizer, MockTranscriber,
    RateLimitedGenerator, RecordingPlayback, ScriptedGenerator, ToolLoopGenerator,
};

const THREE_SENTENCES: &str =
    "Kalimat pertama selesai. Kalimat kedua juga selesai. Kalimat ketiga menutup respons.";

fn text_events(text: &str) -> Vec<Vec<StreamEvent>> {
    vec![vec![StreamEvent::Text(text.to_string())]]
}

fn time_invocation(id: &str) -> ToolInvocation {
    ToolInvocation {
        id: id.to_string(),
        name: "get_current_time".to_string(),
        arguments: serde_json::json!({}),
    }
}

struct TestPipeline {
    pipeline: Pipeline,
    playback: Arc<RecordingPlayback>,
    conversation: Arc<InMemoryConversation>,
}

/// Pipeline over one generator with instant synthesis and playback
fn pipeline_with(
    generator: Arc<dyn Generator>,
    executor: Arc<CountingExecutor>,
) -> TestPipeline {
    let playback = Arc::new(RecordingPlayback::new(Duration::ZERO));
    let conversation = Arc::new(InMemoryConversation::default());

    let pipeline = PipelineBuilder::default()
        .add_generator(generator)
        .add_synthesizer(Arc::new(MockSynthesizer::new("tts", Duration::ZERO)))
        .with_playback(Arc::clone(&playback) as Arc<dyn Playback>)
        .with_tools(executor, Vec::new())
        .with_conversation(Arc::clone(&conversation) as Arc<dyn lyra_pipeline::Conversation>)
        .build()
        .unwrap();

    TestPipeline {
        pipeline,
        playback,
        conversation,
    }
}

// -- streaming path -----------------------------------------------------------

#[tokio::test]
async fn streaming_turn_speaks_sentences_in_order() {
    let generator = Arc::new(ScriptedGenerator::new("mock", text_events(THREE_SENTENCES)));
    let executor = Arc::new(CountingExecutor::new("unused"));
    let t = pipeline_with(generator, executor);

    let result = t.pipeline.handle_turn("ceritakan sesuatu").await;

    assert_eq!(result.text, THREE_SENTENCES);
    assert_eq!(
        t.playback.played(),
        vec![
            "Kalimat pertama selesai.",
            "Kalimat kedua juga selesai.",
            "Kalimat ketiga menutup respons.",
        ]
    );
}

#[tokio::test]
async fn successful_turn_appends_exchange() {
    let generator = Arc::new(ScriptedGenerator::new("mock", text_events(THREE_SENTENCES)));
    let executor = Arc::new(CountingExecutor::new("unused"));
    let t = pipeline_with(generator, executor);

    t.pipeline.handle_turn("halo").await;

    let context = t.conversation.context().await;
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].role, Role::User);
    assert_eq!(context[0].content, "halo");
    assert_eq!(context[1].role, Role::Assistant);
}

#[tokio::test(start_paused = true)]
async fn synthesis_overlaps_playback() {
    // Per-sentence synthesis 1s, playback 2s. Overlapped, three
    // sentences finish in Ts + 3*max(Ts, Tp) = 7s; serial would be 9s.
    let generator = Arc::new(ScriptedGenerator::new("mock", text_events(THREE_SENTENCES)));
    let playback = Arc::new(RecordingPlayback::new(Duration::from_secs(2)));

    let pipeline = PipelineBuilder::default()
        .add_generator(generator as Arc<dyn Generator>)
        .add_synthesizer(Arc::new(MockSynthesizer::new(
            "tts",
            Duration::from_secs(1),
        )))
        .with_playback(Arc::clone(&playback) as Arc<dyn Playback>)
        .build()
        .unwrap();

    let start = tokio::time::Instant::now();
    let result = pipeline.handle_turn("ceritakan sesuatu").await;
    let elapsed = start.elapsed();

    assert_eq!(result.text, THREE_SENTENCES);
    assert_eq!(playback.played().len(), 3);
    assert!(
        elapsed >= Duration::from_millis(6900),
        "finished too fast: {elapsed:?}"
    );
    assert!(
        elapsed <= Duration::from_millis(7500),
        "no overlap achieved: {elapsed:?}"
    );
}

// -- tool calls ---------------------------------------------------------------

#[tokio::test]
async fn tool_call_executes_and_resumes() {
    let generator = Arc::new(ScriptedGenerator::new(
        "mock",
        vec![
            vec![StreamEvent::FunctionCall(time_invocation("call_1"))],
            vec![StreamEvent::Text("Sekarang pukul 10:00.".to_string())],
        ],
    ));
    let executor = Arc::new(CountingExecutor::new("10:00"));
    let t = pipeline_with(Arc::clone(&generator) as Arc<dyn Generator>, Arc::clone(&executor));

    let result = t.pipeline.handle_turn("jam berapa?").await;

    assert!(result.text.contains("10:00"), "got: {}", result.text);
    assert_eq!(executor.call_count(), 1);
    assert_eq!(generator.streams_opened(), 2);

    // The resumed stream saw the folded (call, result) pair.
    let contexts = generator.contexts.lock().unwrap();
    let resumed = &contexts[1];
    assert!(resumed.iter().any(|m| m.tool_calls.is_some()));
    assert!(
        resumed
            .iter()
            .any(|m| m.role == Role::Tool && m.content == "10:00")
    );
}

#[tokio::test]
async fn tool_loop_cut_off_after_three_round_trips() {
    let generator = Arc::new(ToolLoopGenerator::new("loop"));
    let executor = Arc::new(CountingExecutor::new("10:00"));
    let t = pipeline_with(generator, Arc::clone(&executor));

    let result = t.pipeline.handle_turn("jam berapa?").await;

    assert_eq!(executor.call_count(), 3);
    assert!(!result.text.is_empty());
    assert!(result.text.contains("Sebentar, saya periksa dulu."));
    // One sentence per stream: three resumed rounds plus the final one.
    assert_eq!(t.playback.played().len(), 4);
}

#[tokio::test]
async fn partial_buffer_carries_across_tool_boundary() {
    let generator = Arc::new(ScriptedGenerator::new(
        "mock",
        vec![
            vec![
                StreamEvent::Text("Sebentar".to_string()),
                StreamEvent::FunctionCall(time_invocation("call_1")),
            ],
            vec![StreamEvent::Text(
                " ya. Sekarang pukul sepuluh malam.".to_string(),
            )],
        ],
    ));
    let router = Arc::new(
        Router::new(
            Capability::Generate,
            vec![Arc::clone(&generator) as Arc<dyn Generator>],
        )
        .unwrap(),
    );
    let executor = Arc::new(CountingExecutor::new("22:00"));

    let sentences: Vec<String> =
        sentence_stream(router, executor, GenerationRequest::new("jam berapa?"))
            .try_collect()
            .await
            .unwrap();

    assert_eq!(
        sentences,
        vec!["Sebentar ya.", "Sekarang pukul sepuluh malam."]
    );
}

// -- fallback and failure handling --------------------------------------------

#[tokio::test(start_paused = true)]
async fn fallback_answers_when_streaming_is_unsupported() {
    let generator = Arc::new(BlockingOnlyGenerator::new(
        "blocking",
        "Jawaban dari jalur cadangan.",
    ));
    let executor = Arc::new(CountingExecutor::new("unused"));
    let t = pipeline_with(generator, executor);

    let result = t.pipeline.handle_turn("halo").await;

    assert_eq!(result.text, "Jawaban dari jalur cadangan.");
    // Single sentence: synthesized and played directly, no queue.
    assert_eq!(t.playback.played(), vec!["Jawaban dari jalur cadangan."]);
    assert_eq!(t.conversation.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_generation_returns_busy_message() {
    let a = Arc::new(RateLimitedGenerator::new("a"));
    let b = Arc::new(RateLimitedGenerator::new("b"));
    let executor = Arc::new(CountingExecutor::new("unused"));

    let playback = Arc::new(RecordingPlayback::new(Duration::ZERO));
    let conversation = Arc::new(InMemoryConversation::default());
    let pipeline = PipelineBuilder::default()
        .add_generator(Arc::clone(&a) as Arc<dyn Generator>)
        .add_generator(Arc::clone(&b) as Arc<dyn Generator>)
        .add_synthesizer(Arc::new(MockSynthesizer::new("tts", Duration::ZERO)))
        .with_playback(Arc::clone(&playback) as Arc<dyn Playback>)
        .with_tools(executor, Vec::new())
        .with_conversation(Arc::clone(&conversation) as Arc<dyn lyra_pipeline::Conversation>)
        .build()
        .unwrap();

    let result = pipeline.handle_turn("halo").await;

    assert_eq!(result.text, BUSY_MESSAGE);
    // A failed turn is not recorded as an exchange.
    assert!(conversation.is_empty().await);
    assert!(playback.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn synthesis_failure_still_delivers_text() {
    let generator = Arc::new(ScriptedGenerator::new(
        "mock",
        text_events("Kalimat pertama cukup panjang. Kalimat kedua juga cukup panjang."),
    ));
    let synthesizer = Arc::new(FailingSynthesizer::new("tts"));
    let playback = Arc::new(RecordingPlayback::new(Duration::ZERO));
    let conversation = Arc::new(InMemoryConversation::default());

    let pipeline = PipelineBuilder::default()
        .add_generator(generator as Arc<dyn Generator>)
        .add_synthesizer(Arc::clone(&synthesizer) as Arc<dyn lyra_pipeline::Synthesizer>)
        .with_playback(Arc::clone(&playback) as Arc<dyn Playback>)
        .with_conversation(Arc::clone(&conversation) as Arc<dyn lyra_pipeline::Conversation>)
        .build()
        .unwrap();

    let result = pipeline.handle_turn("halo").await;

    assert_eq!(
        result.text,
        "Kalimat pertama cukup panjang. Kalimat kedua juga cukup panjang."
    );
    assert!(playback.played().is_empty());
    assert_eq!(conversation.len().await, 2);
}

// -- voice turns --------------------------------------------------------------

#[tokio::test]
async fn voice_turn_transcribes_then_responds() {
    let generator = Arc::new(ScriptedGenerator::new(
        "mock",
        vec![
            vec![StreamEvent::FunctionCall(time_invocation("call_1"))],
            vec![StreamEvent::Text("Sekarang pukul 10:00.".to_string())],
        ],
    ));
    let executor = Arc::new(CountingExecutor::new("10:00"));
    let playback = Arc::new(RecordingPlayback::new(Duration::ZERO));

    let pipeline = PipelineBuilder::default()
        .add_transcriber(Arc::new(MockTranscriber::new("stt", "jam berapa?")))
        .add_generator(generator as Arc<dyn Generator>)
        .add_synthesizer(Arc::new(MockSynthesizer::new("tts", Duration::ZERO)))
        .with_playback(Arc::clone(&playback) as Arc<dyn Playback>)
        .with_tools(Arc::clone(&executor) as Arc<dyn lyra_pipeline::ToolExecutor>, Vec::new())
        .build()
        .unwrap();

    let result = pipeline
        .handle_voice_turn(&[0u8; 64])
        .await
        .expect("speech present");

    assert!(result.text.contains("10:00"));
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn blank_transcript_skips_the_turn() {
    let generator = Arc::new(ScriptedGenerator::new("mock", text_events(THREE_SENTENCES)));
    let pipeline = PipelineBuilder::default()
        .add_transcriber(Arc::new(MockTranscriber::new("stt", "   ")))
        .add_generator(generator as Arc<dyn Generator>)
        .add_synthesizer(Arc::new(MockSynthesizer::new("tts", Duration::ZERO)))
        .build()
        .unwrap();

    assert!(pipeline.handle_voice_turn(&[0u8; 64]).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn exhausted_transcription_returns_busy_message() {
    let generator = Arc::new(ScriptedGenerator::new("mock", text_events(THREE_SENTENCES)));
    let pipeline = PipelineBuilder::default()
        .add_transcriber(Arc::new(MockTranscriber::failing("stt")))
        .add_generator(generator as Arc<dyn Generator>)
        .add_synthesizer(Arc::new(MockSynthesizer::new("tts", Duration::ZERO)))
        .build()
        .unwrap();

    let result = pipeline
        .handle_voice_turn(&[0u8; 64])
        .await
        .expect("failure is reported");
    assert_eq!(result.text, BUSY_MESSAGE);
}

// -- context injection --------------------------------------------------------

#[tokio::test]
async fn context_providers_inject_system_messages() {
    use lyra_pipeline::context::{ContextProvider, StaticContext};

    let generator = Arc::new(ScriptedGenerator::new("mock", text_events(THREE_SENTENCES)));
    let pipeline = PipelineBuilder::default()
        .add_generator(Arc::clone(&generator) as Arc<dyn Generator>)
        .add_synthesizer(Arc::new(MockSynthesizer::new("tts", Duration::ZERO)))
        .add_context_provider(
            Arc::new(StaticContext::new("facts", "User name is Zhafran"))
                as Arc<dyn ContextProvider>,
        )
        .build()
        .unwrap();

    pipeline.handle_turn("siapa nama saya?").await;

    let contexts = generator.contexts.lock().unwrap();
    assert!(
        contexts[0]
            .iter()
            .any(|m| m.role == Role::System && m.content.contains("Zhafran"))
    );
}
