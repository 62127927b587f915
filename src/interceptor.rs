//! Streaming ⇄ tool-execution interleave over a generation stream
//!
//! Drives one generation request as a lazy stream of complete sentences.
//! Text events feed the sentence segmenter; a function-call event pauses
//! streaming, executes the tool, folds the (call, result) pair into the
//! request context, and resumes on a brand-new backend stream. Tool
//! failures become backend-visible strings, never pipeline errors.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::providers::{ChatMessage, GenerationRequest, Generator, Router, StreamEvent, ToolInvocation};
use crate::segment::extract_sentence;
use crate::tools::ToolExecutor;

/// Hard per-call timeout for tool execution. Not cumulative across
/// calls within one request.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum tool round-trips per request
pub const MAX_TOOL_ROUNDS: usize = 3;

/// Open a sentence stream for `request`, executing tool calls as they
/// arrive.
///
/// The backend stream is opened through the generation router, so the
/// open fails over between providers like any other call. Sentences
/// already yielded are never retracted; an unyielded buffer fragment
/// carries forward unchanged across a tool round-trip. Past
/// [`MAX_TOOL_ROUNDS`] round-trips the stream finishes with whatever
/// text has accumulated.
pub fn sentence_stream(
    generation: Arc<Router<dyn Generator>>,
    tools: Arc<dyn ToolExecutor>,
    mut request: GenerationRequest,
) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut buffer = String::new();
        let mut rounds = 0usize;

        'request: loop {
            // A fresh backend stream over the current context.
            let mut events = generation
                .execute(|provider| {
                    let request = request.clone();
                    async move { provider.generate_stream(&request).await }
                })
                .await?;

            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::Text(chunk) => {
                        buffer.push_str(&chunk);
                        loop {
                            let (sentence, rest) = extract_sentence(&buffer);
                            buffer = rest;
                            match sentence {
                                Some(s) => yield s,
                                None => break,
                            }
                        }
                    }
                    StreamEvent::FunctionCall(invocation) => {
                        if rounds >= MAX_TOOL_ROUNDS {
                            tracing::warn!(
                                tool = %invocation.name,
                                rounds,
                                "tool round limit reached, finishing with accumulated text"
                            );
                            break 'request;
                        }
                        rounds += 1;
                        tracing::info!(
                            tool = %invocation.name,
                            round = rounds,
                            "executing tool call"
                        );
                        let outcome = run_tool(tools.as_ref(), &invocation).await;
                        request.context.push(ChatMessage::tool_call(&invocation));
                        request.context.push(ChatMessage::tool_result(&invocation.id, outcome));
                        // Unyielded buffer text carries across the resume.
                        continue 'request;
                    }
                }
            }
            break;
        }

        // Final flush: the remainder goes out verbatim, whatever its length.
        let tail = buffer.trim();
        if !tail.is_empty() {
            yield tail.to_string();
        }
    }
}

/// Execute one tool call under the hard timeout.
///
/// Success yields the tool's result; timeout or failure yield an error
/// string for the backend to read. Never an `Err`.
pub(crate) async fn run_tool(executor: &dyn ToolExecutor, invocation: &ToolInvocation) -> String {
    let call = executor.execute(&invocation.name, &invocation.arguments);
    match tokio::time::timeout(TOOL_TIMEOUT, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::error!(tool = %invocation.name, error = %e, "tool failed");
            format!("Error: {e}")
        }
        Err(_) => {
            let e = Error::ToolTimeout(invocation.name.clone());
            tracing::warn!(tool = %invocation.name, timeout = ?TOOL_TIMEOUT, "tool timed out");
            format!("Error: {e}")
        }
    }
}
