//! Lyra pipeline — streaming response engine for a personal voice assistant
//!
//! Turns one user turn into spoken output:
//! - ordered provider failover with per-provider exponential backoff
//! - mid-stream tool calls with bounded execute-and-resume
//! - sentence-level synthesis overlapped with playback
//!
//! # Architecture
//!
//! ```text
//! input ──► orchestrator ──► generation router ──► event stream
//!                                                      │
//!                         tool executor ◄── function-call interleave
//!                                                      │
//!              segmenter ──► sentences ──► synthesis router
//!                                                      │
//!                          playback ◄── bounded audio queue
//! ```
//!
//! Audio capture, wake-word detection, persistent memory, and the
//! individual tools live behind narrow traits ([`conversation`],
//! [`context`], [`tools`], [`audio`]); this crate owns the concurrency,
//! retry policy, and ordering guarantees in between.

pub mod audio;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod interceptor;
pub mod pipeline;
pub mod providers;
pub mod segment;
pub mod tools;

pub use config::Config;
pub use conversation::{Conversation, InMemoryConversation};
pub use error::{Error, FailureKind, FailureRecord, Result};
pub use pipeline::{BUSY_MESSAGE, ERROR_MESSAGE, Pipeline, PipelineBuilder, PipelineResult};
pub use providers::{
    Capability, ChatMessage, GenerationRequest, Generator, Provider, Role, Router, StreamEvent,
    Synthesizer, ToolInvocation, Transcriber,
};
pub use tools::{Tool, ToolExecutor, ToolRegistry, ToolSpec};
