//! Additive system-context injection before generation
//!
//! Memory retrieval, pending notifications, and similar collaborators
//! contribute optional context blocks; each block becomes a system
//! message ahead of the conversation snapshot.

use async_trait::async_trait;

/// Supplies an optional context block for the current input
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Context to inject for this input, if any
    async fn context(&self, input: &str) -> Option<String>;
}

/// Fixed context block (assistant facts, standing instructions)
pub struct StaticContext {
    label: String,
    content: String,
}

impl StaticContext {
    /// A block injected on every turn
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

#[async_trait]
impl ContextProvider for StaticContext {
    fn name(&self) -> &str {
        &self.label
    }

    async fn context(&self, _input: &str) -> Option<String> {
        if self.content.is_empty() {
            None
        } else {
            Some(self.content.clone())
        }
    }
}
