//! Conversation history collaborator

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::providers::ChatMessage;

/// Read/append access to the dialogue history.
///
/// The pipeline reads an ordered snapshot before each request and
/// appends the final exchange after a successful turn; it never mutates
/// history mid-request.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Ordered snapshot of prior turns
    async fn context(&self) -> Vec<ChatMessage>;

    /// Append a completed (user, assistant) exchange
    async fn add_exchange(&self, user: &str, assistant: &str);
}

/// In-memory history keeping a bounded window of recent messages
pub struct InMemoryConversation {
    turns: Mutex<Vec<ChatMessage>>,
    max_messages: usize,
}

impl InMemoryConversation {
    /// Keep at most `max_messages` most recent messages
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
            max_messages,
        }
    }

    /// Drop all history
    pub async fn clear(&self) {
        self.turns.lock().await.clear();
    }

    /// Number of stored messages
    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }

    /// Whether the history is empty
    pub async fn is_empty(&self) -> bool {
        self.turns.lock().await.is_empty()
    }
}

impl Default for InMemoryConversation {
    fn default() -> Self {
        Self::new(20)
    }
}

#[async_trait]
impl Conversation for InMemoryConversation {
    async fn context(&self) -> Vec<ChatMessage> {
        self.turns.lock().await.clone()
    }

    async fn add_exchange(&self, user: &str, assistant: &str) {
        let mut turns = self.turns.lock().await;
        turns.push(ChatMessage::user(user));
        turns.push(ChatMessage::assistant(assistant));
        let len = turns.len();
        if len > self.max_messages {
            turns.drain(..len - self.max_messages);
        }
    }
}
