//! ConversationStore trait — the append-only log of conversations.
//!
//! The agent loop only relies on this contract. How messages are kept
//! (SQLite, memory) is the business of the implementing crate.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, ConversationSummary, Message};

/// Persistent, ordered storage for conversations and their messages.
///
/// Every call is atomic: either the whole write is visible or none of it.
/// Appends to one conversation are serialized so message order is total.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a new conversation and return its ID.
    async fn create_conversation(&self, model: Option<&str>) -> Result<ConversationId, StoreError>;

    /// Append a message to a conversation and return the message ID.
    ///
    /// Fails with [`StoreError::ConversationNotFound`] for an unknown conversation.
    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<String, StoreError>;

    /// All messages of a conversation, in append order.
    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, StoreError>;

    /// A conversation with its messages, or `None` if it does not exist.
    async fn get_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// The most recently created conversations, newest first.
    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>, StoreError>;
}
