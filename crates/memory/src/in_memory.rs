//! In-memory conversation store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use ferrule_core::error::StoreError;
use ferrule_core::message::{Conversation, ConversationId, ConversationSummary, Message};
use ferrule_core::store::ConversationStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps conversations in a Vec, in creation order.
/// Same semantics as the SQLite store, nothing survives the process.
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<Vec<Conversation>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_conversation(&self, model: Option<&str>) -> Result<ConversationId, StoreError> {
        let conv = Conversation::new(model.map(String::from));
        let id = conv.id.clone();
        self.conversations.write().await.push(conv);
        Ok(id)
    }

    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        mut message: Message,
    ) -> Result<String, StoreError> {
        if message.id.is_empty() {
            message.id = Uuid::new_v4().to_string();
        }

        let mut conversations = self.conversations.write().await;

        if conversations
            .iter()
            .flat_map(|c| &c.messages)
            .any(|m| m.id == message.id)
        {
            return Err(StoreError::Storage(format!(
                "Message {} already stored",
                message.id
            )));
        }

        let conv = conversations
            .iter_mut()
            .find(|c| &c.id == conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;

        let id = message.id.clone();
        conv.messages.push(message);
        Ok(id)
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .conversations
            .read()
            .await
            .iter()
            .find(|c| &c.id == conversation_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }

    async fn get_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .conversations
            .read()
            .await
            .iter()
            .find(|c| &c.id == conversation_id)
            .cloned())
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>, StoreError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .iter()
            .rev()
            .take(limit)
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                created_at: c.created_at,
                model: c.model.clone(),
                message_count: c.messages.len(),
            })
            .collect())
    }
}

impl InMemoryConversationStore {
    /// Total messages across all conversations.
    pub async fn message_count(&self) -> usize {
        self.conversations
            .read()
            .await
            .iter()
            .map(|c| c.messages.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_list() {
        let store = InMemoryConversationStore::new();
        let id = store.create_conversation(None).await.unwrap();
        store.append_message(&id, Message::user("hi")).await.unwrap();
        store.append_message(&id, Message::assistant("hello")).await.unwrap();

        let messages = store.list_messages(&id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello");
        assert_eq!(store.message_count().await, 2);
    }

    #[tokio::test]
    async fn unknown_conversation() {
        let store = InMemoryConversationStore::new();
        let missing = ConversationId::from("nope");
        let err = store
            .append_message(&missing, Message::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(_)));
        assert!(store.get_conversation(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let store = InMemoryConversationStore::new();
        let a = store.create_conversation(None).await.unwrap();
        let b = store.create_conversation(Some("m")).await.unwrap();
        store.append_message(&a, Message::user("x")).await.unwrap();

        let list = store.list_conversations(5).await.unwrap();
        assert_eq!(list[0].id, b);
        assert_eq!(list[1].id, a);
        assert_eq!(list[1].message_count, 1);
        assert_eq!(store.list_conversations(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_message_is_not_stored_twice() {
        let store = InMemoryConversationStore::new();
        let id = store.create_conversation(None).await.unwrap();
        let msg = Message::user("once");
        store.append_message(&id, msg.clone()).await.unwrap();
        assert!(store.append_message(&id, msg).await.is_err());
        assert_eq!(store.message_count().await, 1);
    }
}
