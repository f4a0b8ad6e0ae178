//! Conversation store implementations for ferrule.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryConversationStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConversationStore;
