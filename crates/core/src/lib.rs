//! # ferrule core
//!
//! Domain types, traits, and error definitions for the ferrule agent.
//! This crate has no framework dependencies. It defines the domain model
//! that every other crate implements against.
//!
//! ## Layout
//!
//! Each collaborator of the agent loop is a trait here, with the
//! implementations living in their own crates:
//! - [`Provider`]: streaming completion client (`ferrule-providers`)
//! - [`ConversationStore`]: append-only conversation log (`ferrule-memory`)
//! - [`ToolHandler`]: a callable behind a registered tool (`ferrule-tools`)

pub mod error;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Conversation, ConversationId, ConversationSummary, Message, MessageToolCall, Role};
pub use provider::{CompletionRequest, Provider, StreamChunk, ToolCallDelta, ToolSchema};
pub use store::ConversationStore;
pub use tool::{Tool, ToolHandler, ToolRegistry, ToolResult};
