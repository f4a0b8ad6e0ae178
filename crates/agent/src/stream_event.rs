//! Agent-level output events.
//!
//! `AgentEvent` is what a turn yields to its caller. `render()` turns an
//! event into the plain text fragment a terminal prints.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent while processing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Always the first event: the conversation this turn belongs to.
    ConversationStarted { conversation_id: String },

    /// Partial text token from the model.
    Text { content: String },

    /// A tool is about to run.
    ToolStarted { id: String, name: String },

    /// A tool finished. `content` is what was stored in the `tool` message.
    ToolFinished {
        id: String,
        name: String,
        content: String,
        success: bool,
    },
}

impl AgentEvent {
    /// The textual fragment for this event, if it has one.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::ConversationStarted { .. } => None,
            Self::Text { content } => Some(content.clone()),
            Self::ToolStarted { name, .. } => Some(format!("\n[Tool: {name}]\n")),
            Self::ToolFinished { content, .. } => Some(format!("{content}\n")),
        }
    }
}
