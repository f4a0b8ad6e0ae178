//! Tool-call assembly from streamed fragments.
//!
//! Providers deliver a tool call as a series of deltas tagged by position.
//! Name, id and argument text may arrive in any split; this collects them
//! into complete calls.

use std::collections::HashMap;

use ferrule_core::message::MessageToolCall;
use ferrule_core::provider::ToolCallDelta;

#[derive(Debug, Default)]
struct PartialCall {
    index: u32,
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Accumulates [`ToolCallDelta`]s into [`MessageToolCall`]s.
///
/// Calls come out in the order their index was first seen. A call whose id
/// never arrived is given `call_<index>`.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: Vec<PartialCall>,
    by_index: HashMap<u32, usize>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &ToolCallDelta) {
        let pos = *self.by_index.entry(delta.index).or_insert_with(|| {
            self.calls.push(PartialCall {
                index: delta.index,
                ..PartialCall::default()
            });
            self.calls.len() - 1
        });
        let call = &mut self.calls[pos];

        if let Some(id) = delta.id.as_deref().filter(|s| !s.is_empty())
            && call.id.is_none()
        {
            call.id = Some(id.to_string());
        }

        // A later fragment that names the tool wins
        if let Some(name) = delta.name.as_deref().filter(|s| !s.is_empty()) {
            call.name = name.to_string();
        }

        if let Some(args) = &delta.arguments {
            call.arguments.push_str(args);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn finish(self) -> Vec<MessageToolCall> {
        self.calls
            .into_iter()
            .map(|c| MessageToolCall {
                id: c.id.unwrap_or_else(|| format!("call_{}", c.index)),
                name: c.name,
                arguments: c.arguments,
            })
            .collect()
    }
}
