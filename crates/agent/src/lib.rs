//! The agent loop, the heart of ferrule.
//!
//! One user message is processed as a cycle:
//!
//! 1. **Persist** the user message and load the conversation history
//! 2. **Stream** a completion from the provider, forwarding text as it arrives
//! 3. **Assemble** tool-call fragments into complete calls
//! 4. **If tool calls**: dispatch each in order, persist the results, go to 2
//! 5. **If text only**: persist the assistant reply and stop
//!
//! Everything is exposed as a lazy stream of [`AgentEvent`]s.

pub mod assembler;
pub mod loop_runner;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use assembler::ToolCallAssembler;
pub use loop_runner::AgentLoop;
pub use stream_event::AgentEvent;
