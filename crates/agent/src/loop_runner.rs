//! The agent loop implementation.

use std::sync::Arc;

use ferrule_core::error::{Error, Result};
use ferrule_core::message::{ConversationId, Message, MessageToolCall};
use ferrule_core::provider::{CompletionRequest, Provider};
use ferrule_core::store::ConversationStore;
use ferrule_core::tool::ToolRegistry;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};

use crate::assembler::ToolCallAssembler;
use crate::stream_event::AgentEvent;

/// Orchestrates model round-trips, tool execution and persistence.
///
/// The provider, store and registry are injected; the loop owns no other
/// state, so one instance can drive many conversations.
pub struct AgentLoop {
    /// The completion client
    provider: Arc<dyn Provider>,

    /// Where every message is appended
    store: Arc<dyn ConversationStore>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// The model to use
    model: String,

    /// Whether tool schemas are offered to the model
    tools_enabled: bool,

    /// Cap on model round-trips per message. `None` = unbounded.
    max_iterations: Option<u32>,

    temperature: Option<f32>,

    max_tokens: Option<u32>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn ConversationStore>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            tools,
            model: model.into(),
            tools_enabled: true,
            max_iterations: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Offer tools to the model (default) or omit them from every request.
    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    /// Stop a message after this many model round-trips.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools_enabled
    }

    /// Create a new conversation tagged with this loop's model.
    pub async fn start_conversation(&self) -> Result<ConversationId> {
        Ok(self.store.create_conversation(Some(&self.model)).await?)
    }

    /// Process one user message.
    ///
    /// Returns a lazy stream of events. The first event is always
    /// [`AgentEvent::ConversationStarted`]; a new conversation is created
    /// when `conversation_id` is `None`. The stream ends after a model
    /// response with no tool calls, or with an error from the provider or
    /// the store. Tool failures never end the stream.
    ///
    /// Dropping the stream stops the turn. Messages already appended stay.
    pub fn process_message(
        &self,
        conversation_id: Option<ConversationId>,
        text: impl Into<String>,
    ) -> BoxStream<'_, Result<AgentEvent>> {
        let text = text.into();

        Box::pin(async_stream::try_stream! {
            let conversation_id = match conversation_id {
                Some(id) => id,
                None => self.start_conversation().await?,
            };
            yield AgentEvent::ConversationStarted {
                conversation_id: conversation_id.to_string(),
            };

            self.store
                .append_message(&conversation_id, Message::user(text))
                .await?;

            let mut history = self.store.list_messages(&conversation_id).await?;
            let tools = if self.tools_enabled {
                Some(self.tools.schemas_for_model())
            } else {
                None
            };

            info!(
                conversation_id = %conversation_id,
                messages = history.len(),
                tools = tools.as_ref().map_or(0, Vec::len),
                "Processing message"
            );

            let mut iteration: u32 = 0;
            loop {
                iteration += 1;
                self.check_iteration(iteration)?;
                debug!(iteration, "Agent loop iteration");

                let request = CompletionRequest {
                    model: self.model.clone(),
                    messages: history.clone(),
                    tools: tools.clone(),
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                };
                let mut fragments = self.provider.stream(request).await?;

                let mut content = String::new();
                let mut assembler = ToolCallAssembler::new();

                while let Some(item) = fragments.recv().await {
                    let chunk = item?;
                    for delta in &chunk.tool_calls {
                        assembler.push(delta);
                    }
                    if let Some(delta) = chunk.content {
                        if !delta.is_empty() {
                            content.push_str(&delta);
                            yield AgentEvent::Text { content: delta };
                        }
                    }
                }

                if assembler.is_empty() {
                    self.store
                        .append_message(&conversation_id, Message::assistant(content))
                        .await?;
                    info!(conversation_id = %conversation_id, iterations = iteration, "Turn complete");
                    break;
                }

                let calls = assembler.finish();
                debug!(count = calls.len(), "Model requested tool calls");

                let assistant = Message::assistant_with_tool_calls(content, calls.clone());
                self.store
                    .append_message(&conversation_id, assistant.clone())
                    .await?;
                history.push(assistant);

                for call in calls {
                    yield AgentEvent::ToolStarted {
                        id: call.id.clone(),
                        name: call.name.clone(),
                    };

                    let result = self.tools.dispatch(&call.name, parse_arguments(&call)).await;
                    debug!(tool = %call.name, success = result.success, "Tool call finished");
                    let content = result.to_message_content();

                    let tool_message = Message::tool_result(call.id.clone(), content.clone());
                    history.push(tool_message.clone());
                    self.store
                        .append_message(&conversation_id, tool_message)
                        .await?;

                    yield AgentEvent::ToolFinished {
                        id: call.id,
                        name: call.name,
                        content,
                        success: result.success,
                    };
                }
            }
        })
    }

    /// Process a message and collect the rendered output into one string.
    pub async fn respond(
        &self,
        conversation_id: Option<ConversationId>,
        text: impl Into<String>,
    ) -> Result<(ConversationId, String)> {
        let mut stream = self.process_message(conversation_id, text);
        let mut id = None;
        let mut output = String::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            if let AgentEvent::ConversationStarted { conversation_id } = &event {
                id = Some(ConversationId(conversation_id.clone()));
            }
            if let Some(fragment) = event.render() {
                output.push_str(&fragment);
            }
        }

        let id = id.ok_or_else(|| Error::Internal("turn produced no conversation".into()))?;
        Ok((id, output))
    }

    fn check_iteration(&self, iteration: u32) -> Result<()> {
        match self.max_iterations {
            Some(max) if iteration > max => Err(Error::Internal(format!(
                "Agent exceeded maximum iterations ({max})"
            ))),
            _ => Ok(()),
        }
    }
}

/// Parse a tool call's argument text. Anything that is not a JSON object
/// becomes `{}`.
fn parse_arguments(call: &MessageToolCall) -> serde_json::Value {
    if call.arguments.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<serde_json::Value>(&call.arguments) {
        Ok(value) if value.is_object() => value,
        Ok(_) | Err(_) => {
            warn!(tool = %call.name, arguments = %call.arguments, "Malformed tool arguments, using {{}}");
            serde_json::json!({})
        }
    }
}
