//! Shared test helpers for agent loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use ferrule_core::error::ProviderError;
use ferrule_core::provider::{ChunkReceiver, CompletionRequest, Provider, StreamChunk, ToolCallDelta};

type Script = Vec<Result<StreamChunk, ProviderError>>;

/// A mock provider that replays scripted fragment sequences.
///
/// Each call to `stream` replays the next script. When `repeat_last` is set
/// the final script is replayed forever; otherwise running out is an error.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    repeat_last: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(script: Script) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![script])
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if self.repeat_last && scripts.len() == 1 {
                scripts.front().cloned()
            } else {
                scripts.pop_front()
            }
        }
        .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(script.len().max(1));
        for item in script {
            tx.try_send(item).unwrap();
        }
        Ok(rx)
    }
}

/// Text split into one chunk per piece.
pub fn text_script(pieces: &[&str]) -> Script {
    pieces.iter().map(|p| Ok(StreamChunk::text(*p))).collect()
}

/// One tool call delivered as id+name, then the arguments in two halves.
pub fn tool_call_script(id: &str, name: &str, arguments: &str) -> Script {
    let mid = arguments.len() / 2;
    let (head, tail) = arguments.split_at(mid);
    vec![
        Ok(StreamChunk::tool_calls(vec![ToolCallDelta {
            index: 0,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        }])),
        Ok(StreamChunk::tool_calls(vec![ToolCallDelta {
            index: 0,
            arguments: Some(head.into()),
            ..ToolCallDelta::default()
        }])),
        Ok(StreamChunk::tool_calls(vec![ToolCallDelta {
            index: 0,
            arguments: Some(tail.into()),
            ..ToolCallDelta::default()
        }])),
    ]
}
