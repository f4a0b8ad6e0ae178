//! Asks the operator on the terminal before a tool runs.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use ferrule_tools::{ApprovalRequest, Approver};
use tokio::io::{AsyncBufRead, BufReader, Stdin};
use tracing::warn;

use super::input::TerminalInput;

pub struct TerminalApprover<R = BufReader<Stdin>> {
    input: Arc<TerminalInput<R>>,
}

impl<R> TerminalApprover<R> {
    pub fn new(input: Arc<TerminalInput<R>>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Approver for TerminalApprover<R> {
    async fn approve(&self, request: &ApprovalRequest) -> bool {
        {
            let mut stderr = std::io::stderr();
            let _ = write!(
                stderr,
                "\n  [{}] wants to run: {}\n  Allow? [y/N] ",
                request.tool_name, request.detail
            );
            let _ = stderr.flush();
        }

        match self.input.read_line().await {
            Ok(Some(line)) => is_yes(&line),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Could not read approval answer");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
