//! Shell tool — execute system commands.
//!
//! Runs the command through the host shell with captured output, an
//! optional operator confirmation, and a wall-clock timeout.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolHandler, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::approval::{ApprovalRequest, Approver};

pub const TOOL_NAME: &str = "run_command";

/// Execute `command` through the host shell.
///
/// Denial, timeout, spawn failure and non-zero exit all come back as a
/// failed [`ToolResult`]; on non-zero exit stdout is still reported.
pub async fn run_command(
    command: &str,
    require_confirmation: bool,
    timeout: Duration,
    approver: &dyn Approver,
) -> ToolResult {
    if require_confirmation {
        let request = ApprovalRequest {
            tool_name: TOOL_NAME.into(),
            detail: command.into(),
        };
        if !approver.approve(&request).await {
            debug!(command = %command, "Command denied by operator");
            return ToolResult::failure("User denied execution");
        }
    }

    debug!(command = %command, "Executing shell command");

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to spawn command");
            return failure(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            });
        }
    };

    // Kills everything the shell started if this future is dropped or times out
    let mut group = ProcessGroup::new(child.id());

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return failure(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            warn!(command = %command, timeout_secs = timeout.as_secs(), "Command timed out");
            return failure(ToolError::Timeout {
                tool_name: TOOL_NAME.into(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };
    group.release();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        return ToolResult::ok(stdout);
    }

    let error = if !stderr.trim().is_empty() {
        stderr
    } else {
        match output.status.code() {
            Some(code) => format!("Command exited with code {code}"),
            None => "Command terminated by signal".to_string(),
        }
    };

    ToolResult {
        success: false,
        output: stdout,
        error: Some(error),
    }
}

fn failure(error: ToolError) -> ToolResult {
    ToolResult::failure(error.to_string())
}

/// The process group of a spawned shell, killed on drop unless released.
///
/// `kill_on_drop` only reaches the shell itself; pipelines and background
/// jobs it started live on in the same group.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// The shell exited on its own; its group id may be reused from here on.
    fn release(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.pgid.and_then(|p| i32::try_from(p).ok()) {
                // SAFETY: killpg has no memory-safety preconditions
                unsafe {
                    libc::killpg(pgid, libc::SIGKILL);
                }
            }
        }
    }
}

/// The `run_command` tool handler.
pub struct RunCommandTool {
    approver: Arc<dyn Approver>,
    require_confirmation: bool,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(approver: Arc<dyn Approver>, require_confirmation: bool, timeout: Duration) -> Self {
        Self {
            approver,
            require_confirmation,
            timeout,
        }
    }

    /// The registry descriptor for this tool.
    pub fn descriptor(&self) -> Tool {
        Tool::new(
            TOOL_NAME,
            "Execute a shell command on the local system and return its output.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute"
                    }
                },
                "required": ["command"]
            }),
        )
        .with_confirmation(self.require_confirmation)
    }
}

#[async_trait]
impl ToolHandler for RunCommandTool {
    async fn call(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        Ok(run_command(command, self.require_confirmation, self.timeout, self.approver.as_ref()).await)
    }
}
