//! Built-in tool implementations for ferrule.
//!
//! Tools give the agent the ability to act on the host. The one built-in
//! is `run_command`; side-effecting tools ask an [`Approver`] first.

pub mod approval;
pub mod shell;

use std::sync::Arc;
use std::time::Duration;

use ferrule_config::ToolsConfig;
use ferrule_core::tool::ToolRegistry;

pub use approval::{ApprovalRequest, Approver, AutoApprove, DenyAll};
pub use shell::{RunCommandTool, run_command};

/// Create a tool registry with all built-in tools.
pub fn default_registry(config: &ToolsConfig, approver: Arc<dyn Approver>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let shell = RunCommandTool::new(
        approver,
        config.require_confirmation,
        Duration::from_secs(config.command_timeout_secs),
    );
    registry.register(shell.descriptor(), Arc::new(shell));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_run_command() {
        let registry = default_registry(&ToolsConfig::default(), Arc::new(DenyAll));
        let tools = registry.list_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "run_command");
        assert!(tools[0].requires_confirmation);

        let schemas = registry.schemas_for_model();
        assert_eq!(schemas[0].function.name, "run_command");
    }

    #[tokio::test]
    async fn dispatch_through_registry_with_denial() {
        let registry = default_registry(&ToolsConfig::default(), Arc::new(DenyAll));
        let result = registry
            .dispatch("run_command", serde_json::json!({"command": "ls"}))
            .await;
        assert!(!result.success);
        assert!(result.to_message_content().contains("denied"));
    }

    #[tokio::test]
    async fn empty_arguments_become_a_failed_result() {
        let registry = default_registry(&ToolsConfig::default(), Arc::new(AutoApprove));
        let result = registry.dispatch("run_command", serde_json::json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("command"));
    }
}
