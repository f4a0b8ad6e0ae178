//! Error types for the ferrule domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator of the agent loop has its own error enum.

use thiserror::Error;

/// The top-level error type for all ferrule operations.
///
/// Tool failures never appear here: the registry turns them into a failed
/// `ToolResult` at dispatch.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Conversation store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unknown_tool_message() {
        let err = ToolError::NotFound("teleport".into());
        assert_eq!(err.to_string(), "Unknown tool: teleport");
    }

    #[test]
    fn tool_failure_wording() {
        let timeout = ToolError::Timeout {
            tool_name: "run_command".into(),
            timeout_secs: 30,
        };
        assert_eq!(timeout.to_string(), "Command timed out after 30 seconds");

        let failed = ToolError::ExecutionFailed {
            tool_name: "run_command".into(),
            reason: "No such file or directory".into(),
        };
        assert_eq!(failed.to_string(), "run_command failed: No such file or directory");
    }

    #[test]
    fn store_error_wraps_into_top_level() {
        let err: Error = StoreError::ConversationNotFound("abc".into()).into();
        assert!(matches!(err, Error::Store(_)));
        assert!(err.to_string().contains("abc"));
    }
}
