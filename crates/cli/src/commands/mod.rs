//! Subcommand implementations and the wiring they share.

pub mod approval;
pub mod ask;
pub mod chat;
pub mod history;
pub mod input;
pub mod tools;

use std::sync::Arc;

use ferrule_agent::AgentLoop;
use ferrule_config::{API_KEY_ENV_VARS, AppConfig};
use ferrule_memory::SqliteConversationStore;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub async fn open_store(config: &AppConfig) -> Result<SqliteConversationStore, Box<dyn std::error::Error>> {
    let path = config.memory.resolved_db_path();
    let store = SqliteConversationStore::open(&path)
        .await
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
    Ok(store)
}

/// Fail early with setup instructions when no API key is configured.
pub fn require_api_key(config: &AppConfig) -> CmdResult {
    if config.has_api_key() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    for var in API_KEY_ENV_VARS {
        eprintln!("    {var}");
    }
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// Build the agent from config: routed provider, SQLite store, built-in tools.
///
/// Tool approval prompts read from `input`.
pub async fn build_agent(
    config: &AppConfig,
    model: Option<String>,
    no_tools: bool,
    input: Arc<input::TerminalInput>,
) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let provider = Arc::new(ferrule_providers::build_from_config(config));
    let store = Arc::new(open_store(config).await?);
    let tools = Arc::new(ferrule_tools::default_registry(
        &config.tools,
        Arc::new(approval::TerminalApprover::new(input)),
    ));

    let model = model.unwrap_or_else(|| config.default_model.clone());
    let mut agent = AgentLoop::new(provider, store, tools, model)
        .with_tools_enabled(!no_tools)
        .with_temperature(config.default_temperature);
    if let Some(max) = config.default_max_tokens {
        agent = agent.with_max_tokens(max);
    }
    if let Some(max) = config.agent.max_iterations {
        agent = agent.with_max_iterations(max);
    }
    Ok(agent)
}
