//! Configuration loading, validation, and management for ferrule.
//!
//! Loads configuration from `~/.ferrule/config.toml` (or the file named by
//! `FERRULE_CONFIG_PATH`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variables consulted for an API key, highest priority first.
pub const API_KEY_ENV_VARS: &[&str] = &[
    "FERRULE_API_KEY",
    "GEMINI_API_KEY",
    "OPENAI_API_KEY",
    "OPENROUTER_API_KEY",
];

/// The root configuration structure.
///
/// Maps directly to `~/.ferrule/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model, in `provider/model` form
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per LLM response (`None` = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Conversation store configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_model() -> String {
    "gemini/gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_command_timeout() -> u64 {
    30
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("memory", &self.memory)
            .field("tools", &self.tools)
            .field("agent", &self.agent)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// SQLite database file. Defaults to `<config_dir>/ferrule.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl MemoryConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("ferrule.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Ask the operator before running each shell command
    #[serde(default = "default_true")]
    pub require_confirmation: bool,

    /// Wall-clock limit for a shell command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Cap on model round-trips per message. Absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from `$FERRULE_CONFIG_PATH` or
    /// `~/.ferrule/config.toml`, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("FERRULE_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = API_KEY_ENV_VARS.iter().find_map(|name| lookup(name)) {
            self.api_key = Some(key);
        }

        if let Some(model) = lookup("FERRULE_MODEL") {
            self.default_model = model;
        }

        if let Some(path) = lookup("FERRULE_DB_PATH") {
            self.memory.db_path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ferrule")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.tools.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.command_timeout_secs must be > 0".into(),
            ));
        }

        if self.agent.max_iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self.providers.values().any(|p| p.api_key.is_some())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            memory: MemoryConfig::default(),
            tools: ToolsConfig::default(),
            agent: AgentConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_model, "gemini/gemini-2.0-flash");
        assert!(config.tools.require_confirmation);
        assert_eq!(config.tools.command_timeout_secs, 30);
        assert!(config.agent.max_iterations.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(
            parsed.tools.command_timeout_secs,
            config.tools.command_timeout_secs
        );
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.tools.command_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "gemini/gemini-2.0-flash");
    }

    #[test]
    fn loads_sections_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "openai/gpt-4o-mini"
default_max_tokens = 2048

[memory]
db_path = "/var/lib/ferrule/history.db"

[tools]
require_confirmation = false
command_timeout_secs = 5

[agent]
max_iterations = 8

[providers.ollama]
api_url = "http://gpu-box:11434/v1"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "openai/gpt-4o-mini");
        assert_eq!(config.default_max_tokens, Some(2048));
        assert_eq!(
            config.memory.resolved_db_path(),
            PathBuf::from("/var/lib/ferrule/history.db")
        );
        assert!(!config.tools.require_confirmation);
        assert_eq!(config.tools.command_timeout_secs, 5);
        assert_eq!(config.agent.max_iterations, Some(8));
        assert_eq!(
            config.providers["ollama"].api_url.as_deref(),
            Some("http://gpu-box:11434/v1")
        );
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_model = [not toml").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env(env_from(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("GEMINI_API_KEY", "gm-key"),
            ("FERRULE_MODEL", "openrouter/meta-llama/llama-3-8b"),
            ("FERRULE_DB_PATH", "/tmp/f.db"),
        ]));
        // GEMINI_API_KEY outranks OPENAI_API_KEY
        assert_eq!(config.api_key.as_deref(), Some("gm-key"));
        assert_eq!(config.default_model, "openrouter/meta-llama/llama-3-8b");
        assert_eq!(config.memory.db_path, Some(PathBuf::from("/tmp/f.db")));
    }

    #[test]
    fn env_api_key_overrides_file() {
        let mut config = AppConfig {
            api_key: Some("stale-file-key".into()),
            ..AppConfig::default()
        };
        config.apply_env(env_from(&[("GEMINI_API_KEY", "fresh-env-key")]));
        assert_eq!(config.api_key.as_deref(), Some("fresh-env-key"));

        // No key in the environment leaves the file's key alone
        let mut config = AppConfig {
            api_key: Some("file-key".into()),
            ..AppConfig::default()
        };
        config.apply_env(env_from(&[]));
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("also-secret".into()),
                api_url: None,
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("also-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
