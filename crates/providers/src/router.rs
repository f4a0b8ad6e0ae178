//! Provider router — picks the backend from a `provider/model` id.
//!
//! `gemini/gemini-2.0-flash` goes to the `gemini` provider as
//! `gemini-2.0-flash`. Ids with no registered prefix go to the default
//! provider unchanged, so `meta-llama/llama-3-8b` still works there.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ferrule_core::error::ProviderError;
use ferrule_core::provider::{ChunkReceiver, CompletionRequest, Provider};
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Provider names with a built-in base URL.
pub const WELL_KNOWN_PROVIDERS: &[&str] = &["gemini", "openai", "openrouter", "ollama"];

/// Routes completion requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Resolve a model id to a provider and the model name it expects.
    pub fn resolve(&self, model: &str) -> Result<(Arc<dyn Provider>, String), ProviderError> {
        if let Some((prefix, rest)) = model.split_once('/')
            && !rest.is_empty()
            && let Some(provider) = self.get(prefix)
        {
            return Ok((provider, rest.to_string()));
        }

        self.get(&self.default_provider)
            .map(|p| (p, model.to_string()))
            .ok_or_else(|| ProviderError::NotConfigured(self.default_provider.clone()))
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl Provider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn stream(&self, mut request: CompletionRequest) -> Result<ChunkReceiver, ProviderError> {
        let (provider, model) = self.resolve(&request.model)?;
        debug!(provider = provider.name(), model = %model, "Routing request");
        request.model = model;
        provider.stream(request).await
    }
}

/// Build the router from configuration.
///
/// Every well-known provider is registered, plus any extra `[providers.*]`
/// table. The default provider is the prefix of `default_model` when it
/// names a registered provider, otherwise `gemini`.
pub fn build_from_config(config: &ferrule_config::AppConfig) -> ProviderRouter {
    let mut names: Vec<String> = WELL_KNOWN_PROVIDERS.iter().map(|s| s.to_string()).collect();
    for name in config.providers.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    let default_provider = config
        .default_model
        .split_once('/')
        .map(|(prefix, _)| prefix)
        .filter(|prefix| names.iter().any(|n| n == prefix))
        .unwrap_or("gemini")
        .to_string();

    let mut router = ProviderRouter::new(default_provider);

    for name in names {
        let provider_config = config.providers.get(&name);

        let api_key = provider_config
            .and_then(|p| p.api_key.clone())
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| default_base_url(&name));

        let provider = OpenAiCompatProvider::new(name.as_str(), base_url, api_key);
        router.register(name, Arc::new(provider));
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        _ => format!("http://localhost/{provider_name}/v1"),
    }
}
