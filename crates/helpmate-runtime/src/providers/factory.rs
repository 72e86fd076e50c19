//! Explicit driver registry.
//!
//! Drivers register factories keyed by a provider string; the registry is
//! built once at startup from static configuration. There is no runtime
//! discovery or plugin scanning: what is registered is all there is.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = ProviderRegistry::new();
//! registry.register(Arc::new(OllamaProviderFactory));
//!
//! let driver = registry.create("ollama", &config.llm)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use helpmate_core::config::LlmSettings;

use super::LlmProvider;

/// Errors from driver lookup and construction.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown provider '{key}', available: {available:?}")]
    UnknownKey { key: String, available: Vec<String> },

    #[error("provider '{key}' configuration invalid: {reason}")]
    InvalidSettings { key: String, reason: String },
}

/// Factory for creating LLM drivers from configuration.
///
/// Implement this trait to add a new vendor without touching the routing
/// logic. Each factory validates its own settings and owns a unique key.
pub trait ProviderFactory: Send + Sync {
    /// Unique registry key, e.g. "ollama", "bedrock-claude", "watson".
    fn provider_key(&self) -> &'static str;

    /// Create a driver instance from the LLM settings.
    fn create(&self, settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, RegistryError>;

    /// Validate settings without creating a driver.
    fn validate(&self, settings: &LlmSettings) -> Result<(), RegistryError> {
        self.create(settings).map(|_| ())
    }

    /// Human-readable description of this driver.
    fn description(&self) -> &'static str {
        "LLM driver"
    }
}

/// Registry of available driver factories, keyed by provider string.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all bundled drivers registered.
    #[cfg(feature = "ollama")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OllamaProviderFactory));
        registry
    }

    /// Create a registry with all bundled drivers registered.
    #[cfg(not(feature = "ollama"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }

    /// Register a factory, replacing any previous one under the same key.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_key().to_string(), factory);
    }

    /// Create a driver for the given provider key.
    pub fn create(
        &self,
        key: &str,
        settings: &LlmSettings,
    ) -> Result<Arc<dyn LlmProvider>, RegistryError> {
        self.factory(key)?.create(settings)
    }

    /// Validate settings for the given provider key.
    pub fn validate(&self, key: &str, settings: &LlmSettings) -> Result<(), RegistryError> {
        self.factory(key)?.validate(settings)
    }

    /// Whether a provider key is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// List available provider keys.
    pub fn available_keys(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    fn factory(&self, key: &str) -> Result<&Arc<dyn ProviderFactory>, RegistryError> {
        self.factories
            .get(key)
            .ok_or_else(|| RegistryError::UnknownKey {
                key: key.to_string(),
                available: self
                    .available_keys()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_keys())
            .finish()
    }
}
