//! Application configuration parsing from YAML.
//!
//! Configuration is read once at startup; any problem found here is fatal.
//! The system never starts with an invalid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default minimum similarity score required to trust a knowledge answer.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Default sentinel phrase marking an LLM answer as needing human help.
pub const DEFAULT_CONTACT_SUPPORT_PHRASE: &str = "contact support";

/// Default retry attempts for one logical provider ask.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff between retry attempts.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

mod duration_str {
    //! Durations as humantime strings ("500ms", "2m") in YAML.

    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

mod opt_duration_str {
    //! Optional durations as humantime strings in YAML.

    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(deserializer)?;
        text.map(|t| humantime::parse_duration(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings.
    pub llm: LlmSettings,

    /// Similarity matching settings.
    #[serde(default)]
    pub similarity: SimilaritySettings,

    /// Knowledge-base source settings.
    pub knowledge: KnowledgeSettings,

    /// Route every question through the LLM, even on a confident match.
    /// The `ALWAYS_CALL_LLM` environment variable overrides this at bootstrap.
    #[serde(default)]
    pub always_call_llm: bool,
}

/// Settings for the LLM provider and its invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Registry key of the driver to use, e.g. "ollama".
    pub provider: String,

    /// Provider endpoint URL, for drivers that need one.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model identifier passed to the driver.
    #[serde(default)]
    pub model: Option<String>,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f64,

    /// Prompt construction settings.
    #[serde(default)]
    pub prompts: PromptSettings,

    /// Retry/backoff settings.
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_max_tokens() -> u32 {
    512
}

/// Settings for prompt construction and answer screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Preamble text substituted into the template.
    #[serde(default)]
    pub preamble: Option<String>,

    /// Prompt template with `{preamble}`, `{examples}` and `{question}`
    /// placeholders. Absent or empty: the bare question is sent.
    #[serde(default)]
    pub template: Option<String>,

    /// Sentinel phrase detected (case-insensitively) in LLM answers to flag
    /// escalation to a human.
    #[serde(default = "default_contact_support_phrase")]
    pub contact_support_phrase: String,
}

fn default_contact_support_phrase() -> String {
    DEFAULT_CONTACT_SUPPORT_PHRASE.to_string()
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            preamble: None,
            template: None,
            contact_support_phrase: default_contact_support_phrase(),
        }
    }
}

/// Retry/backoff settings for the resilient invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per logical ask, minimum 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff with jitter.
    #[serde(default = "default_base_backoff", with = "duration_str")]
    pub base_backoff: Duration,

    /// Optional overall deadline for one ask including all retries.
    #[serde(default, with = "opt_duration_str")]
    pub deadline: Option<Duration>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_backoff() -> Duration {
    DEFAULT_BASE_BACKOFF
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            deadline: None,
        }
    }
}

/// Similarity matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilaritySettings {
    /// Registry key of the matcher to use.
    #[serde(default = "default_matcher")]
    pub matcher: String,

    /// Minimum score required to trust a knowledge answer.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_matcher() -> String {
    "cosine".to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            matcher: default_matcher(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Knowledge-base source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// Path to the knowledge YAML file.
    pub path: PathBuf,
}

impl AppConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Validate the configuration structure.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "llm.provider must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            return Err(ConfigError::Invalid(format!(
                "similarity.threshold must be in [0, 1], got {}",
                self.similarity.threshold
            )));
        }

        if self.llm.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "llm.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.knowledge.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "knowledge.path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_CONFIG: &str = r#"
llm:
  provider: ollama
knowledge:
  path: knowledge.yaml
"#;

    const FULL_CONFIG: &str = r#"
llm:
  provider: ollama
  endpoint: "http://localhost:11434"
  model: "llama3.1"
  max_tokens: 256
  temperature: 0.2
  prompts:
    preamble: "You are a helpdesk assistant."
    template: "{preamble}\n\nExamples:\n{examples}\n\nUser question: {question}\nAnswer:"
    contact_support_phrase: "reach out to support"
  retry:
    max_attempts: 5
    base_backoff: 200ms
    deadline: 2m
similarity:
  matcher: cosine
  threshold: 0.75
knowledge:
  path: kb/entries.yaml
always_call_llm: true
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL_CONFIG).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.similarity.matcher, "cosine");
        assert_eq!(config.similarity.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.llm.retry.max_attempts, 3);
        assert_eq!(config.llm.retry.base_backoff, Duration::from_millis(500));
        assert_eq!(config.llm.retry.deadline, None);
        assert_eq!(
            config.llm.prompts.contact_support_phrase,
            DEFAULT_CONTACT_SUPPORT_PHRASE
        );
        assert!(!config.always_call_llm);
    }

    #[test]
    fn test_full_config_round_trip() {
        let config = AppConfig::from_yaml(FULL_CONFIG).unwrap();
        assert_eq!(config.llm.endpoint.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.llm.model.as_deref(), Some("llama3.1"));
        assert_eq!(config.llm.max_tokens, 256);
        assert_eq!(config.llm.retry.max_attempts, 5);
        assert_eq!(config.llm.retry.base_backoff, Duration::from_millis(200));
        assert_eq!(config.llm.retry.deadline, Some(Duration::from_secs(120)));
        assert_eq!(config.similarity.threshold, 0.75);
        assert!(config.always_call_llm);
    }

    #[test]
    fn test_humantime_durations_survive_serialization() {
        let config = AppConfig::from_yaml(FULL_CONFIG).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back.llm.retry.base_backoff, config.llm.retry.base_backoff);
        assert_eq!(back.llm.retry.deadline, config.llm.retry.deadline);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let yaml = r#"
llm:
  provider: ollama
similarity:
  threshold: 1.5
knowledge:
  path: knowledge.yaml
"#;
        assert!(matches!(
            AppConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let yaml = r#"
llm:
  provider: ollama
  retry:
    max_attempts: 0
knowledge:
  path: knowledge.yaml
"#;
        assert!(matches!(
            AppConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_blank_provider_rejected() {
        let yaml = r#"
llm:
  provider: "  "
knowledge:
  path: knowledge.yaml
"#;
        assert!(matches!(
            AppConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = r#"
llm:
  provider: ollama
  retry:
    base_backoff: lots
knowledge:
  path: knowledge.yaml
"#;
        assert!(matches!(
            AppConfig::from_yaml(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }
}
