//! LLM provider abstractions for helpmate-runtime.
//!
//! This module defines the driver trait for LLM providers, the normalized
//! request/response types, and the closed failure taxonomy every provider
//! error is classified into. Vendor wire formats never leave the drivers.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

mod classify;
mod factory;

#[cfg(feature = "ollama")]
mod ollama;

pub use classify::classify;
pub use factory::{ProviderFactory, ProviderRegistry, RegistryError};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaProvider, OllamaProviderFactory};

/// Message used when neither an explicit message nor a cause is available.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// A normalized request to an LLM provider.
///
/// `prompt` is whitespace-trimmed on construction; `extra` is an extensible
/// bag for provider-specific parameters the core does not interpret.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    prompt: String,
    extra: BTreeMap<String, JsonValue>,
}

impl ProviderRequest {
    /// Create a request for the given prompt, trimming surrounding whitespace.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into().trim().to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// The sanitized prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Attach a provider-specific parameter.
    pub fn with_extra(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up a provider-specific parameter.
    pub fn extra(&self, key: &str) -> Option<&JsonValue> {
        self.extra.get(key)
    }

    /// Keys of all attached provider-specific parameters.
    pub fn extra_keys(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(|k| k.as_str())
    }
}

/// A normalized provider response with invocation timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    /// The answer text, whitespace-trimmed.
    pub answer: String,

    /// Wall-clock duration of the attempt that produced this answer.
    /// Stamped by the invoker; drivers leave it at zero.
    pub elapsed: Duration,
}

impl ProviderResponse {
    /// Create a response for the given answer, trimming surrounding whitespace.
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into().trim().to_string(),
            elapsed: Duration::ZERO,
        }
    }

    /// Elapsed time in whole milliseconds, for the wire.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Categories of provider failure. Retryability is fixed per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Too many requests; may carry the provider's retry-after hint.
    RateLimit { retry_after: Option<Duration> },

    /// The request itself is malformed; retrying cannot help.
    InvalidRequest,

    /// Missing or rejected credentials; retrying cannot help.
    Auth,

    /// The provider or the network did not answer in time.
    Timeout,

    /// Any other upstream failure; retryable by default.
    Provider {
        status: Option<u16>,
        retry_after: Option<Duration>,
    },
}

/// A classified provider failure.
///
/// The message is never blank: an explicit message wins, else the cause's
/// message, else [`UNKNOWN_ERROR`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        };
        Self {
            kind,
            message,
            source: None,
        }
    }

    /// A rate-limit failure, optionally carrying the provider's wait hint.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::new(ProviderErrorKind::RateLimit { retry_after }, message)
    }

    /// A malformed-request failure.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    /// An authentication/authorization failure.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Auth, message)
    }

    /// A timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// A generic upstream failure.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(
            ProviderErrorKind::Provider {
                status: None,
                retry_after: None,
            },
            message,
        )
    }

    /// A generic upstream failure with its HTTP-like status code.
    pub fn provider_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::new(
            ProviderErrorKind::Provider {
                status: Some(status),
                retry_after: None,
            },
            message,
        )
    }

    /// Attach the underlying cause. When no usable message was given, the
    /// cause's message is promoted per the normalization rule.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        if self.message == UNKNOWN_ERROR {
            let cause_message = source.to_string();
            if !cause_message.trim().is_empty() {
                self.message = cause_message;
            }
        }
        self.source = Some(source);
        self
    }

    /// The failure category.
    pub fn kind(&self) -> &ProviderErrorKind {
        &self.kind
    }

    /// The normalized, never-blank message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The provider's retry-after hint, when one was given.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            ProviderErrorKind::RateLimit { retry_after }
            | ProviderErrorKind::Provider { retry_after, .. } => retry_after,
            _ => None,
        }
    }

    /// Whether another attempt may succeed. Fixed by kind.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ProviderErrorKind::RateLimit { .. }
            | ProviderErrorKind::Timeout
            | ProviderErrorKind::Provider { .. } => true,
            ProviderErrorKind::InvalidRequest | ProviderErrorKind::Auth => false,
        }
    }

    /// Whether retrying is pointless.
    pub fn is_not_retryable(&self) -> bool {
        !self.is_retryable()
    }
}

/// Failure surfaced by one raw driver call.
///
/// Drivers that can classify precisely (status codes) return `Classified`;
/// anything else is left `Raw` for the default heuristic classifier in the
/// invoker.
#[derive(Debug, Error)]
pub enum RawCallError {
    #[error(transparent)]
    Classified(#[from] ProviderError),

    #[error("{0}")]
    Raw(Box<dyn std::error::Error + Send + Sync>),
}

impl RawCallError {
    /// Wrap an unclassified failure.
    pub fn raw(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Raw(err.into())
    }
}

/// A raw driver for one LLM vendor.
///
/// This is the ONLY place where vendor wire formats are spoken. Drivers
/// perform exactly one attempt per call; timing, classification of raw
/// failures, and retry live in the invoker.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry key for this driver, e.g. "ollama".
    fn id(&self) -> &'static str;

    /// Perform one raw call against the provider.
    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse, RawCallError>;
}
