//! Ollama driver speaking the OpenAI-compatible chat endpoint.
//!
//! Works with any model served by Ollama (Llama, Mistral, Nemotron, ...)
//! through `POST {endpoint}/v1/chat/completions`. Errors are classified
//! precisely from HTTP status codes instead of the fallback heuristics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use helpmate_core::config::LlmSettings;

use super::factory::{ProviderFactory, RegistryError};
use super::{LlmProvider, ProviderError, ProviderRequest, ProviderResponse, RawCallError};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Ollama driver, registered under the key `"ollama"`.
#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    system_prompt: Option<String>,
}

impl OllamaProvider {
    /// Build a driver from the LLM settings.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, RegistryError> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| RegistryError::InvalidSettings {
                key: "ollama".to_string(),
                reason: "llm.endpoint is required".to_string(),
            })?;

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(RegistryError::InvalidSettings {
                key: "ollama".to_string(),
                reason: "llm.endpoint must start with http:// or https://".to_string(),
            });
        }

        let model = settings
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| RegistryError::InvalidSettings {
                key: "ollama".to_string(),
                reason: "llm.model is required".to_string(),
            })?;

        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            system_prompt: settings
                .prompts
                .preamble
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        })
    }

    /// Process-wide HTTP client, initialized exactly once on first use.
    fn client() -> &'static reqwest::Client {
        static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
        CLIENT.get_or_init(|| {
            reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client")
        })
    }

    fn payload<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn id(&self) -> &'static str {
        "ollama"
    }

    async fn call(&self, request: &ProviderRequest) -> Result<ProviderResponse, RawCallError> {
        let prompt = request.prompt();
        if prompt.is_empty() {
            return Err(ProviderError::invalid_request("request prompt must not be empty").into());
        }

        let response = Self::client()
            .post(format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH))
            .timeout(REQUEST_TIMEOUT)
            .json(&self.payload(prompt))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::timeout("client/network timeout").with_source(err)
                } else {
                    ProviderError::provider("network error communicating with Ollama")
                        .with_source(err)
                }
            })?;

        let status = response.status();
        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(ProviderError::rate_limit("Rate limit exceeded (429)", retry_after).into())
            }
            400 => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::invalid_request(format!("Invalid request (400): {body}")).into())
            }
            401 | 403 => {
                Err(ProviderError::auth(format!("Authorization error ({})", status.as_u16()))
                    .into())
            }
            408 | 504 => {
                Err(ProviderError::timeout(format!("Service timeout ({})", status.as_u16()))
                    .into())
            }
            code if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::provider_with_status(format!("HTTP {code}: {body}"), code)
                    .into())
            }
            _ => {
                let body: ChatResponse = response.json().await.map_err(|err| {
                    ProviderError::provider("problem parsing response JSON").with_source(err)
                })?;

                let content = body
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| ProviderError::provider("no choices in response"))?
                    .message
                    .content
                    .unwrap_or_default();

                if content.trim().is_empty() {
                    return Err(ProviderError::provider("empty content in response").into());
                }

                Ok(ProviderResponse::new(content))
            }
        }
    }
}

/// Factory for creating Ollama drivers from configuration.
pub struct OllamaProviderFactory;

impl ProviderFactory for OllamaProviderFactory {
    fn provider_key(&self) -> &'static str {
        "ollama"
    }

    fn create(&self, settings: &LlmSettings) -> Result<std::sync::Arc<dyn LlmProvider>, RegistryError> {
        Ok(std::sync::Arc::new(OllamaProvider::from_settings(settings)?))
    }

    fn description(&self) -> &'static str {
        "Ollama driver via the OpenAI-compatible chat endpoint"
    }
}
