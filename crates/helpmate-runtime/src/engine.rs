//! Routing decision engine.
//!
//! `resolve` turns one question into one [`FinalAnswer`]: a knowledge-base
//! lookup decides the path, the LLM path runs through the resilient invoker,
//! and provider failures are absorbed into a degraded answer; they never
//! escape to the caller.

use std::sync::Arc;
use thiserror::Error;

use helpmate_core::answer::{AnswerSource, EscalationAction, FinalAnswer, FALLBACK_ANSWER};
use helpmate_core::config::{AppConfig, ConfigError};
use helpmate_core::knowledge::{
    KnowledgeBase, KnowledgeEntry, KnowledgeError, KnowledgeSource, YamlFileSource,
};
use helpmate_core::similarity::{MatchResult, MatcherRegistry, SimilarityMatcher};

use crate::invoker::ResilientInvoker;
use crate::prompts::PromptBuilder;
use crate::providers::{LlmProvider, ProviderRegistry, ProviderRequest, RegistryError};

/// Environment variable forcing the LLM path for every question.
pub const ALWAYS_CALL_LLM_ENV: &str = "ALWAYS_CALL_LLM";

/// Errors raised while assembling the engine. All fatal: the system cannot
/// serve any request without a working engine.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("unknown similarity matcher '{key}', available: {available:?}")]
    UnknownMatcher { key: String, available: Vec<String> },

    #[error(transparent)]
    Provider(#[from] RegistryError),

    #[error("engine initialization timed out after {0:?}")]
    InitTimeout(std::time::Duration),

    #[error("engine not initialized")]
    NotInitialized,
}

/// The routing decision engine.
///
/// Constructed once by the host from fully loaded parts; an instance is
/// always ready to serve. All state is read-only, so one engine can be
/// shared across request tasks without locking.
pub struct ResolutionEngine {
    kb: KnowledgeBase,
    matcher: Arc<dyn SimilarityMatcher>,
    invoker: ResilientInvoker,
    prompts: PromptBuilder,
    contact_support_phrase: String,
    threshold: f64,
    always_call_llm: bool,
}

impl ResolutionEngine {
    /// Assemble an engine from already-loaded collaborators.
    pub fn from_parts(
        config: &AppConfig,
        kb: KnowledgeBase,
        matcher: Arc<dyn SimilarityMatcher>,
        driver: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            kb,
            matcher,
            invoker: ResilientInvoker::with_retry(driver, &config.llm.retry),
            prompts: PromptBuilder::new(&config.llm.prompts),
            contact_support_phrase: config.llm.prompts.contact_support_phrase.to_lowercase(),
            threshold: config.similarity.threshold,
            always_call_llm: config.always_call_llm,
        }
    }

    /// The knowledge snapshot this engine serves from.
    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Registry key of the configured driver.
    pub fn driver_id(&self) -> &'static str {
        self.invoker.driver_id()
    }

    /// The `k` knowledge entries most similar to the question.
    pub fn top_matches(&self, question: &str, k: usize) -> Vec<KnowledgeEntry> {
        self.matcher.top_k(question, self.kb.entries(), k)
    }

    /// Resolve one question into a final answer.
    ///
    /// The escalation action is fixed here, from the knowledge lookup alone,
    /// and is not recomputed after the LLM branch, so `action` and
    /// `escalation` can disagree on the LLM path.
    pub async fn resolve(&self, question: &str) -> FinalAnswer {
        let matched = self
            .matcher
            .find_best_match(question, self.kb.entries(), self.threshold);

        let needs_escalate = matched
            .best_entry
            .as_ref()
            .map_or(true, |entry| entry.escalate);
        let action = if needs_escalate {
            EscalationAction::NotifyHuman
        } else {
            EscalationAction::None
        };

        if self.always_call_llm || matched.should_invoke_llm {
            self.llm_path(question, &matched, action).await
        } else {
            self.kb_path(&matched, needs_escalate, action)
        }
    }

    async fn llm_path(
        &self,
        question: &str,
        matched: &MatchResult,
        action: EscalationAction,
    ) -> FinalAnswer {
        let prompt = self.prompts.build(question, &self.kb);

        match self.invoker.ask(&ProviderRequest::new(prompt)).await {
            Ok(response) => {
                let answer = if response.answer.is_empty() {
                    FALLBACK_ANSWER.to_string()
                } else {
                    response.answer.clone()
                };
                let escalation = self.contains_contact_support(&answer);

                FinalAnswer {
                    answer,
                    confidence: matched.best_score,
                    escalation,
                    source: AnswerSource::Llm,
                    action,
                    response_time_ms: response.elapsed_ms(),
                }
            }
            Err(err) => {
                tracing::warn!(
                    driver = self.driver_id(),
                    error = %err,
                    retryable = err.is_retryable(),
                    "LLM call failed, answering with fallback"
                );

                FinalAnswer {
                    answer: FALLBACK_ANSWER.to_string(),
                    confidence: 0.0,
                    escalation: err.is_not_retryable(),
                    source: AnswerSource::Llm,
                    action,
                    response_time_ms: 0,
                }
            }
        }
    }

    fn kb_path(
        &self,
        matched: &MatchResult,
        needs_escalate: bool,
        action: EscalationAction,
    ) -> FinalAnswer {
        let answer = matched
            .best_entry
            .as_ref()
            .map(|entry| entry.answer.clone())
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string());

        FinalAnswer {
            answer,
            confidence: matched.best_score,
            escalation: needs_escalate,
            source: AnswerSource::Kb,
            action,
            response_time_ms: 0,
        }
    }

    fn contains_contact_support(&self, answer: &str) -> bool {
        !self.contact_support_phrase.is_empty()
            && answer.to_lowercase().contains(&self.contact_support_phrase)
    }
}

/// Load every collaborator named by the configuration and assemble the
/// engine, using the default matcher and provider registries.
pub fn bootstrap(config: AppConfig) -> Result<ResolutionEngine, InitError> {
    bootstrap_with(
        config,
        &MatcherRegistry::with_defaults(),
        &ProviderRegistry::with_defaults(),
    )
}

/// [`bootstrap`] with caller-supplied registries.
pub fn bootstrap_with(
    mut config: AppConfig,
    matchers: &MatcherRegistry,
    providers: &ProviderRegistry,
) -> Result<ResolutionEngine, InitError> {
    if let Ok(value) = std::env::var(ALWAYS_CALL_LLM_ENV) {
        config.always_call_llm = value.eq_ignore_ascii_case("true");
    }

    let source = YamlFileSource::new(&config.knowledge.path);
    let kb = KnowledgeBase::new(source.load()?);

    let matcher =
        matchers
            .get(&config.similarity.matcher)
            .ok_or_else(|| InitError::UnknownMatcher {
                key: config.similarity.matcher.clone(),
                available: matchers
                    .available_keys()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })?;

    let driver = providers.create(&config.llm.provider, &config.llm)?;

    tracing::info!(
        entries = kb.len(),
        matcher = %config.similarity.matcher,
        driver = %config.llm.provider,
        threshold = config.similarity.threshold,
        always_call_llm = config.always_call_llm,
        "resolution engine initialized"
    );

    Ok(ResolutionEngine::from_parts(&config, kb, matcher, driver))
}
