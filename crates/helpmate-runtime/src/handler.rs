//! Request-handling boundary for hosts.
//!
//! A serverless function, HTTP route or CLI wraps [`QueryHandler`]: it
//! validates the incoming question, initializes the engine exactly once per
//! process with a bounded wait, and converts setup failures into a degraded
//! system answer so the caller always gets a [`FinalAnswer`].

use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;

use helpmate_core::answer::FinalAnswer;
use helpmate_core::config::AppConfig;
use helpmate_core::similarity::MatcherRegistry;

use crate::engine::{bootstrap_with, InitError, ResolutionEngine};
use crate::providers::ProviderRegistry;

/// Bounded wait for first-use engine initialization.
pub const ENGINE_INIT_WAIT: Duration = Duration::from_secs(30);

/// Once-only engine holder with a bounded initialization wait.
///
/// Concurrent first callers race on the same initialization; losers wait on
/// it instead of initializing again. A wait longer than the bound surfaces a
/// distinct [`InitError::InitTimeout`] rather than hanging the caller.
pub struct EngineCell {
    cell: OnceCell<ResolutionEngine>,
    init_wait: Duration,
}

impl EngineCell {
    /// Create an empty cell with the default 30 s initialization wait.
    pub fn new() -> Self {
        Self::with_wait(ENGINE_INIT_WAIT)
    }

    /// Create an empty cell with a custom initialization wait.
    pub fn with_wait(init_wait: Duration) -> Self {
        Self {
            cell: OnceCell::new(),
            init_wait,
        }
    }

    /// The engine, initializing it through `init` on first use.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<&ResolutionEngine, InitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResolutionEngine, InitError>>,
    {
        match tokio::time::timeout(self.init_wait, self.cell.get_or_try_init(init)).await {
            Ok(result) => result,
            Err(_) => Err(InitError::InitTimeout(self.init_wait)),
        }
    }

    /// The engine, if it was already initialized.
    pub fn get(&self) -> Result<&ResolutionEngine, InitError> {
        self.cell.get().ok_or(InitError::NotInitialized)
    }
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete request boundary: validation, lazy init, resolution.
pub struct QueryHandler {
    config: AppConfig,
    matchers: MatcherRegistry,
    providers: ProviderRegistry,
    engine: EngineCell,
}

impl QueryHandler {
    /// Create a handler using the default registries.
    pub fn new(config: AppConfig) -> Self {
        Self::with_registries(
            config,
            MatcherRegistry::with_defaults(),
            ProviderRegistry::with_defaults(),
        )
    }

    /// Create a handler with caller-supplied registries.
    pub fn with_registries(
        config: AppConfig,
        matchers: MatcherRegistry,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            config,
            matchers,
            providers,
            engine: EngineCell::new(),
        }
    }

    /// Handle one request.
    ///
    /// Never fails: a blank question or a broken setup both come back as
    /// system-source answers.
    pub async fn handle(&self, question: Option<&str>) -> FinalAnswer {
        let question = question.map(str::trim).unwrap_or_default();
        if question.is_empty() {
            tracing::warn!("request is missing a question");
            return FinalAnswer::missing_question();
        }

        let engine = self
            .engine
            .get_or_init(|| async {
                bootstrap_with(self.config.clone(), &self.matchers, &self.providers)
            })
            .await;

        match engine {
            Ok(engine) => engine.resolve(question).await,
            Err(err) => {
                tracing::error!(error = %err, "engine initialization failed");
                FinalAnswer::internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        LlmProvider, ProviderFactory, ProviderRequest, ProviderResponse, RawCallError,
        RegistryError,
    };
    use async_trait::async_trait;
    use helpmate_core::answer::AnswerSource;
    use helpmate_core::config::LlmSettings;
    use std::sync::Arc;

    struct CannedProvider;

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn id(&self) -> &'static str {
            "canned"
        }

        async fn call(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderResponse, RawCallError> {
            Ok(ProviderResponse::new("a canned answer"))
        }
    }

    struct CannedProviderFactory;

    impl ProviderFactory for CannedProviderFactory {
        fn provider_key(&self) -> &'static str {
            "canned"
        }

        fn create(
            &self,
            _settings: &LlmSettings,
        ) -> Result<Arc<dyn LlmProvider>, RegistryError> {
            Ok(Arc::new(CannedProvider))
        }
    }

    fn kb_file(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("helpmate-handler-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn handler(kb_path: &std::path::Path) -> QueryHandler {
        let yaml = format!(
            "llm:\n  provider: canned\nknowledge:\n  path: {}\n",
            kb_path.display()
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();

        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(CannedProviderFactory));

        QueryHandler::with_registries(config, MatcherRegistry::with_defaults(), providers)
    }

    #[tokio::test]
    async fn test_missing_question_is_system_answer() {
        let handler = handler(&kb_file("kb-missing-q.yaml", "[]"));

        for question in [None, Some(""), Some("   ")] {
            let answer = handler.handle(question).await;
            assert_eq!(answer.source, AnswerSource::System);
            assert!(!answer.escalation);
            assert_eq!(answer.confidence, 0.0);
        }
    }

    #[tokio::test]
    async fn test_question_resolves_through_engine() {
        let kb = kb_file(
            "kb-resolve.yaml",
            "- id: 1\n  question: \"How do I reset my password?\"\n  answer: \"Click forgot password\"\n",
        );
        let handler = handler(&kb);

        let answer = handler.handle(Some("How do I reset my password?")).await;
        assert_eq!(answer.source, AnswerSource::Kb);
        assert_eq!(answer.answer, "Click forgot password");
    }

    #[tokio::test]
    async fn test_engine_initialized_once() {
        let kb = kb_file("kb-once.yaml", "[]");
        let handler = handler(&kb);

        let first = handler.handle(Some("question one")).await;
        let second = handler.handle(Some("question two")).await;
        assert_eq!(first.source, AnswerSource::Llm);
        assert_eq!(second.source, AnswerSource::Llm);
        assert!(handler.engine.get().is_ok());
    }

    #[tokio::test]
    async fn test_broken_setup_becomes_internal_error_answer() {
        // Knowledge file does not exist: bootstrap fails, handler degrades.
        let yaml = "llm:\n  provider: canned\nknowledge:\n  path: /nonexistent/kb.yaml\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(CannedProviderFactory));
        let handler =
            QueryHandler::with_registries(config, MatcherRegistry::with_defaults(), providers);

        let answer = handler.handle(Some("a real question")).await;
        assert_eq!(answer.source, AnswerSource::System);
        assert!(answer.escalation);
    }

    #[tokio::test]
    async fn test_uninitialized_cell_reports_not_initialized() {
        let cell = EngineCell::new();
        assert!(matches!(cell.get(), Err(InitError::NotInitialized)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_initialization_times_out() {
        let cell = EngineCell::with_wait(Duration::from_millis(50));

        let result = cell
            .get_or_init(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("initialization should have been cut off")
            })
            .await;

        match result {
            Err(InitError::InitTimeout(wait)) => assert_eq!(wait, Duration::from_millis(50)),
            Err(other) => panic!("expected InitTimeout, got {other:?}"),
            Ok(_) => panic!("expected InitTimeout, got an engine"),
        }
    }
}
