//! # helpmate-runtime
//!
//! Resilient LLM invocation and routing runtime for helpmate.
//!
//! This crate owns everything that talks to, or decides to talk to, an
//! external LLM provider:
//!
//! - a closed failure taxonomy with fixed retryability per kind
//! - a resilient invoker wrapping one logical "ask" with timing,
//!   classification and jittered retry
//! - the routing decision engine combining knowledge-base lookups with
//!   conditional LLM calls
//! - the request boundary hosts wrap (blank-question validation, once-only
//!   initialization with a bounded wait)
//!
//! The deterministic side (knowledge snapshot, similarity scoring, the
//! answer record) lives in `helpmate-core`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use helpmate_core::AppConfig;
//! use helpmate_runtime::engine::bootstrap;
//!
//! let config = AppConfig::from_yaml_file("helpmate.yaml")?;
//! let engine = bootstrap(config)?;
//! let answer = engine.resolve("How do I reset my password?").await;
//! println!("{} (escalate: {})", answer.answer, answer.escalation);
//! ```

pub mod engine;
pub mod handler;
pub mod invoker;
pub mod prompts;
pub mod providers;

// Re-export main types at crate root
pub use engine::{bootstrap, bootstrap_with, InitError, ResolutionEngine};
pub use handler::{EngineCell, QueryHandler, ENGINE_INIT_WAIT};
pub use invoker::{backoff_for, jittered_backoff, ResilientInvoker};
pub use providers::{
    classify, LlmProvider, ProviderError, ProviderErrorKind, ProviderFactory, ProviderRegistry,
    ProviderRequest, ProviderResponse, RawCallError, RegistryError,
};
