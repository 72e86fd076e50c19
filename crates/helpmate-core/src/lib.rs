//! # helpmate-core
//!
//! Deterministic core of the helpmate query-resolution engine.
//!
//! This crate answers the question "what do we already know?": it holds the
//! knowledge-base snapshot, scores how closely an incoming question matches a
//! stored entry, and defines the immutable answer record every request ends
//! with. It performs no network I/O and never calls an LLM; that side lives
//! in `helpmate-runtime`.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same question + same snapshot always scores the same
//! 2. **Read-only after load**: the knowledge snapshot is never mutated
//! 3. **Total answers**: a [`FinalAnswer`] always has every field set
//!
//! ## Example
//!
//! ```rust,ignore
//! use helpmate_core::knowledge::KnowledgeBase;
//! use helpmate_core::similarity::{CosineMatcher, SimilarityMatcher};
//!
//! let kb = KnowledgeBase::from_yaml_file("knowledge.yaml")?;
//! let matcher = CosineMatcher::new();
//! let result = matcher.find_best_match("How do I reset my password?", kb.entries(), 0.8);
//! if let Some(entry) = result.best_entry {
//!     println!("{}", entry.answer);
//! }
//! ```

pub mod answer;
pub mod config;
pub mod knowledge;
pub mod similarity;

// Re-export main types at crate root
pub use answer::{AnswerSource, EscalationAction, FinalAnswer, FALLBACK_ANSWER};
pub use config::{AppConfig, ConfigError, LlmSettings, PromptSettings, RetrySettings, SimilaritySettings};
pub use knowledge::{KnowledgeBase, KnowledgeEntry, KnowledgeError, KnowledgeSource, YamlFileSource};
pub use similarity::{CosineMatcher, MatchResult, MatcherRegistry, SimilarityMatcher};
