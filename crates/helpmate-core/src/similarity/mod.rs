//! Similarity matching between questions and knowledge entries.
//!
//! The matcher decides whether a stored answer is trustworthy enough to
//! return directly. It is pluggable behind [`SimilarityMatcher`] so an
//! embeddings-based implementation can replace the default cosine matcher
//! without touching the routing logic; implementations are looked up through
//! an explicit [`MatcherRegistry`] built at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::knowledge::KnowledgeEntry;

mod cosine;

pub use cosine::CosineMatcher;

/// Result of a best-match scan over the knowledge base.
///
/// `best_entry` is only populated when the best score clears the threshold;
/// a below-threshold best match routes to the LLM and is treated as "no
/// usable match" by the caller.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// The winning entry, when its score reached the threshold.
    pub best_entry: Option<KnowledgeEntry>,

    /// Highest similarity score seen, in [0, 1].
    pub best_score: f64,

    /// Whether the LLM should be consulted instead of the knowledge base.
    pub should_invoke_llm: bool,
}

impl MatchResult {
    /// Result used when there is nothing to match against.
    fn no_match() -> Self {
        Self {
            best_entry: None,
            best_score: 0.0,
            should_invoke_llm: true,
        }
    }
}

/// Scores how closely a question matches stored knowledge entries.
pub trait SimilarityMatcher: Send + Sync {
    /// Registry key for this matcher, e.g. "cosine".
    fn id(&self) -> &'static str;

    /// Similarity of two texts in [0, 1]; symmetric, 0.0 for blank input.
    fn compute(&self, a: &str, b: &str) -> f64;

    /// Scan the snapshot once for the best-scoring entry.
    ///
    /// Ties keep the first entry in snapshot order (strict `>` tracking).
    /// A blank question or empty snapshot always routes to the LLM.
    fn find_best_match(
        &self,
        question: &str,
        entries: &[KnowledgeEntry],
        threshold: f64,
    ) -> MatchResult {
        if question.trim().is_empty() || entries.is_empty() {
            return MatchResult::no_match();
        }

        let mut best_score = 0.0_f64;
        let mut best: Option<&KnowledgeEntry> = None;

        for entry in entries {
            let score = self.compute(question, &entry.question);
            if score > best_score {
                best_score = score;
                best = Some(entry);
            }
        }

        let should_invoke_llm = best_score < threshold;
        MatchResult {
            best_entry: if should_invoke_llm {
                None
            } else {
                best.cloned()
            },
            best_score,
            should_invoke_llm,
        }
    }

    /// The `k` highest-scoring entries, sorted descending by score.
    ///
    /// The sort is stable, so equal scores keep snapshot order.
    fn top_k(&self, question: &str, entries: &[KnowledgeEntry], k: usize) -> Vec<KnowledgeEntry> {
        if question.trim().is_empty() || entries.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &KnowledgeEntry)> = entries
            .iter()
            .map(|entry| (self.compute(question, &entry.question), entry))
            .collect();

        // Scores are in [0, 1], never NaN.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

/// Registry of available similarity matchers.
///
/// Built once at startup from static configuration; no runtime discovery.
#[derive(Default)]
pub struct MatcherRegistry {
    matchers: BTreeMap<String, Arc<dyn SimilarityMatcher>>,
}

impl MatcherRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in cosine matcher registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CosineMatcher::new()));
        registry
    }

    /// Register a matcher under its own key, replacing any previous one.
    pub fn register(&mut self, matcher: Arc<dyn SimilarityMatcher>) {
        self.matchers.insert(matcher.id().to_string(), matcher);
    }

    /// Look up a matcher by key.
    pub fn get(&self, key: &str) -> Option<Arc<dyn SimilarityMatcher>> {
        self.matchers.get(key).cloned()
    }

    /// List available matcher keys.
    pub fn available_keys(&self) -> Vec<&str> {
        self.matchers.keys().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherRegistry")
            .field("matchers", &self.available_keys())
            .finish()
    }
}
