//! Default cosine-similarity matcher over word-frequency vectors.
//!
//! Both texts are lowercased and tokenized into word multisets; similarity is
//! the cosine of their frequency vectors. Word order is ignored and the score
//! is symmetric.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use super::SimilarityMatcher;

lazy_static! {
    /// Word tokens; punctuation and whitespace are separators.
    static ref WORD_PATTERN: Regex = Regex::new(r"\b\w+\b").unwrap();
}

/// Word-frequency cosine similarity, registered under the key `"cosine"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineMatcher;

impl CosineMatcher {
    /// Create a new cosine matcher.
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityMatcher for CosineMatcher {
    fn id(&self) -> &'static str {
        "cosine"
    }

    fn compute(&self, a: &str, b: &str) -> f64 {
        if a.trim().is_empty() || b.trim().is_empty() {
            return 0.0;
        }

        let a_lower = a.to_lowercase();
        let b_lower = b.to_lowercase();
        let vector_a = word_vector(&a_lower);
        let vector_b = word_vector(&b_lower);

        cosine_similarity(&vector_a, &vector_b)
    }
}

fn word_vector(text: &str) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for word in WORD_PATTERN.find_iter(text) {
        *counts.entry(word.as_str()).or_insert(0) += 1;
    }
    counts
}

fn cosine_similarity(vector_a: &HashMap<&str, u32>, vector_b: &HashMap<&str, u32>) -> f64 {
    if vector_a.is_empty() || vector_b.is_empty() {
        return 0.0;
    }

    if !vector_a.keys().any(|word| vector_b.contains_key(word)) {
        return 0.0;
    }

    let mut dot_product = 0.0_f64;
    let mut magnitude_a = 0.0_f64;
    let mut magnitude_b = 0.0_f64;

    for (word, &count_a) in vector_a {
        let count_b = vector_b.get(word).copied().unwrap_or(0);
        dot_product += f64::from(count_a) * f64::from(count_b);
        magnitude_a += f64::from(count_a) * f64::from(count_a);
    }
    for &count_b in vector_b.values() {
        magnitude_b += f64::from(count_b) * f64::from(count_b);
    }

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a.sqrt() * magnitude_b.sqrt())
}
