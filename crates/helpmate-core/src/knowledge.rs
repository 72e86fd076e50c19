//! Knowledge-base model and loading.
//!
//! The knowledge base is an ordered list of question/answer entries loaded
//! once at startup and never mutated afterwards. Snapshot order matters: the
//! similarity matcher breaks score ties in favor of earlier entries.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur when loading the knowledge base.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse knowledge YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A single question/answer entry in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    /// Stable identifier of the entry.
    pub id: u32,

    /// The canonical question this entry answers.
    pub question: String,

    /// The stored answer.
    pub answer: String,

    /// Entries flagged here route to a human even when matched.
    #[serde(default, rename = "escalation")]
    pub escalate: bool,
}

/// Immutable, ordered snapshot of knowledge entries.
///
/// Cloning is cheap: the entries are shared behind an `Arc`, so many
/// concurrent readers see the same snapshot without locking.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Arc<[KnowledgeEntry]>,
}

impl KnowledgeBase {
    /// Create a snapshot from already-loaded entries, preserving their order.
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Parse a snapshot from a YAML list of entries.
    pub fn from_yaml(yaml: &str) -> Result<Self, KnowledgeError> {
        let entries: Vec<KnowledgeEntry> = serde_yaml::from_str(yaml)?;
        Ok(Self::new(entries))
    }

    /// Parse a snapshot from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// The entries in snapshot order.
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<KnowledgeEntry>> for KnowledgeBase {
    fn from(entries: Vec<KnowledgeEntry>) -> Self {
        Self::new(entries)
    }
}

/// Source of knowledge entries, called once during initialization.
///
/// Object-storage backends (S3, blob stores) implement this trait in their
/// own crates; a local YAML file source is provided here for hosts and tests.
/// A failure here is fatal: the system cannot serve requests without its
/// knowledge base.
pub trait KnowledgeSource: Send + Sync {
    /// Load all entries, preserving their stored order.
    fn load(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError>;
}

/// Knowledge source reading a YAML file from the local filesystem.
#[derive(Debug, Clone)]
pub struct YamlFileSource {
    path: PathBuf,
}

impl YamlFileSource {
    /// Create a source for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KnowledgeSource for YamlFileSource {
    fn load(&self) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
        let contents = fs::read_to_string(&self.path)?;
        let entries: Vec<KnowledgeEntry> = serde_yaml::from_str(&contents)?;
        tracing::info!(
            path = %self.path.display(),
            entries = entries.len(),
            "knowledge base loaded"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWLEDGE_YAML: &str = r#"
- id: 1
  question: "How do I reset my password?"
  answer: "Click forgot password"
- id: 2
  question: "How do I delete my account?"
  answer: "Please talk to an operator"
  escalation: true
"#;

    #[test]
    fn test_parse_knowledge_yaml() {
        let kb = KnowledgeBase::from_yaml(KNOWLEDGE_YAML).unwrap();
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.entries()[0].id, 1);
        assert_eq!(kb.entries()[0].answer, "Click forgot password");
    }

    #[test]
    fn test_escalation_defaults_to_false() {
        let kb = KnowledgeBase::from_yaml(KNOWLEDGE_YAML).unwrap();
        assert!(!kb.entries()[0].escalate);
        assert!(kb.entries()[1].escalate);
    }

    #[test]
    fn test_snapshot_order_preserved() {
        let kb = KnowledgeBase::from_yaml(KNOWLEDGE_YAML).unwrap();
        let ids: Vec<u32> = kb.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_empty_list_is_valid() {
        let kb = KnowledgeBase::from_yaml("[]").unwrap();
        assert!(kb.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        let result = KnowledgeBase::from_yaml("- id: not-a-number\n  question: q");
        assert!(matches!(result, Err(KnowledgeError::Yaml(_))));
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = YamlFileSource::new("/nonexistent/knowledge.yaml");
        assert!(matches!(source.load(), Err(KnowledgeError::Io(_))));
    }

    #[test]
    fn test_clone_shares_snapshot() {
        let kb = KnowledgeBase::from_yaml(KNOWLEDGE_YAML).unwrap();
        let clone = kb.clone();
        assert_eq!(kb.entries().as_ptr(), clone.entries().as_ptr());
    }
}
