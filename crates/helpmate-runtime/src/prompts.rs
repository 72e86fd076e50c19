//! Prompt construction from the configured template and knowledge examples.
//!
//! The template carries the named placeholders `{preamble}`, `{examples}` and
//! `{question}`, substituted by plain replacement. Without a template the
//! bare question is sent, which keeps a misconfigured prompt section from
//! ever blocking resolution.

use helpmate_core::config::PromptSettings;
use helpmate_core::knowledge::KnowledgeBase;

/// Maximum knowledge entries rendered into the examples block.
pub const EXAMPLES_LIMIT: usize = 10;

const PLACEHOLDER_PREAMBLE: &str = "{preamble}";
const PLACEHOLDER_EXAMPLES: &str = "{examples}";
const PLACEHOLDER_QUESTION: &str = "{question}";

/// Renders provider prompts from configuration and the knowledge snapshot.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    preamble: String,
    template: Option<String>,
}

impl PromptBuilder {
    /// Create a builder from the prompt settings.
    pub fn new(settings: &PromptSettings) -> Self {
        Self {
            preamble: settings.preamble.clone().unwrap_or_default(),
            template: settings
                .template
                .clone()
                .filter(|template| !template.trim().is_empty()),
        }
    }

    /// Build the prompt for a question.
    pub fn build(&self, question: &str, kb: &KnowledgeBase) -> String {
        let Some(template) = self.template.as_deref() else {
            return question.to_string();
        };

        let examples = render_examples(kb);
        template
            .replace(PLACEHOLDER_PREAMBLE, &self.preamble)
            .replace(PLACEHOLDER_EXAMPLES, examples.trim_end())
            .replace(PLACEHOLDER_QUESTION, question)
    }
}

/// Render up to [`EXAMPLES_LIMIT`] entries as `- question -> answer` lines.
fn render_examples(kb: &KnowledgeBase) -> String {
    let mut examples = String::new();
    for entry in kb.entries().iter().take(EXAMPLES_LIMIT) {
        examples.push_str("- ");
        examples.push_str(&entry.question);
        examples.push_str(" -> ");
        examples.push_str(&entry.answer);
        examples.push('\n');
    }
    examples
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpmate_core::knowledge::KnowledgeEntry;

    fn kb(count: u32) -> KnowledgeBase {
        let entries = (1..=count)
            .map(|id| KnowledgeEntry {
                id,
                question: format!("question {id}"),
                answer: format!("answer {id}"),
                escalate: false,
            })
            .collect();
        KnowledgeBase::new(entries)
    }

    fn settings(preamble: Option<&str>, template: Option<&str>) -> PromptSettings {
        PromptSettings {
            preamble: preamble.map(str::to_string),
            template: template.map(str::to_string),
            ..PromptSettings::default()
        }
    }

    #[test]
    fn test_no_template_sends_bare_question() {
        let builder = PromptBuilder::new(&settings(Some("be nice"), None));
        assert_eq!(builder.build("where is my order?", &kb(3)), "where is my order?");
    }

    #[test]
    fn test_blank_template_sends_bare_question() {
        let builder = PromptBuilder::new(&settings(None, Some("   ")));
        assert_eq!(builder.build("where is my order?", &kb(3)), "where is my order?");
    }

    #[test]
    fn test_placeholders_substituted() {
        let builder = PromptBuilder::new(&settings(
            Some("You are a helpdesk assistant."),
            Some("{preamble}\n\nExamples:\n{examples}\n\nUser question: {question}\nAnswer:"),
        ));
        let prompt = builder.build("where is my order?", &kb(2));

        assert!(prompt.starts_with("You are a helpdesk assistant."));
        assert!(prompt.contains("- question 1 -> answer 1"));
        assert!(prompt.contains("- question 2 -> answer 2"));
        assert!(prompt.contains("User question: where is my order?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_examples_capped_at_limit() {
        let builder = PromptBuilder::new(&settings(None, Some("{examples}")));
        let prompt = builder.build("q", &kb(25));

        assert!(prompt.contains("- question 10 -> answer 10"));
        assert!(!prompt.contains("- question 11 -> answer 11"));
        assert_eq!(prompt.lines().count(), EXAMPLES_LIMIT);
    }

    #[test]
    fn test_missing_preamble_renders_empty() {
        let builder = PromptBuilder::new(&settings(None, Some("[{preamble}] {question}")));
        assert_eq!(builder.build("q", &kb(0)), "[] q");
    }

    #[test]
    fn test_empty_kb_renders_empty_examples() {
        let builder = PromptBuilder::new(&settings(None, Some("<{examples}>")));
        assert_eq!(builder.build("q", &kb(0)), "<>");
    }
}
