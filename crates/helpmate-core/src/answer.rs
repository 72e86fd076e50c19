//! The outbound answer record.
//!
//! Every well-formed request ends in exactly one [`FinalAnswer`], built in a
//! single struct literal with all fields required; no partially built answer
//! is ever observable.

use serde::{Deserialize, Serialize};

/// Answer text used whenever no real answer is available.
pub const FALLBACK_ANSWER: &str = "Sorry, I don't know the answer to that question.";

/// Answer text for a request that did not carry a question.
pub const MSG_MISSING_QUESTION: &str = "Please provide a question.";

/// Answer text when the system itself failed before resolving.
pub const MSG_INTERNAL_ERROR: &str =
    "Something went wrong while processing your question. Please try again later.";

/// Where the final answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// Answered directly from the knowledge base.
    Kb,
    /// Answered by the LLM provider (or its failure fallback).
    Llm,
    /// Produced by the host boundary without consulting either.
    System,
}

/// Follow-up action the host should take for this answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    /// No follow-up needed.
    None,
    /// A human operator should be notified.
    NotifyHuman,
}

/// Immutable record returned for every request.
///
/// `action` is fixed from the knowledge-base lookup before the LLM branch
/// runs and is never recomputed, so it can disagree with `escalation` (which
/// each path derives on its own). `confidence` carries the similarity score
/// of the best knowledge match and drops to 0 when a provider failure forced
/// the fallback answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// The answer text shown to the user.
    pub answer: String,

    /// Similarity score of the best knowledge match, in [0, 1].
    pub confidence: f64,

    /// Whether a human should take over this conversation.
    pub escalation: bool,

    /// Which path produced the answer.
    pub source: AnswerSource,

    /// Follow-up action derived from the knowledge lookup.
    pub action: EscalationAction,

    /// Wall-clock time of the provider call, 0 on non-LLM paths.
    #[serde(rename = "responseTimeMs")]
    pub response_time_ms: u64,
}

impl FinalAnswer {
    /// Boundary answer for a request with a blank or absent question.
    pub fn missing_question() -> Self {
        Self {
            answer: MSG_MISSING_QUESTION.to_string(),
            confidence: 0.0,
            escalation: false,
            source: AnswerSource::System,
            action: EscalationAction::None,
            response_time_ms: 0,
        }
    }

    /// Boundary answer when initialization or dispatch failed outright.
    /// Escalates: a human should look at requests the system could not serve.
    pub fn internal_error() -> Self {
        Self {
            answer: MSG_INTERNAL_ERROR.to_string(),
            confidence: 0.0,
            escalation: true,
            source: AnswerSource::System,
            action: EscalationAction::None,
            response_time_ms: 0,
        }
    }
}
