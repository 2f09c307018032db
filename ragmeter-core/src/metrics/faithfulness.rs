//! Faithfulness: how many of the answer's sentences are grounded in the context.

use super::{Details, EvaluationExample, Metric, MetricResult};
use crate::terms::{KeyTerms, extract_key_terms};
use serde_json::json;

/// A sentence is grounded when strictly more than this fraction of its key
/// terms occur in the context.
pub const SUPPORT_THRESHOLD: f64 = 0.5;

/// Grounding verdict for a single answer sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceSupport {
    pub sentence: String,
    pub key_terms: usize,
    pub found_in_context: usize,
    pub supported: bool,
}

/// Fraction of answer sentences whose key vocabulary appears in the context.
///
/// An answer with no sentences scores 1.0: there is nothing to contradict.
#[derive(Debug, Clone, Default)]
pub struct FaithfulnessMetric;

impl FaithfulnessMetric {
    pub fn new() -> Self {
        Self
    }

    /// Split text into sentences on runs of `.`, `!` and `?`.
    pub fn split_sentences(text: &str) -> Vec<&str> {
        text.split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Check one sentence against an already-lowercased context.
    pub fn check_sentence(sentence: &str, context_lower: &str) -> SentenceSupport {
        let terms: KeyTerms = extract_key_terms(sentence);
        let found = terms
            .iter()
            .filter(|term| context_lower.contains(term.as_str()))
            .count();
        // No key terms: nothing can be falsified.
        let supported =
            terms.is_empty() || found as f64 / terms.len() as f64 > SUPPORT_THRESHOLD;

        SentenceSupport {
            sentence: sentence.to_string(),
            key_terms: terms.len(),
            found_in_context: found,
            supported,
        }
    }

    /// Grounding verdicts for every sentence of `answer`.
    pub fn check(&self, answer: &str, context: &str) -> Vec<SentenceSupport> {
        let context_lower = context.to_lowercase();
        Self::split_sentences(answer)
            .into_iter()
            .map(|sentence| Self::check_sentence(sentence, &context_lower))
            .collect()
    }
}

impl Metric for FaithfulnessMetric {
    fn name(&self) -> &'static str {
        "faithfulness"
    }

    fn compute(&self, example: &EvaluationExample<'_>) -> MetricResult {
        let verdicts = self.check(example.answer, example.context);
        let total = verdicts.len();

        let mut details = Details::new();
        if total == 0 {
            details.insert("total_sentences".into(), json!(0));
            details.insert("supported_sentences".into(), json!(0));
            details.insert(
                "reasoning".into(),
                json!("Empty answer, no claims to verify"),
            );
            return MetricResult::scored(1.0, details);
        }

        let supported = verdicts.iter().filter(|v| v.supported).count();
        let unsupported: Vec<&str> = verdicts
            .iter()
            .filter(|v| !v.supported)
            .map(|v| v.sentence.as_str())
            .collect();
        let score = supported as f64 / total as f64;

        details.insert("total_sentences".into(), json!(total));
        details.insert("supported_sentences".into(), json!(supported));
        details.insert("unsupported_sentences".into(), json!(unsupported));
        details.insert(
            "reasoning".into(),
            json!(format!(
                "{supported} out of {total} sentences are grounded in context"
            )),
        );
        MetricResult::scored(score, details)
    }
}
