//! Relevance: does the answer address the query and use the context.

use super::{Details, EvaluationExample, Metric, MetricResult};
use crate::terms::{extract_key_terms, overlap, ratio};
use serde_json::json;

/// Weight of query coverage in the combined score.
pub const QUERY_WEIGHT: f64 = 0.7;
/// Weight of context usage in the combined score.
pub const CONTEXT_WEIGHT: f64 = 0.3;

/// Weighted overlap of the answer with the query and with the context.
///
/// Unlike faithfulness and context precision there is no vacuous case: an
/// empty query or an answer without key terms scores 0.0.
#[derive(Debug, Clone, Default)]
pub struct RelevanceMetric;

impl RelevanceMetric {
    pub fn new() -> Self {
        Self
    }
}

impl Metric for RelevanceMetric {
    fn name(&self) -> &'static str {
        "relevance"
    }

    fn compute(&self, example: &EvaluationExample<'_>) -> MetricResult {
        let query_terms = extract_key_terms(example.query);
        let answer_terms = extract_key_terms(example.answer);
        let context_terms = extract_key_terms(example.context);

        let mut details = Details::new();
        if query_terms.is_empty() || answer_terms.is_empty() {
            details.insert("query_terms_count".into(), json!(query_terms.len()));
            details.insert("answer_terms_count".into(), json!(answer_terms.len()));
            details.insert("reasoning".into(), json!("Empty query or answer"));
            return MetricResult::scored(0.0, details);
        }

        let query_hits = overlap(&query_terms, &answer_terms);
        let context_hits = overlap(&context_terms, &answer_terms);
        let query_relevance = ratio(query_hits, query_terms.len()).unwrap_or(0.0);
        let context_relevance = ratio(context_hits, context_terms.len()).unwrap_or(0.0);
        let score = QUERY_WEIGHT * query_relevance + CONTEXT_WEIGHT * context_relevance;

        details.insert("query_relevance".into(), json!(query_relevance));
        details.insert("context_relevance".into(), json!(context_relevance));
        details.insert("query_terms_in_answer".into(), json!(query_hits));
        details.insert("total_query_terms".into(), json!(query_terms.len()));
        details.insert("context_terms_in_answer".into(), json!(context_hits));
        details.insert("total_context_terms".into(), json!(context_terms.len()));
        details.insert(
            "reasoning".into(),
            json!(format!(
                "Answer addresses {query_hits}/{} query terms and uses {context_hits}/{} context terms",
                query_terms.len(),
                context_terms.len()
            )),
        );
        MetricResult::scored(score, details)
    }
}
