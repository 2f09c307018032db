//! Context precision: how much of the answer's vocabulary is backed by the ground truth.

use super::{Details, EvaluationExample, Metric, MetricResult};
use crate::terms::{extract_key_terms, overlap};
use serde_json::json;

/// Fraction of the answer's key terms that also appear in the ground truth.
///
/// Overlap with the retrieved context is reported for diagnostics but does
/// not contribute to the score.
#[derive(Debug, Clone, Default)]
pub struct ContextPrecisionMetric;

impl ContextPrecisionMetric {
    pub fn new() -> Self {
        Self
    }

    fn score(answer: &str, context: &str, ground_truth: &str) -> MetricResult {
        let answer_terms = extract_key_terms(answer);
        let ground_truth_terms = extract_key_terms(ground_truth);
        let context_terms = extract_key_terms(context);

        let mut details = Details::new();
        if answer_terms.is_empty() {
            details.insert("answer_terms_count".into(), json!(0));
            details.insert(
                "ground_truth_terms_count".into(),
                json!(ground_truth_terms.len()),
            );
            details.insert("ground_truth_overlap".into(), json!(0));
            details.insert("context_overlap".into(), json!(0));
            details.insert(
                "reasoning".into(),
                json!("Empty answer, no terms to evaluate"),
            );
            return MetricResult::scored(1.0, details);
        }

        let gt_overlap = overlap(&answer_terms, &ground_truth_terms);
        let ctx_overlap = overlap(&answer_terms, &context_terms);
        let precision = gt_overlap as f64 / answer_terms.len() as f64;

        details.insert("answer_terms_count".into(), json!(answer_terms.len()));
        details.insert(
            "ground_truth_terms_count".into(),
            json!(ground_truth_terms.len()),
        );
        details.insert("ground_truth_overlap".into(), json!(gt_overlap));
        details.insert("context_overlap".into(), json!(ctx_overlap));
        details.insert(
            "precision_percentage".into(),
            json!(format!("{:.1}%", precision * 100.0)),
        );
        details.insert(
            "reasoning".into(),
            json!(format!(
                "{gt_overlap} out of {} answer terms found in ground truth",
                answer_terms.len()
            )),
        );
        MetricResult::scored(precision, details)
    }
}

impl Metric for ContextPrecisionMetric {
    fn name(&self) -> &'static str {
        "context_precision"
    }

    fn requires_ground_truth(&self) -> bool {
        true
    }

    fn compute(&self, example: &EvaluationExample<'_>) -> MetricResult {
        match example.reference() {
            Some(ground_truth) => Self::score(example.answer, example.context, ground_truth),
            None => MetricResult::missing_ground_truth(self.name()),
        }
    }
}
