//! Backend abstraction shared by the term-overlap evaluator and the judge.
//!
//! Callers that should work with either backend hold a
//! `Box<dyn EvaluationBackend>`; result shapes are identical.

use crate::error::Result;
use crate::evaluator::{
    AggregateScores, BatchResult, EvaluationResult, RagEvaluator, average_scores,
};
use async_trait::async_trait;

/// An interchangeable scoring backend.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    /// Short identifier, e.g. `"heuristic"` or `"llm_judge"`.
    fn name(&self) -> &'static str;

    /// Names of the active metrics, in result-map order.
    fn metric_names(&self) -> Vec<&'static str>;

    /// Score a single example.
    async fn evaluate(
        &self,
        query: &str,
        context: &str,
        answer: &str,
        ground_truth: Option<&str>,
    ) -> Result<EvaluationResult>;

    /// Score parallel arrays of inputs. Lengths are validated before any
    /// example is scored.
    async fn evaluate_batch(
        &self,
        queries: &[String],
        contexts: &[String],
        answers: &[String],
        ground_truths: Option<&[Option<String>]>,
    ) -> Result<BatchResult>;

    /// Mean of each active metric's non-null scores.
    fn get_average_scores(&self, batch_results: &[EvaluationResult]) -> AggregateScores {
        average_scores(self.metric_names(), batch_results)
    }
}

#[async_trait]
impl EvaluationBackend for RagEvaluator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn metric_names(&self) -> Vec<&'static str> {
        RagEvaluator::metric_names(self)
    }

    async fn evaluate(
        &self,
        query: &str,
        context: &str,
        answer: &str,
        ground_truth: Option<&str>,
    ) -> Result<EvaluationResult> {
        Ok(RagEvaluator::evaluate(
            self,
            query,
            context,
            answer,
            ground_truth,
        ))
    }

    async fn evaluate_batch(
        &self,
        queries: &[String],
        contexts: &[String],
        answers: &[String],
        ground_truths: Option<&[Option<String>]>,
    ) -> Result<BatchResult> {
        RagEvaluator::evaluate_batch(self, queries, contexts, answers, ground_truths)
    }
}
