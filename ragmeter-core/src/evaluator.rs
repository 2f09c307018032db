//! The evaluator: selects metrics, dispatches examples, aggregates scores.

use crate::config::EvalConfig;
use crate::error::{ConfigError, EvalError, Result};
use crate::metrics::{EvaluationExample, Metric, MetricKind, MetricResult};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-metric results for one example, in registry order.
pub type EvaluationResult = IndexMap<String, MetricResult>;

/// One [`EvaluationResult`] per input example, in input order.
pub type BatchResult = Vec<EvaluationResult>;

/// Mean score per metric; `None` when no example produced a score.
pub type AggregateScores = IndexMap<String, Option<f64>>;

/// Term-overlap evaluator over a fixed set of active metrics.
///
/// The active set is chosen at construction and never changes afterwards.
/// The evaluator holds no other state, so one instance can score any number
/// of examples from any number of threads.
pub struct RagEvaluator {
    metrics: Vec<Box<dyn Metric>>,
}

impl Default for RagEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RagEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEvaluator")
            .field("metrics", &self.metric_names())
            .finish()
    }
}

impl RagEvaluator {
    /// Evaluator with every registered metric active.
    pub fn new() -> Self {
        Self::from_kinds(&MetricKind::ALL)
    }

    /// Evaluator restricted to the named metrics.
    ///
    /// Fails with [`ConfigError::UnknownMetrics`] listing every name that is
    /// not registered.
    pub fn with_metrics<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (kinds, invalid) = resolve_names(names);
        if !invalid.is_empty() {
            return Err(ConfigError::UnknownMetrics {
                invalid,
                expected: MetricKind::names(),
            }
            .into());
        }
        Ok(Self::from_kinds(&kinds))
    }

    /// Evaluator restricted to the named metrics, silently skipping names
    /// that are not registered.
    pub fn with_metrics_lenient<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (kinds, invalid) = resolve_names(names);
        if !invalid.is_empty() {
            warn!(dropped = ?invalid, "Ignoring unknown metric names");
        }
        Self::from_kinds(&kinds)
    }

    /// Build from configuration, honouring `strict_metrics`.
    pub fn from_config(config: &EvalConfig) -> Result<Self> {
        match &config.metrics {
            None => Ok(Self::new()),
            Some(names) if config.strict_metrics => Self::with_metrics(names),
            Some(names) => Ok(Self::with_metrics_lenient(names)),
        }
    }

    fn from_kinds(kinds: &[MetricKind]) -> Self {
        let metrics = MetricKind::ALL
            .iter()
            .filter(|kind| kinds.contains(kind))
            .map(MetricKind::build)
            .collect();
        Self { metrics }
    }

    /// Names of the active metrics, in registry order.
    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    /// Score a single example with every active metric.
    pub fn evaluate(
        &self,
        query: &str,
        context: &str,
        answer: &str,
        ground_truth: Option<&str>,
    ) -> EvaluationResult {
        self.evaluate_example(&EvaluationExample {
            query,
            context,
            answer,
            ground_truth,
        })
    }

    /// Score a single example with every active metric.
    ///
    /// Metrics that need a ground truth are not invoked when the example has
    /// none; they get a null score with an explanatory error instead, and the
    /// remaining metrics are unaffected.
    pub fn evaluate_example(&self, example: &EvaluationExample<'_>) -> EvaluationResult {
        let mut results = EvaluationResult::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            let result = if metric.requires_ground_truth() && example.reference().is_none() {
                MetricResult::missing_ground_truth(metric.name())
            } else {
                metric.compute(example)
            };
            debug!(metric = metric.name(), score = ?result.score, "Metric computed");
            results.insert(metric.name().to_string(), result);
        }
        results
    }

    /// Score a slice of examples, preserving order.
    pub fn evaluate_examples(&self, examples: &[EvaluationExample<'_>]) -> BatchResult {
        examples.iter().map(|e| self.evaluate_example(e)).collect()
    }

    /// Score parallel arrays of inputs, index by index.
    ///
    /// All arrays must have the same length; a mismatch is rejected before
    /// anything is scored. A missing `ground_truths` means no example has one.
    pub fn evaluate_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        contexts: &[S],
        answers: &[S],
        ground_truths: Option<&[Option<S>]>,
    ) -> Result<BatchResult> {
        let len = check_batch_shape(queries, contexts, answers, ground_truths)?;
        let start = Instant::now();

        let results: BatchResult = (0..len)
            .map(|i| {
                self.evaluate_example(&example_at(queries, contexts, answers, ground_truths, i))
            })
            .collect();

        info!(
            examples = len,
            metrics = self.metrics.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch evaluation complete"
        );
        Ok(results)
    }

    /// Same as [`RagEvaluator::evaluate_batch`], scoring examples on the rayon
    /// thread pool. Output order matches input order.
    pub fn evaluate_batch_parallel<S: AsRef<str> + Sync>(
        &self,
        queries: &[S],
        contexts: &[S],
        answers: &[S],
        ground_truths: Option<&[Option<S>]>,
    ) -> Result<BatchResult> {
        let len = check_batch_shape(queries, contexts, answers, ground_truths)?;
        let start = Instant::now();

        let results: BatchResult = (0..len)
            .into_par_iter()
            .map(|i| {
                self.evaluate_example(&example_at(queries, contexts, answers, ground_truths, i))
            })
            .collect();

        info!(
            examples = len,
            metrics = self.metrics.len(),
            threads = rayon::current_num_threads(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Parallel batch evaluation complete"
        );
        Ok(results)
    }

    /// Mean of each active metric's non-null scores across a batch.
    pub fn get_average_scores(&self, batch_results: &[EvaluationResult]) -> AggregateScores {
        average_scores(self.metric_names(), batch_results)
    }
}

/// Split requested names into recognised kinds and unknown names.
fn resolve_names<I, S>(names: I) -> (Vec<MetricKind>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut kinds = Vec::new();
    let mut invalid = Vec::new();
    for name in names {
        let name = name.as_ref();
        match name.parse::<MetricKind>() {
            Ok(kind) => kinds.push(kind),
            Err(unknown) => invalid.push(unknown),
        }
    }
    (kinds, invalid)
}

pub(crate) fn example_at<'a, S: AsRef<str>>(
    queries: &'a [S],
    contexts: &'a [S],
    answers: &'a [S],
    ground_truths: Option<&'a [Option<S>]>,
    i: usize,
) -> EvaluationExample<'a> {
    EvaluationExample {
        query: queries[i].as_ref(),
        context: contexts[i].as_ref(),
        answer: answers[i].as_ref(),
        ground_truth: ground_truths.and_then(|gts| gts[i].as_ref().map(AsRef::as_ref)),
    }
}

/// Validate that all batch arrays have one length, returning it.
pub(crate) fn check_batch_shape<S>(
    queries: &[S],
    contexts: &[S],
    answers: &[S],
    ground_truths: Option<&[Option<S>]>,
) -> Result<usize> {
    let len = queries.len();
    let gt_len = ground_truths.map(<[Option<S>]>::len);
    if contexts.len() != len || answers.len() != len || gt_len.is_some_and(|n| n != len) {
        return Err(EvalError::BatchShape {
            queries: len,
            contexts: contexts.len(),
            answers: answers.len(),
            ground_truths: gt_len,
        });
    }
    Ok(len)
}

/// Average every named metric's non-null scores over `batch_results`.
///
/// A metric with no scores anywhere in the batch (including an empty batch)
/// maps to `None`.
pub fn average_scores<'a, I>(
    metric_names: I,
    batch_results: &[EvaluationResult],
) -> AggregateScores
where
    I: IntoIterator<Item = &'a str>,
{
    metric_names
        .into_iter()
        .map(|name| {
            let scores: Vec<f64> = batch_results
                .iter()
                .filter_map(|result| result.get(name).and_then(|r| r.score))
                .collect();
            let mean = (!scores.is_empty())
                .then(|| scores.iter().sum::<f64>() / scores.len() as f64);
            (name.to_string(), mean)
        })
        .collect()
}
