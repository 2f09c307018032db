//! Scoring metrics and the types they share.
//!
//! Every metric implements [`Metric`] and receives the full
//! [`EvaluationExample`], reading only the fields it needs. The set of
//! built-in metrics is fixed by [`MetricKind`]; its declaration order is the
//! registry order used for result maps.

pub mod context_precision;
pub mod faithfulness;
pub mod relevance;

pub use context_precision::ContextPrecisionMetric;
pub use faithfulness::FaithfulnessMetric;
pub use relevance::RelevanceMetric;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Ordered diagnostic fields attached to a metric result.
pub type Details = IndexMap<String, Value>;

/// One example to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationExample<'a> {
    pub query: &'a str,
    pub context: &'a str,
    pub answer: &'a str,
    pub ground_truth: Option<&'a str>,
}

impl<'a> EvaluationExample<'a> {
    pub fn new(query: &'a str, context: &'a str, answer: &'a str) -> Self {
        Self {
            query,
            context,
            answer,
            ground_truth: None,
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: &'a str) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    /// The ground truth, treating an empty string the same as an absent one.
    pub fn reference(&self) -> Option<&'a str> {
        self.ground_truth.filter(|gt| !gt.is_empty())
    }
}

/// Outcome of one metric on one example.
///
/// `score` is `None` exactly when the metric could not be computed, and in
/// that case `error` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub details: Details,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricResult {
    /// A computed score, clamped into `[0, 1]`.
    pub fn scored(score: f64, details: Details) -> Self {
        Self {
            score: Some(score.clamp(0.0, 1.0)),
            details,
            error: None,
        }
    }

    /// A metric that could not be applied to the example.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            score: None,
            details: Details::new(),
            error: Some(error.into()),
        }
    }

    /// The standard result for a metric that needs a ground truth it did not get.
    pub fn missing_ground_truth(metric_name: &str) -> Self {
        Self::unavailable(format!(
            "Ground truth required for {}",
            metric_name.replace('_', " ")
        ))
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// The `reasoning` detail, if the metric produced one.
    pub fn reasoning(&self) -> Option<&str> {
        self.details.get("reasoning").and_then(Value::as_str)
    }
}

/// Capability shared by all scoring metrics.
pub trait Metric: Send + Sync {
    /// Canonical snake_case name, used as the result-map key.
    fn name(&self) -> &'static str;

    /// Whether the metric is meaningless without a ground truth.
    ///
    /// The evaluator never calls [`Metric::compute`] for such a metric when
    /// the example carries no ground truth.
    fn requires_ground_truth(&self) -> bool {
        false
    }

    /// Score one example. Never fails on string content.
    fn compute(&self, example: &EvaluationExample<'_>) -> MetricResult;
}

/// The built-in metrics, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Faithfulness,
    ContextPrecision,
    Relevance,
}

impl MetricKind {
    /// Every registered metric, in registry order.
    pub const ALL: [MetricKind; 3] = [
        MetricKind::Faithfulness,
        MetricKind::ContextPrecision,
        MetricKind::Relevance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Faithfulness => "faithfulness",
            MetricKind::ContextPrecision => "context_precision",
            MetricKind::Relevance => "relevance",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(MetricKind::as_str).collect()
    }

    /// Instantiate the metric for this kind.
    pub fn build(&self) -> Box<dyn Metric> {
        match self {
            MetricKind::Faithfulness => Box::new(FaithfulnessMetric::new()),
            MetricKind::ContextPrecision => Box::new(ContextPrecisionMetric::new()),
            MetricKind::Relevance => Box::new(RelevanceMetric::new()),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
