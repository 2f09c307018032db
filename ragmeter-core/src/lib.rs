//! # ragmeter-core: scoring engine for retrieval-augmented generation
//!
//! Scores a generated answer against the query that prompted it, the
//! retrieved context it was generated from, and an optional reference
//! answer. Three term-overlap metrics ship built in:
//!
//! - **faithfulness**: fraction of answer sentences grounded in the context
//! - **context_precision**: fraction of answer terms found in the ground truth
//! - **relevance**: weighted overlap with the query and the context
//!
//! A model-graded alternative lives in [`judge`]; both implement
//! [`EvaluationBackend`].
//!
//! ```
//! use ragmeter_core::RagEvaluator;
//!
//! let evaluator = RagEvaluator::new();
//! let results = evaluator.evaluate(
//!     "What is photosynthesis?",
//!     "Photosynthesis converts sunlight into chemical energy.",
//!     "Photosynthesis converts sunlight into energy.",
//!     None,
//! );
//! assert_eq!(results["faithfulness"].score, Some(1.0));
//! assert_eq!(results["context_precision"].score, None);
//! ```

// Foundation
pub mod config;
pub mod error;
pub mod terms;

// Scoring
pub mod evaluator;
pub mod metrics;

// Backends
pub mod backend;
pub mod judge;

// Re-exports
pub use backend::EvaluationBackend;
pub use config::{
    ConfigOverrides, EvalConfig, JudgeConfig, JudgeOverrides, RetryConfig, load_config,
};
pub use error::{ConfigError, EvalError, JudgeError};
pub use evaluator::{AggregateScores, BatchResult, EvaluationResult, RagEvaluator};
pub use judge::{JudgeEvaluator, JudgeMetric};
pub use metrics::{EvaluationExample, Metric, MetricKind, MetricResult};
pub use terms::extract_key_terms;
