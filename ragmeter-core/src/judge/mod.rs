//! Model-graded evaluation backend.
//!
//! [`JudgeEvaluator`] asks a chat model to grade each example on four
//! metrics and returns results in the same shape as the term-overlap
//! evaluator. It is optional: [`JudgeEvaluator::probe`] returns `Ok(None)`
//! unless the judge is enabled in configuration.

pub mod client;
pub mod prompts;

pub use client::{JudgeClient, OpenAiJudgeClient};

use crate::backend::EvaluationBackend;
use crate::config::JudgeConfig;
use crate::error::{ConfigError, EvalError, Result};
use crate::evaluator::{BatchResult, EvaluationResult, check_batch_shape, example_at};
use crate::metrics::{Details, EvaluationExample, MetricResult};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, future::try_join_all, stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Backend identifier written into every result's details.
pub const BACKEND_NAME: &str = "llm_judge";

/// Metrics the judge can grade, in result-map order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeMetric {
    Faithfulness,
    AnswerRelevancy,
    ContextPrecision,
    ContextRecall,
}

impl JudgeMetric {
    pub const ALL: [JudgeMetric; 4] = [
        JudgeMetric::Faithfulness,
        JudgeMetric::AnswerRelevancy,
        JudgeMetric::ContextPrecision,
        JudgeMetric::ContextRecall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JudgeMetric::Faithfulness => "faithfulness",
            JudgeMetric::AnswerRelevancy => "answer_relevancy",
            JudgeMetric::ContextPrecision => "context_precision",
            JudgeMetric::ContextRecall => "context_recall",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(JudgeMetric::as_str).collect()
    }

    pub fn requires_ground_truth(&self) -> bool {
        matches!(
            self,
            JudgeMetric::ContextPrecision | JudgeMetric::ContextRecall
        )
    }

    /// Grading prompt for `example`, or `None` when a required ground truth
    /// is missing.
    fn prompt(&self, example: &EvaluationExample<'_>) -> Option<String> {
        match (self, example.reference()) {
            (JudgeMetric::Faithfulness, _) => Some(prompts::faithfulness(example)),
            (JudgeMetric::AnswerRelevancy, _) => Some(prompts::answer_relevancy(example)),
            (JudgeMetric::ContextPrecision, Some(reference)) => {
                Some(prompts::context_precision(example, reference))
            }
            (JudgeMetric::ContextRecall, Some(reference)) => {
                Some(prompts::context_recall(example, reference))
            }
            (_, None) => None,
        }
    }
}

impl fmt::Display for JudgeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JudgeMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Evaluator that delegates grading to a chat model.
pub struct JudgeEvaluator {
    client: Arc<dyn JudgeClient>,
    metrics: Vec<JudgeMetric>,
    concurrency: usize,
}

impl fmt::Debug for JudgeEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeEvaluator")
            .field("model", &self.client.model())
            .field("metrics", &self.metrics)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl JudgeEvaluator {
    /// Judge with every metric active.
    pub fn new(client: Arc<dyn JudgeClient>) -> Self {
        Self {
            client,
            metrics: JudgeMetric::ALL.to_vec(),
            concurrency: 4,
        }
    }

    /// Restrict the active metrics. Unknown names are a configuration error.
    pub fn with_metrics<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut requested = Vec::new();
        let mut invalid = Vec::new();
        for name in names {
            match name.as_ref().parse::<JudgeMetric>() {
                Ok(metric) => requested.push(metric),
                Err(unknown) => invalid.push(unknown),
            }
        }
        if !invalid.is_empty() {
            return Err(ConfigError::UnknownMetrics {
                invalid,
                expected: JudgeMetric::names(),
            }
            .into());
        }
        self.metrics = JudgeMetric::ALL
            .into_iter()
            .filter(|m| requested.contains(m))
            .collect();
        Ok(self)
    }

    /// Maximum number of examples graded at once in a batch.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build from configuration around an existing client.
    pub fn from_config(config: &JudgeConfig, client: Arc<dyn JudgeClient>) -> Result<Self> {
        let judge = Self::new(client).with_concurrency(config.concurrency);
        match &config.metrics {
            Some(names) => judge.with_metrics(names),
            None => Ok(judge),
        }
    }

    /// Build the judge if configuration enables it.
    ///
    /// Returns `Ok(None)` when the judge is disabled, and a
    /// [`ConfigError::MissingCredential`] when it is enabled against a remote
    /// endpoint without an API key.
    pub fn probe(config: &JudgeConfig) -> Result<Option<Self>> {
        if !config.enabled {
            debug!("LLM judge disabled in configuration");
            return Ok(None);
        }
        let client = OpenAiJudgeClient::new(config)?;
        let judge = Self::from_config(config, Arc::new(client))?;
        info!(model = %config.model, base_url = %config.base_url, "LLM judge available");
        Ok(Some(judge))
    }

    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(JudgeMetric::as_str).collect()
    }

    /// Grade one example on every active metric.
    ///
    /// Metrics that need a ground truth get a null score when it is missing;
    /// a transport or parse failure on any metric fails the whole example.
    pub async fn evaluate_example(
        &self,
        example: &EvaluationExample<'_>,
    ) -> Result<EvaluationResult> {
        let graded = try_join_all(self.metrics.iter().copied().map(|metric| async move {
            let result = match metric.prompt(example) {
                Some(prompt) => self.grade(&prompt).await?,
                None => MetricResult::missing_ground_truth(metric.as_str()),
            };
            Ok::<_, EvalError>((metric.as_str().to_string(), result))
        }))
        .await?;
        Ok(graded.into_iter().collect())
    }

    async fn grade(&self, prompt: &str) -> Result<MetricResult> {
        let reply = self.client.complete(prompts::SYSTEM_PROMPT, prompt).await?;
        let verdict = prompts::parse_verdict(&reply)?;

        let mut details = Details::new();
        details.insert("reasoning".into(), json!(verdict.reasoning));
        details.insert("model".into(), json!(self.client.model()));
        details.insert("backend".into(), json!(BACKEND_NAME));
        Ok(MetricResult::scored(verdict.score, details))
    }
}

#[async_trait]
impl EvaluationBackend for JudgeEvaluator {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn metric_names(&self) -> Vec<&'static str> {
        JudgeEvaluator::metric_names(self)
    }

    async fn evaluate(
        &self,
        query: &str,
        context: &str,
        answer: &str,
        ground_truth: Option<&str>,
    ) -> Result<EvaluationResult> {
        self.evaluate_example(&EvaluationExample {
            query,
            context,
            answer,
            ground_truth,
        })
        .await
    }

    async fn evaluate_batch(
        &self,
        queries: &[String],
        contexts: &[String],
        answers: &[String],
        ground_truths: Option<&[Option<String>]>,
    ) -> Result<BatchResult> {
        let len = check_batch_shape(queries, contexts, answers, ground_truths)?;
        let start = Instant::now();

        let results: BatchResult = stream::iter(0..len)
            .map(|i| {
                let example = example_at(queries, contexts, answers, ground_truths, i);
                async move { self.evaluate_example(&example).await }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        info!(
            examples = len,
            metrics = self.metrics.len(),
            concurrency = self.concurrency,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Judge batch evaluation complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JudgeError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Reply = Box<dyn Fn(&str) -> std::result::Result<String, JudgeError> + Send + Sync>;

    /// Test client answering every prompt through a closure.
    struct MockJudgeClient {
        reply: Reply,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockJudgeClient {
        fn new(
            reply: impl Fn(&str) -> std::result::Result<String, JudgeError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                reply: Box::new(reply),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn fixed(score: f64) -> Arc<Self> {
            Self::new(move |_| Ok(format!(r#"{{"score": {score}, "reasoning": "graded"}}"#)))
        }
    }

    #[async_trait]
    impl JudgeClient for MockJudgeClient {
        async fn complete(
            &self,
            _system: &str,
            prompt: &str,
        ) -> std::result::Result<String, JudgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.reply)(prompt)
        }

        fn model(&self) -> &str {
            "mock-judge"
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in JudgeMetric::ALL {
            assert_eq!(metric.as_str().parse::<JudgeMetric>(), Ok(metric));
        }
        assert!("relevance".parse::<JudgeMetric>().is_err());
        assert!(JudgeMetric::ContextRecall.requires_ground_truth());
        assert!(!JudgeMetric::AnswerRelevancy.requires_ground_truth());
    }

    #[test]
    fn test_probe_disabled_is_absent() {
        let config = JudgeConfig::default();
        assert!(JudgeEvaluator::probe(&config).unwrap().is_none());
    }

    #[test]
    fn test_probe_enabled_without_credential_fails() {
        let config = JudgeConfig {
            enabled: true,
            api_key_env: "RAGMETER_TEST_UNSET_KEY_91C2".into(),
            ..JudgeConfig::default()
        };
        let err = JudgeEvaluator::probe(&config).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Config(ConfigError::MissingCredential { ref env_var })
                if env_var == "RAGMETER_TEST_UNSET_KEY_91C2"
        ));
    }

    #[test]
    fn test_probe_enabled_with_key() {
        let config = JudgeConfig {
            enabled: true,
            api_key: Some("sk-test".into()),
            metrics: Some(vec!["faithfulness".into(), "context_recall".into()]),
            ..JudgeConfig::default()
        };
        let judge = JudgeEvaluator::probe(&config).unwrap().unwrap();
        assert_eq!(judge.metric_names(), vec!["faithfulness", "context_recall"]);
    }

    #[test]
    fn test_probe_local_endpoint_needs_no_key() {
        let config = JudgeConfig {
            enabled: true,
            base_url: "http://localhost:11434/v1".into(),
            api_key_env: "RAGMETER_TEST_UNSET_KEY_91C2".into(),
            ..JudgeConfig::default()
        };
        assert!(JudgeEvaluator::probe(&config).unwrap().is_some());
    }

    #[test]
    fn test_unknown_judge_metric_is_config_error() {
        let err = JudgeEvaluator::new(MockJudgeClient::fixed(1.0))
            .with_metrics(["faithfulness", "relevance"])
            .unwrap_err();
        assert!(err.to_string().contains("relevance"));
    }

    #[tokio::test]
    async fn test_evaluate_with_ground_truth() {
        let client = MockJudgeClient::fixed(0.75);
        let judge = JudgeEvaluator::new(client.clone());
        let results = judge
            .evaluate(
                "What is rust?",
                "Rust is a language.",
                "A language.",
                Some("A systems language."),
            )
            .await
            .unwrap();

        let keys: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(keys, JudgeMetric::names());
        for result in results.values() {
            assert_eq!(result.score, Some(0.75));
            assert_eq!(result.details["model"], "mock-judge");
            assert_eq!(result.details["backend"], BACKEND_NAME);
            assert_eq!(result.reasoning(), Some("graded"));
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_missing_ground_truth_skips_reference_metrics() {
        let client = MockJudgeClient::fixed(0.5);
        let judge = JudgeEvaluator::new(client.clone());
        let results = judge.evaluate("q", "c", "a", Some("")).await.unwrap();

        assert_eq!(results["faithfulness"].score, Some(0.5));
        assert_eq!(results["answer_relevancy"].score, Some(0.5));
        assert_eq!(
            results["context_recall"].error.as_deref(),
            Some("Ground truth required for context recall")
        );
        assert_eq!(results["context_precision"].score, None);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| !p.contains("REFERENCE ANSWER")));
    }

    #[tokio::test]
    async fn test_unparseable_reply_fails() {
        let judge = JudgeEvaluator::new(MockJudgeClient::new(|_| Ok("no idea".into())));
        let err = judge.evaluate("q", "c", "a", None).await.unwrap_err();
        assert!(matches!(
            err,
            EvalError::Judge(JudgeError::ResponseParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_shape_checked_before_any_call() {
        let client = MockJudgeClient::fixed(1.0);
        let judge = JudgeEvaluator::new(client.clone());
        let err = judge
            .evaluate_batch(
                &strings(&["q1", "q2"]),
                &strings(&["c1", "c2"]),
                &strings(&["a1"]),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::BatchShape { answers: 1, .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        // Score depends on which answer the prompt carries.
        let client = MockJudgeClient::new(|prompt| {
            let score = if prompt.contains("answer-one") {
                0.1
            } else if prompt.contains("answer-two") {
                0.2
            } else {
                0.3
            };
            Ok(format!(r#"{{"score": {score}}}"#))
        });
        let judge = JudgeEvaluator::new(client)
            .with_metrics(["faithfulness"])
            .unwrap()
            .with_concurrency(3);

        let answers = strings(&["answer-one", "answer-two", "answer-three"]);
        let batch = judge
            .evaluate_batch(
                &strings(&["q", "q", "q"]),
                &strings(&["c", "c", "c"]),
                &answers,
                None,
            )
            .await
            .unwrap();

        let scores: Vec<Option<f64>> = batch.iter().map(|r| r["faithfulness"].score).collect();
        assert_eq!(scores, vec![Some(0.1), Some(0.2), Some(0.3)]);

        let averages = judge.get_average_scores(&batch);
        assert!((averages["faithfulness"].unwrap() - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_batch_fails_on_any_transport_error() {
        let client = MockJudgeClient::new(|prompt| {
            if prompt.contains("broken") {
                Err(JudgeError::AuthFailed {
                    endpoint: "mock".into(),
                })
            } else {
                Ok(r#"{"score": 1.0}"#.into())
            }
        });
        let judge = JudgeEvaluator::new(client);
        let err = judge
            .evaluate_batch(
                &strings(&["q", "q"]),
                &strings(&["c", "c"]),
                &strings(&["fine", "broken"]),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Judge(JudgeError::AuthFailed { .. })));
    }
}
