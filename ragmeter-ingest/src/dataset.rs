//! The loaded form of an evaluation file.

use crate::error::IngestError;
use ragmeter_core::metrics::EvaluationExample;
use serde::{Deserialize, Serialize};

/// One row of an evaluation file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub query: String,
    pub context: String,
    pub answer: String,
    pub ground_truth: Option<String>,
}

impl EvaluationRecord {
    /// Build a record; an empty ground truth is stored as `None`.
    pub fn new(
        query: impl Into<String>,
        context: impl Into<String>,
        answer: impl Into<String>,
        ground_truth: impl Into<String>,
    ) -> Self {
        let ground_truth = ground_truth.into();
        Self {
            query: query.into(),
            context: context.into(),
            answer: answer.into(),
            ground_truth: (!ground_truth.is_empty()).then_some(ground_truth),
        }
    }
}

/// Four parallel, equal-length columns ready for batch evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationDataset {
    pub queries: Vec<String>,
    pub contexts: Vec<String>,
    pub answers: Vec<String>,
    pub ground_truths: Vec<Option<String>>,
}

impl EvaluationDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EvaluationRecord) {
        self.queries.push(record.query);
        self.contexts.push(record.context);
        self.answers.push(record.answer);
        self.ground_truths.push(record.ground_truth);
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Check that all four columns have the same length.
    pub fn validate(&self) -> Result<(), IngestError> {
        let n = self.queries.len();
        if self.contexts.len() != n || self.answers.len() != n || self.ground_truths.len() != n {
            return Err(IngestError::invalid(format!(
                "column lengths differ: queries={n}, contexts={}, answers={}, ground_truths={}",
                self.contexts.len(),
                self.answers.len(),
                self.ground_truths.len()
            )));
        }
        Ok(())
    }

    /// Whether any row carries a ground truth.
    pub fn has_ground_truths(&self) -> bool {
        self.ground_truths.iter().any(Option::is_some)
    }

    /// Borrow the rows as evaluation examples.
    pub fn examples(&self) -> impl Iterator<Item = EvaluationExample<'_>> {
        self.queries
            .iter()
            .zip(&self.contexts)
            .zip(&self.answers)
            .zip(&self.ground_truths)
            .map(|(((query, context), answer), ground_truth)| EvaluationExample {
                query: query.as_str(),
                context: context.as_str(),
                answer: answer.as_str(),
                ground_truth: ground_truth.as_deref(),
            })
    }
}

impl FromIterator<EvaluationRecord> for EvaluationDataset {
    fn from_iter<I: IntoIterator<Item = EvaluationRecord>>(iter: I) -> Self {
        let mut dataset = Self::new();
        for record in iter {
            dataset.push(record);
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ground_truth_becomes_none() {
        let record = EvaluationRecord::new("q", "c", "a", "");
        assert_eq!(record.ground_truth, None);
        let record = EvaluationRecord::new("q", "c", "a", "gt");
        assert_eq!(record.ground_truth.as_deref(), Some("gt"));
    }

    #[test]
    fn test_collect_and_validate() {
        let dataset: EvaluationDataset = vec![
            EvaluationRecord::new("q1", "c1", "a1", "g1"),
            EvaluationRecord::new("q2", "c2", "a2", ""),
        ]
        .into_iter()
        .collect();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.validate().is_ok());
        assert!(dataset.has_ground_truths());

        let examples: Vec<_> = dataset.examples().collect();
        assert_eq!(examples[0].ground_truth, Some("g1"));
        assert_eq!(examples[1].ground_truth, None);
        assert_eq!(examples[1].answer, "a2");
    }

    #[test]
    fn test_validate_rejects_ragged_columns() {
        let dataset = EvaluationDataset {
            queries: vec!["q".into()],
            contexts: vec![],
            answers: vec!["a".into()],
            ground_truths: vec![None],
        };
        let err = dataset.validate().unwrap_err();
        assert!(err.to_string().contains("contexts=0"));
    }
}
