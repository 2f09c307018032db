//! Terminal and JSON rendering of evaluation results.

use ragmeter_core::{AggregateScores, BatchResult, EvaluationResult};
use serde::Serialize;

/// Column width for metric names.
const NAME_WIDTH: usize = 20;

/// Contents of the `--output` JSON file.
#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub results: BatchResult,
    pub average_scores: AggregateScores,
    pub num_examples: usize,
    pub metrics: Vec<String>,
}

impl EvaluationReport {
    pub fn new(results: BatchResult, average_scores: AggregateScores, metrics: &[&str]) -> Self {
        Self {
            num_examples: results.len(),
            results,
            average_scores,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Qualitative band for an average score.
pub fn interpret(score: f64) -> &'static str {
    if score >= 0.8 {
        "Excellent"
    } else if score >= 0.6 {
        "Good"
    } else if score >= 0.4 {
        "Fair"
    } else {
        "Needs Improvement"
    }
}

pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{score:.3}"),
        None => "n/a".to_string(),
    }
}

/// One example's scores; with `details`, each metric's reasoning follows
/// its score.
pub fn render_result(label: &str, result: &EvaluationResult, details: bool) -> String {
    let mut out = format!("{label}\n");
    for (name, metric) in result {
        let mut line = format!("  {name:<NAME_WIDTH$} {}", format_score(metric.score));
        if let Some(error) = &metric.error {
            line.push_str(&format!("  ({error})"));
        }
        out.push_str(&line);
        out.push('\n');
        if details && let Some(reasoning) = metric.reasoning() {
            out.push_str(&format!("      {reasoning}\n"));
        }
    }
    out
}

/// Averages with their interpretation band.
pub fn render_averages(averages: &AggregateScores, num_examples: usize) -> String {
    let mut out = format!("Average scores over {num_examples} example(s)\n");
    for (name, average) in averages {
        let band = average.map(interpret).unwrap_or("no applicable examples");
        out.push_str(&format!(
            "  {name:<NAME_WIDTH$} {}  {band}\n",
            format_score(*average)
        ));
    }
    out
}
