//! Grading prompts and reply parsing.

use crate::error::JudgeError;
use crate::metrics::EvaluationExample;
use serde_json::Value;

pub const SYSTEM_PROMPT: &str = "You are a strict evaluator of retrieval-augmented generation \
systems. Grade exactly what you are asked to grade and reply with a single JSON object.";

const RESPONSE_FORMAT: &str = r#"Respond in JSON:
{
  "score": <float 0-1>,
  "reasoning": "<one or two sentences>"
}"#;

pub fn faithfulness(example: &EvaluationExample<'_>) -> String {
    format!(
        r#"Evaluate if the answer is faithful to the context (no hallucinations).

CONTEXT:
{context}

ANSWER:
{answer}

Break the answer into individual claims and check each one against the context.
The score is the fraction of claims that the context supports. An empty answer
makes no claims and scores 1.

{RESPONSE_FORMAT}"#,
        context = example.context,
        answer = example.answer,
    )
}

pub fn answer_relevancy(example: &EvaluationExample<'_>) -> String {
    format!(
        r#"Evaluate how relevant the answer is to the question.

QUESTION:
{question}

ANSWER:
{answer}

Consider whether the answer directly addresses the question, whether it is
complete, and whether it contains unnecessary information.

{RESPONSE_FORMAT}"#,
        question = example.query,
        answer = example.answer,
    )
}

pub fn context_precision(example: &EvaluationExample<'_>, reference: &str) -> String {
    format!(
        r#"Evaluate the precision of the retrieved context for answering the question.

QUESTION:
{question}

RETRIEVED CONTEXT:
{context}

REFERENCE ANSWER:
{reference}

Judge how much of the retrieved context is useful for arriving at the reference
answer. Irrelevant or distracting passages lower the score.

{RESPONSE_FORMAT}"#,
        question = example.query,
        context = example.context,
    )
}

pub fn context_recall(example: &EvaluationExample<'_>, reference: &str) -> String {
    format!(
        r#"Evaluate if all necessary context was retrieved to answer the question.

QUESTION:
{question}

RETRIEVED CONTEXT:
{context}

REFERENCE ANSWER:
{reference}

Split the reference answer into statements and decide for each whether it can
be attributed to the retrieved context. The score is the attributable fraction.

{RESPONSE_FORMAT}"#,
        question = example.query,
        context = example.context,
    )
}

/// A parsed grading reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub reasoning: String,
}

/// Parse the first JSON object in `reply` into a [`Verdict`].
///
/// Models often wrap JSON in prose or code fences, so leading and trailing
/// text is ignored. The score is clamped into `[0, 1]`.
pub fn parse_verdict(reply: &str) -> Result<Verdict, JudgeError> {
    let object = first_json_object(reply)
        .ok_or_else(|| JudgeError::parse(format!("No JSON object in judge reply: {reply}")))?;

    let score = match object.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| JudgeError::parse(format!("Judge reply has no numeric score: {object}")))?;

    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Verdict {
        score: score.clamp(0.0, 1.0),
        reasoning,
    })
}

fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}
