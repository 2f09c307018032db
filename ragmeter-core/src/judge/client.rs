//! Transport for the judge backend.
//!
//! [`OpenAiJudgeClient`] speaks the OpenAI chat completions format, so it
//! works against OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio and any other
//! compatible endpoint.

use crate::config::{JudgeConfig, RetryConfig};
use crate::error::{ConfigError, EvalError, JudgeError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A chat model that grades one prompt at a time.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Send a system and user prompt; return the raw text of the reply.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, JudgeError>;

    /// Model identifier reported in result details.
    fn model(&self) -> &str;
}

/// OpenAI-compatible chat completions client with retry.
pub struct OpenAiJudgeClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout_secs: u64,
    retry: RetryConfig,
}

impl std::fmt::Debug for OpenAiJudgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiJudgeClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl OpenAiJudgeClient {
    /// Create a client, resolving the API key from config or environment.
    ///
    /// Local endpoints (localhost, 127.0.0.1) need no key.
    pub fn new(config: &JudgeConfig) -> Result<Self, EvalError> {
        let api_key = resolve_api_key(config)?;
        Self::new_with_key(config, api_key)
    }

    /// Create a client with an explicitly provided API key.
    pub fn new_with_key(config: &JudgeConfig, api_key: String) -> Result<Self, EvalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| JudgeError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            retry: config.retry.clone(),
        })
    }

    async fn send_once(&self, body: &Value) -> Result<String, JudgeError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Sending judge request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(map_http_error(status, &response_body, &self.base_url));
        }

        let json: Value = serde_json::from_str(&response_body)
            .map_err(|e| JudgeError::parse(format!("Invalid JSON: {e}")))?;
        extract_content(&json)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> JudgeError {
        if err.is_timeout() {
            JudgeError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if err.is_connect() {
            JudgeError::Connection {
                message: err.to_string(),
            }
        } else {
            JudgeError::ApiRequest {
                message: format!("Request failed: {err}"),
            }
        }
    }
}

#[async_trait]
impl JudgeClient for OpenAiJudgeClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, JudgeError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.temperature,
            "stream": false,
        });
        with_retry(&self.retry, || self.send_once(&body)).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Resolve the API key: inline config, then the configured env var, then a
/// dummy bearer token for local endpoints.
pub fn resolve_api_key(config: &JudgeConfig) -> Result<String, ConfigError> {
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
        return Ok(key.clone());
    }
    if let Ok(key) = std::env::var(&config.api_key_env)
        && !key.is_empty()
    {
        return Ok(key);
    }
    if config.is_local() {
        debug!("No API key set for local judge endpoint; using dummy bearer token");
        return Ok("local".to_string());
    }
    Err(ConfigError::MissingCredential {
        env_var: config.api_key_env.clone(),
    })
}

/// Pull the assistant message text out of a chat completions response.
fn extract_content(json: &Value) -> Result<String, JudgeError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| JudgeError::parse("Response has no choices[0].message.content"))
}

fn map_http_error(status: reqwest::StatusCode, body: &str, endpoint: &str) -> JudgeError {
    match status.as_u16() {
        401 | 403 => {
            debug!(body = %body, status = status.as_u16(), "Judge authentication failed");
            JudgeError::AuthFailed {
                endpoint: endpoint.to_string(),
            }
        }
        429 => JudgeError::RateLimited {
            retry_after_secs: parse_retry_after(body).unwrap_or(5),
        },
        code if code >= 500 => JudgeError::Server {
            status: code,
            message: body.to_string(),
        },
        code => JudgeError::ApiRequest {
            message: format!("HTTP {code}: {body}"),
        },
    }
}

/// Extract the delay from messages like "Rate limit reached ... try again in 20s".
fn parse_retry_after(body: &str) -> Option<u64> {
    let msg = serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()?
        .to_string();
    msg.split("in ")
        .last()
        .and_then(|s| s.trim().trim_end_matches('.').trim_end_matches('s').parse().ok())
}

/// Run `operation`, retrying transient failures with exponential backoff.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, JudgeError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, JudgeError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if !e.is_retryable() || attempt >= config.max_retries => return Err(e),
            Err(e) => {
                let backoff_ms = compute_backoff(config, attempt, &e);
                warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms,
                    error = %e,
                    "Retrying judge request after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Backoff for `attempt`, never shorter than a server-provided retry-after.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &JudgeError) -> u64 {
    let computed = exponential_backoff(config, attempt);
    match err {
        JudgeError::RateLimited { retry_after_secs } => {
            retry_after_secs.saturating_mul(1000).max(computed)
        }
        _ => computed,
    }
}

fn exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // up to 25%
        capped + (capped as f64 * 0.25 * rand::random::<f64>()) as u64
    } else {
        capped
    }
}
