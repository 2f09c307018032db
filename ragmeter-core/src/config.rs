//! Configuration for ragmeter.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Metrics to activate; all registered metrics when unset.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    /// Reject unknown metric names instead of ignoring them.
    #[serde(default = "default_true")]
    pub strict_metrics: bool,
    /// Score batches on the rayon thread pool.
    #[serde(default)]
    pub parallel: bool,
    /// Model-graded judge backend.
    #[serde(default)]
    pub judge: JudgeConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            metrics: None,
            strict_metrics: true,
            parallel: false,
            judge: JudgeConfig::default(),
        }
    }
}

/// Configuration for the LLM judge backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// The judge is only available when explicitly enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature for grading requests.
    #[serde(default)]
    pub temperature: f32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum examples graded at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Judge metrics to activate; all when unset.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key: None,
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            metrics: None,
            retry: RetryConfig::default(),
        }
    }
}

impl JudgeConfig {
    /// Whether the endpoint is a local server that needs no credential.
    pub fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }
}

/// Explicit settings applied on top of every other layer.
///
/// Only the fields that are `Some` are merged, so anything left unset keeps
/// the value from the config files or the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_metrics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
    #[serde(default, skip_serializing_if = "JudgeOverrides::is_empty")]
    pub judge: JudgeOverrides,
}

/// Partial judge settings for [`ConfigOverrides`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

impl JudgeOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Exponential backoff settings for judge requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay.
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "ragmeter", "ragmeter")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ragmeter").join("config.toml")
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<EvalConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(EvalConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // RAGMETER_STRICT_METRICS, RAGMETER_JUDGE__MODEL, ...
    figment = figment.merge(Env::prefixed("RAGMETER_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: EvalConfig = figment.extract().map_err(Box::new)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &EvalConfig) -> Result<(), ConfigError> {
    if config.judge.concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "judge.concurrency".into(),
            reason: "must be at least 1".into(),
        });
    }
    if config.judge.timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            field: "judge.timeout_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    if !(0.0..=2.0).contains(&config.judge.temperature) {
        return Err(ConfigError::InvalidValue {
            field: "judge.temperature".into(),
            reason: format!("{} is outside 0.0..=2.0", config.judge.temperature),
        });
    }
    Ok(())
}
