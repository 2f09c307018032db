//! Error types for the ragmeter core library.
//!
//! Metric computation itself never fails: degenerate inputs have a defined
//! vacuous score and inapplicable metrics surface as a null score inside the
//! result. The variants here cover the remaining failure points: evaluator
//! construction, batch shape validation, configuration loading, and the
//! transport used by the judge backend.

/// Top-level error type for ragmeter operations.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(
        "Batch inputs must have equal lengths: queries={queries}, contexts={contexts}, answers={answers}{}",
        .ground_truths.map(|n| format!(", ground_truths={n}")).unwrap_or_default()
    )]
    BatchShape {
        queries: usize,
        contexts: usize,
        answers: usize,
        ground_truths: Option<usize>,
    },

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),
}

/// Errors raised while building an evaluator or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown metric name(s): {} (expected one of: {})", .invalid.join(", "), .expected.join(", "))]
    UnknownMetrics {
        invalid: Vec<String>,
        expected: Vec<&'static str>,
    },

    #[error("Missing credential: environment variable '{env_var}' is not set")]
    MissingCredential { env_var: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Errors from the model-graded judge backend.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for endpoint {endpoint}")]
    AuthFailed { endpoint: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Connection failed: {message}")]
    Connection { message: String },
}

impl JudgeError {
    /// Whether the error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JudgeError::RateLimited { .. }
                | JudgeError::Server { .. }
                | JudgeError::Connection { .. }
                | JudgeError::Timeout { .. }
        )
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ResponseParse {
            message: msg.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = EvalError> = std::result::Result<T, E>;
