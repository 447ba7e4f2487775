use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Not found: {0}")]
    #[diagnostic(code(microplan::not_found))]
    NotFound(String),

    #[error("Invalid format: {0}")]
    #[diagnostic(code(microplan::invalid_format))]
    InvalidFormat(String),

    #[error("Malformed completion response: {0}")]
    #[diagnostic(code(microplan::malformed_response))]
    MalformedResponse(String),

    #[error("Completion response contained no valid schedule entries")]
    #[diagnostic(code(microplan::empty_schedule))]
    EmptySchedule,

    #[error("Completion service unavailable: {0}")]
    #[diagnostic(code(microplan::completion_unavailable))]
    CompletionUnavailable(String),

    #[error("Schedule partially applied; unrealized titles: {}", .failed.join(", "))]
    #[diagnostic(code(microplan::partial_apply))]
    PartialApplyFailure { failed: Vec<String> },

    #[error("Document store error: {0}")]
    #[diagnostic(code(microplan::store))]
    Store(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(microplan::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(microplan::config))]
    Config(String),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(microplan::serialization))]
    Serialization(String),

    #[error(transparent)]
    #[diagnostic(code(microplan::io))]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create not-found errors
pub fn not_found(what: &str) -> Error {
    Error::NotFound(what.to_string())
}

/// Helper to create invalid-format errors
pub fn invalid_format(message: &str) -> Error {
    Error::InvalidFormat(message.to_string())
}

/// Helper to create document store errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}

/// Helper to create configuration errors
#[allow(dead_code)]
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}
