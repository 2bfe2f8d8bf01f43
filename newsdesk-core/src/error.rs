//! Error types for the Newsdesk core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering generation providers, search providers, engines, persistence,
//! and configuration.

use std::path::PathBuf;

/// Top-level error type for the Newsdesk core library.
#[derive(Debug, thiserror::Error)]
pub enum NewsdeskError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from generation provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from search provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed for '{query}': {message}")]
    Request { query: String, message: String },

    #[error("Search response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for search provider {provider}")]
    AuthFailed { provider: String },
}

/// Errors that fail a whole engine invocation.
///
/// These never escape the engine runner; they become the `error_message`
/// of a failed `EngineResult`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Section '{section}' generation failed: {source}")]
    Section {
        section: String,
        #[source]
        source: LlmError,
    },

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Engine produced no output")]
    EmptyOutput,

    #[error("Engine exceeded its deadline of {deadline_secs}s")]
    DeadlineExceeded { deadline_secs: u64 },

    #[error("Engine unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors from the report store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Report store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored report '{report_id}' is unreadable: {message}")]
    Corrupt { report_id: String, message: String },

    #[error("Report store unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `NewsdeskError`.
pub type Result<T> = std::result::Result<T, NewsdeskError>;
