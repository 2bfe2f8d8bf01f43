//! Configuration system for Newsdesk.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/newsdesk/config.toml` and/or `.newsdesk/config.toml`
//! in the workspace directory. The composition root loads it once and passes it down.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsdeskConfig {
    /// Model used by the graph engine's section branches.
    #[serde(default)]
    pub graph_llm: LlmConfig,
    /// Model used by the direct (single-shot) engine.
    #[serde(default = "LlmConfig::gemini_default")]
    pub direct_llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for NewsdeskConfig {
    fn default() -> Self {
        Self {
            graph_llm: LlmConfig::default(),
            direct_llm: LlmConfig::gemini_default(),
            search: SearchConfig::default(),
            pipeline: PipelineConfig::default(),
            engine: EngineConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl NewsdeskConfig {
    /// Collect validation warnings from every section.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.graph_llm.validate();
        warnings.extend(self.direct_llm.validate());
        warnings.extend(self.pipeline.validate());
        warnings
    }
}

/// Generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier (e.g., "gpt-4o", "gemini-2.5-flash").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Explicit API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Context window size for the model.
    pub context_window: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            context_window: 128_000,
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Defaults for the Gemini-backed direct engine.
    pub fn gemini_default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_tokens: 8192,
            context_window: 1_048_576,
            ..Self::default()
        }
    }

    /// Resolve the API key from the explicit value or the configured env var.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.api_key_env.clone(),
            })
    }

    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_tokens >= self.context_window {
            warnings.push(format!(
                "{}: max_tokens ({}) >= context_window ({}); responses may be truncated or fail",
                self.model, self.max_tokens, self.context_window
            ));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "{}: temperature ({}) is outside the typical range 0.0-2.0",
                self.model, self.temperature
            ));
        }
        warnings
    }
}

/// Exponential backoff settings for transient provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Results requested per query.
    pub max_results: usize,
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_results: 10,
            request_timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.api_key_env.clone(),
            })
    }
}

/// Graph engine pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Share of the model window the prompt plus search context may use.
    pub context_fraction: f64,
    /// Number of leading prompt characters used as the search topic.
    pub topic_chars: usize,
    /// Suffixes appended to the topic, one search query each.
    pub query_suffixes: Vec<String>,
    /// Retry policy applied independently to each section branch.
    #[serde(default)]
    pub section_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_fraction: 0.75,
            topic_chars: 200,
            query_suffixes: vec![
                "latest news today".to_string(),
                "breakthroughs announcements".to_string(),
                "funding partnerships".to_string(),
            ],
            section_retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !(self.context_fraction > 0.0 && self.context_fraction <= 1.0) {
            warnings.push(format!(
                "pipeline.context_fraction ({}) should be in (0.0, 1.0]",
                self.context_fraction
            ));
        }
        if self.query_suffixes.is_empty() {
            warnings.push("pipeline.query_suffixes is empty; no web search will run".to_string());
        }
        warnings
    }
}

/// Engine invocation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Overall deadline for one engine invocation. `None` means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

/// Report storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub reports_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let reports_dir = directories::ProjectDirs::from("dev", "newsdesk", "newsdesk")
            .map(|d| d.data_dir().join("reports"))
            .unwrap_or_else(|| PathBuf::from(".newsdesk").join("reports"));
        Self { reports_dir }
    }
}

/// Load configuration from defaults, config files, and environment variables.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&NewsdeskConfig>,
) -> Result<NewsdeskConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(NewsdeskConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "newsdesk", "newsdesk") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".newsdesk").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (NEWSDESK_GRAPH_LLM__MODEL, NEWSDESK_ENGINE__DEADLINE_SECS, etc.)
    figment = figment.merge(Env::prefixed("NEWSDESK_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
