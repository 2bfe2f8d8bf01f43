//! Brain module: generation provider abstraction and token counting.
//!
//! Defines the `GenerationProvider` trait that both research engines call,
//! the tiktoken-backed `TokenCounter`, and a scriptable mock provider for tests.

use crate::error::LlmError;
use crate::types::{ChatMessage, Role};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

/// Trait for text generation providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for an ordered list of messages.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Return the context window size for this provider/model.
    fn context_window(&self) -> usize;
}

/// Encoders built so far, keyed by model name.
static BPE_CACHE: LazyLock<Mutex<HashMap<String, Arc<tiktoken_rs::CoreBPE>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Token counter using tiktoken-rs for BPE tokenization.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<tiktoken_rs::CoreBPE>,
}

impl TokenCounter {
    /// Create a token counter for the given model.
    /// Falls back to cl100k_base if the model isn't recognized.
    ///
    /// The encoder for each model is built once per process and shared.
    pub fn for_model(model: &str) -> Self {
        let mut cache = BPE_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
        let bpe = cache
            .entry(model.to_string())
            .or_insert_with(|| {
                Arc::new(tiktoken_rs::get_bpe_from_model(model).unwrap_or_else(|_| {
                    tiktoken_rs::cl100k_base().expect("cl100k_base should be available")
                }))
            })
            .clone();
        Self { bpe }
    }

    /// Count the number of tokens in a string. Empty text is zero tokens.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Count tokens in `text` under the tokenization scheme of `model_hint`.
pub fn count_tokens(text: &str, model_hint: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    TokenCounter::for_model(model_hint).count(text)
}

type Responder = dyn Fn(&[ChatMessage]) -> Result<String, LlmError> + Send + Sync;

/// A mock provider for tests.
///
/// Answers every call through a responder closure and records the messages
/// it received.
pub struct MockGenerationProvider {
    model: String,
    context_window: usize,
    responder: Arc<Responder>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockGenerationProvider {
    /// Create a mock answering through `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            model: "mock-model".to_string(),
            context_window: 128_000,
            responder: Arc::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Create a mock whose every call fails with an API error.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| {
            Err(LlmError::ApiRequest {
                message: message.clone(),
            })
        })
    }

    /// Create a mock that picks its answer by the system message.
    ///
    /// The first rule whose needle occurs in the system message wins;
    /// messages that match no rule get an empty response error.
    pub fn by_system_prompt(rules: Vec<(&str, &str)>) -> Self {
        let rules: Vec<(String, String)> = rules
            .into_iter()
            .map(|(needle, answer)| (needle.to_string(), answer.to_string()))
            .collect();
        Self::new(move |messages| {
            let system = messages
                .iter()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .unwrap_or("");
            rules
                .iter()
                .find(|(needle, _)| system.contains(needle.as_str()))
                .map(|(_, answer)| answer.clone())
                .ok_or(LlmError::EmptyResponse)
        })
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    /// All message lists received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        (self.responder)(messages)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }
}
