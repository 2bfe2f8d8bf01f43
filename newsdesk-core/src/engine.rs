//! Research engines.
//!
//! Both engines take the same prompt and return raw report markdown:
//! - [`DirectEngine`] asks one generation provider for the whole report.
//! - [`GraphEngine`] runs the [`ResearchGraph`] pipeline.

use crate::brain::GenerationProvider;
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::EngineError;
use crate::graph::ResearchGraph;
use crate::providers::with_retry;
use crate::search::SearchProvider;
use crate::types::{ChatMessage, EngineKind};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

/// A backend that turns a research prompt into report markdown.
#[async_trait]
pub trait ResearchEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn research(&self, prompt: &str, date: NaiveDate) -> Result<String, EngineError>;
}

/// Single-shot generation with the prompt as the only user message.
pub struct DirectEngine {
    provider: Arc<dyn GenerationProvider>,
    retry: RetryConfig,
}

impl DirectEngine {
    pub fn new(provider: Arc<dyn GenerationProvider>, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }
}

#[async_trait]
impl ResearchEngine for DirectEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Direct
    }

    async fn research(&self, prompt: &str, _date: NaiveDate) -> Result<String, EngineError> {
        info!(model = self.provider.model_name(), "Starting direct research");
        let messages = [ChatMessage::user(prompt)];
        let text = with_retry(&self.retry, || self.provider.generate(&messages)).await?;
        Ok(text)
    }
}

/// Search, compose, three-way section fan-out, combine.
pub struct GraphEngine {
    graph: ResearchGraph,
}

impl GraphEngine {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        search: Arc<dyn SearchProvider>,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            graph: ResearchGraph::new(generator, search, pipeline),
        }
    }
}

#[async_trait]
impl ResearchEngine for GraphEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Graph
    }

    async fn research(&self, prompt: &str, date: NaiveDate) -> Result<String, EngineError> {
        let state = self.graph.run(prompt, date).await?;
        Ok(state.combined_markdown)
    }
}

/// Stand-in for an engine whose provider could not be built.
///
/// Every call fails with the construction error, so the run still records
/// a failed result for this engine.
pub struct UnavailableEngine {
    kind: EngineKind,
    reason: String,
}

impl UnavailableEngine {
    pub fn new(kind: EngineKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ResearchEngine for UnavailableEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn research(&self, _prompt: &str, _date: NaiveDate) -> Result<String, EngineError> {
        Err(EngineError::Unavailable {
            reason: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockGenerationProvider;
    use crate::error::LlmError;
    use crate::search::MockSearchProvider;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
    }

    #[tokio::test]
    async fn test_direct_engine_sends_prompt_once() {
        let provider = Arc::new(MockGenerationProvider::with_response("## TL;DR\n- hi"));
        let engine = DirectEngine::new(provider.clone(), RetryConfig::none());
        let out = engine.research("the prompt", date()).await.unwrap();
        assert_eq!(out, "## TL;DR\n- hi");
        assert_eq!(engine.kind(), EngineKind::Direct);

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![ChatMessage::user("the prompt")]);
    }

    #[tokio::test]
    async fn test_direct_engine_propagates_failure() {
        let engine = DirectEngine::new(
            Arc::new(MockGenerationProvider::failing("quota")),
            RetryConfig::none(),
        );
        let err = engine.research("p", date()).await.unwrap_err();
        assert!(matches!(err, EngineError::Generation(LlmError::ApiRequest { .. })));
    }

    #[tokio::test]
    async fn test_graph_engine_returns_combined_markdown() {
        let engine = GraphEngine::new(
            Arc::new(MockGenerationProvider::with_response("part")),
            Arc::new(MockSearchProvider::new()),
            PipelineConfig {
                section_retry: RetryConfig::none(),
                ..PipelineConfig::default()
            },
        );
        assert_eq!(engine.kind(), EngineKind::Graph);
        let out = engine.research("p", date()).await.unwrap();
        assert_eq!(out, "part\n\npart\n\npart");
    }

    #[tokio::test]
    async fn test_unavailable_engine_reports_reason() {
        let engine = UnavailableEngine::new(EngineKind::Direct, "GEMINI_API_KEY not set");
        assert_eq!(engine.kind(), EngineKind::Direct);
        let err = engine.research("p", date()).await.unwrap_err();
        assert_eq!(err.to_string(), "Engine unavailable: GEMINI_API_KEY not set");
    }
}
