//! Research graph: the pipeline behind the graph engine.
//!
//! A fixed four-stage state machine:
//!
//! ```text
//! Search -> ComposeContext -> GenerateSections (3 concurrent branches) -> Combine -> End
//! ```
//!
//! Search queries run concurrently and tolerate partial failure. The three
//! section branches run concurrently and deliver into a [`SectionCollector`];
//! if any branch fails the run fails once all branches have finished.

pub mod state;

use crate::brain::GenerationProvider;
use crate::budget::ContextTrimmer;
use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::providers::with_retry;
use crate::search::{SearchProvider, build_search_queries, dedup_results, parallel_search};
use crate::types::ChatMessage;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub use state::{
    PipelineState, SECTION_ORDER, SECTION_SPECS, SectionCollector, SectionResult, SectionSender,
    SectionSpec,
};

/// Nodes of the research graph, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    Search,
    ComposeContext,
    GenerateSections,
    Combine,
    End,
}

impl GraphNode {
    /// The node that runs after this one. `End` is terminal.
    pub fn next(self) -> Self {
        match self {
            GraphNode::Search => GraphNode::ComposeContext,
            GraphNode::ComposeContext => GraphNode::GenerateSections,
            GraphNode::GenerateSections => GraphNode::Combine,
            GraphNode::Combine | GraphNode::End => GraphNode::End,
        }
    }
}

impl std::fmt::Display for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphNode::Search => write!(f, "search"),
            GraphNode::ComposeContext => write!(f, "compose_context"),
            GraphNode::GenerateSections => write!(f, "generate_sections"),
            GraphNode::Combine => write!(f, "combine"),
            GraphNode::End => write!(f, "end"),
        }
    }
}

/// Coordinator for one engine's search-compose-generate-combine pipeline.
pub struct ResearchGraph {
    generator: Arc<dyn GenerationProvider>,
    search: Arc<dyn SearchProvider>,
    config: PipelineConfig,
    trimmer: ContextTrimmer,
}

impl ResearchGraph {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        search: Arc<dyn SearchProvider>,
        config: PipelineConfig,
    ) -> Self {
        let trimmer = ContextTrimmer::for_model(generator.model_name());
        Self {
            generator,
            search,
            config,
            trimmer,
        }
    }

    /// Run the graph to completion and return the final state.
    pub async fn run(&self, prompt: &str, date: NaiveDate) -> Result<PipelineState, EngineError> {
        let mut state = PipelineState::new(prompt, date);
        info!(
            run_id = %state.run_id,
            model = self.generator.model_name(),
            "Starting research graph"
        );
        let start = Instant::now();

        let mut node = GraphNode::Search;
        while node != GraphNode::End {
            match node {
                GraphNode::Search => self.search_node(&mut state).await,
                GraphNode::ComposeContext => self.compose_node(&mut state),
                GraphNode::GenerateSections => self.generate_node(&mut state).await?,
                GraphNode::Combine => {
                    state.combined_markdown = combine(&state.section_results);
                }
                GraphNode::End => {}
            }
            node = node.next();
        }

        info!(
            run_id = %state.run_id,
            elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
            chars = state.combined_markdown.len(),
            "Research graph finished"
        );
        Ok(state)
    }

    async fn search_node(&self, state: &mut PipelineState) {
        let queries = build_search_queries(
            &state.prompt,
            self.config.topic_chars,
            &self.config.query_suffixes,
        );
        let batches = parallel_search(self.search.as_ref(), &queries).await;
        let failed = batches.iter().filter(|b| b.is_err()).count();
        if failed > 0 {
            warn!(failed, total = batches.len(), "Some search queries failed");
        }
        state.search_context.push_str(&dedup_results(&batches));
    }

    fn compose_node(&self, state: &mut PipelineState) {
        let trimmed = self.trimmer.trim(
            &state.prompt,
            &state.search_context,
            self.config.context_fraction,
            self.generator.context_window(),
        );
        state.full_prompt = format!("{}\n\nSearch context:\n{}", state.prompt, trimmed);
    }

    async fn generate_node(&self, state: &mut PipelineState) -> Result<(), EngineError> {
        info!(branches = SECTION_SPECS.len(), "Generating sections");
        let collector = SectionCollector::with_capacity(SECTION_SPECS.len());

        let branches = SECTION_SPECS.iter().map(|spec| {
            let sender = collector.sender();
            self.generate_section(*spec, &state.full_prompt, sender)
        });
        let outcomes = futures::future::join_all(branches).await;
        state.section_results = collector.drain().await;

        match outcomes.into_iter().find_map(Result::err) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn generate_section(
        &self,
        spec: SectionSpec,
        full_prompt: &str,
        sender: SectionSender,
    ) -> Result<(), EngineError> {
        let messages = [
            ChatMessage::system(spec.system_preamble),
            ChatMessage::user(full_prompt),
        ];
        let start = Instant::now();

        let content = with_retry(&self.config.section_retry, || {
            self.generator.generate(&messages)
        })
        .await
        .map_err(|source| {
            warn!(section = spec.section_name, error = %source, "Section generation failed");
            EngineError::Section {
                section: spec.section_name.to_string(),
                source,
            }
        })?;

        info!(
            section = spec.section_name,
            chars = content.len(),
            elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
            "Section generated"
        );
        sender
            .send(SectionResult::new(spec.section_name, content))
            .await;
        Ok(())
    }
}

/// Merge section outputs in [`SECTION_ORDER`].
///
/// Missing sections count as empty; empty sections are left out of the
/// blank-line join.
pub fn combine(results: &[SectionResult]) -> String {
    let by_name: HashMap<&str, &str> = results
        .iter()
        .map(|r| (r.section_name.as_str(), r.content.as_str()))
        .collect();
    SECTION_ORDER
        .iter()
        .map(|name| by_name.get(name).copied().unwrap_or(""))
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockGenerationProvider;
    use crate::config::RetryConfig;
    use crate::error::LlmError;
    use crate::search::MockSearchProvider;
    use crate::types::{Role, SearchHit};
    use pretty_assertions::assert_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            section_retry: RetryConfig::none(),
            ..PipelineConfig::default()
        }
    }

    fn section_provider() -> MockGenerationProvider {
        MockGenerationProvider::by_system_prompt(vec![
            ("## TL;DR section", "## TL;DR\n- quiet day"),
            ("## Global Viral Events section", "## Global Viral Events\n### Launch"),
            ("## Strategic Deep Dives", "## Strategic Deep Dives\n### Dive"),
        ])
    }

    #[test]
    fn test_node_order() {
        let mut node = GraphNode::Search;
        let mut visited = vec![node];
        while node != GraphNode::End {
            node = node.next();
            visited.push(node);
        }
        assert_eq!(
            visited,
            vec![
                GraphNode::Search,
                GraphNode::ComposeContext,
                GraphNode::GenerateSections,
                GraphNode::Combine,
                GraphNode::End,
            ]
        );
        assert_eq!(GraphNode::End.next(), GraphNode::End);
    }

    #[test]
    fn test_combine_canonical_order() {
        let results = vec![
            SectionResult::new("dives_audit", "C"),
            SectionResult::new("tldr", "A"),
            SectionResult::new("events", "B"),
        ];
        assert_eq!(combine(&results), "A\n\nB\n\nC");
    }

    #[test]
    fn test_combine_only_tldr() {
        let results = vec![SectionResult::new("tldr", "## TL;DR\n- one")];
        assert_eq!(combine(&results), "## TL;DR\n- one");
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(combine(&[]), "");
    }

    #[tokio::test]
    async fn test_run_combines_all_sections() {
        let generator = Arc::new(section_provider());
        let search = Arc::new(MockSearchProvider::new().with_hits(
            "latest news today",
            vec![SearchHit::new("https://a.example", "A", "alpha news")],
        ));
        let graph = ResearchGraph::new(generator.clone(), search.clone(), config());

        let state = graph.run("AI industry report", date()).await.unwrap();

        assert_eq!(
            state.combined_markdown,
            "## TL;DR\n- quiet day\n\n## Global Viral Events\n### Launch\n\n## Strategic Deep Dives\n### Dive"
        );
        assert_eq!(state.section_results.len(), 3);
        assert_eq!(search.queries().len(), 3);
        assert!(state.search_context.contains("URL: https://a.example"));
        assert!(
            state
                .full_prompt
                .starts_with("AI industry report\n\nSearch context:\n")
        );

        let calls = generator.calls();
        assert_eq!(calls.len(), 3);
        for call in &calls {
            assert_eq!(call.len(), 2);
            assert_eq!(call[0].role, Role::System);
            assert_eq!(call[1].content, state.full_prompt);
        }
    }

    #[tokio::test]
    async fn test_run_survives_search_failures() {
        let generator = Arc::new(section_provider());
        let search = Arc::new(
            MockSearchProvider::new()
                .with_failure("latest news today", "HTTP 503")
                .with_failure("funding partnerships", "timeout"),
        );
        let graph = ResearchGraph::new(generator, search, config());
        let state = graph.run("AI", date()).await.unwrap();
        assert_eq!(state.search_context, "");
        assert!(!state.combined_markdown.is_empty());
    }

    #[tokio::test]
    async fn test_branch_failure_fails_run() {
        let generator = Arc::new(MockGenerationProvider::by_system_prompt(vec![
            ("## TL;DR section", "## TL;DR\n- ok"),
            ("## Global Viral Events section", "## Global Viral Events"),
        ]));
        let graph = ResearchGraph::new(
            generator.clone(),
            Arc::new(MockSearchProvider::new()),
            config(),
        );
        let err = graph.run("AI", date()).await.unwrap_err();
        match err {
            EngineError::Section { section, source } => {
                assert_eq!(section, "dives_audit");
                assert!(matches!(source, LlmError::EmptyResponse));
            }
            other => panic!("Expected Section error, got {other:?}"),
        }
        // The other branches still ran to completion.
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_branches_retry_transient_errors() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let failures = Arc::new(AtomicU32::new(0));
        let seen = failures.clone();
        let generator = Arc::new(MockGenerationProvider::new(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::Timeout { timeout_secs: 1 })
            } else {
                Ok("section".to_string())
            }
        }));
        let config = PipelineConfig {
            section_retry: RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
                backoff_multiplier: 1.0,
                jitter: false,
            },
            ..PipelineConfig::default()
        };
        let graph = ResearchGraph::new(generator.clone(), Arc::new(MockSearchProvider::new()), config);
        let state = graph.run("AI", date()).await.unwrap();
        assert_eq!(state.combined_markdown, "section\n\nsection\n\nsection");
        assert_eq!(generator.call_count(), 4);
    }

    #[tokio::test]
    async fn test_tiny_window_drops_search_context() {
        let generator = Arc::new(section_provider().with_context_window(10));
        let search = Arc::new(MockSearchProvider::new().with_hits(
            "latest news today",
            vec![SearchHit::new("https://a.example", "A", "alpha")],
        ));
        let graph = ResearchGraph::new(generator, search, config());
        let prompt = "a fairly long research prompt that will not fit in ten tokens of budget";
        let state = graph.run(prompt, date()).await.unwrap();
        assert_eq!(state.full_prompt, format!("{prompt}\n\nSearch context:\n"));
    }

    /// Sleeps for a fixed delay per call and tracks how many calls overlap.
    struct SlowGenerator {
        delay: std::time::Duration,
        in_flight: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GenerationProvider for SlowGenerator {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("section".into())
        }

        fn model_name(&self) -> &str {
            "slow"
        }

        fn context_window(&self) -> usize {
            128_000
        }
    }

    #[tokio::test]
    async fn test_section_branches_run_concurrently() {
        let delay = std::time::Duration::from_millis(300);
        let generator = Arc::new(SlowGenerator {
            delay,
            in_flight: Default::default(),
            peak: Default::default(),
        });
        let graph = ResearchGraph::new(
            generator.clone(),
            Arc::new(MockSearchProvider::new()),
            config(),
        );

        let start = Instant::now();
        let state = graph.run("AI", date()).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(state.section_results.len(), 3);
        assert_eq!(
            generator.peak.load(std::sync::atomic::Ordering::SeqCst),
            SECTION_SPECS.len()
        );
        assert!(
            elapsed < delay * 2,
            "three {delay:?} branches took {elapsed:?}"
        );
    }
}
