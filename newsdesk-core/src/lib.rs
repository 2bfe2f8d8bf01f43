//! # Newsdesk Core
//!
//! Core library for Newsdesk, a dual-engine daily AI intelligence briefing.
//! Provides the generation and search provider seams, token budgeting, the
//! research graph, the engine runner and orchestrator, section extraction,
//! report storage, configuration, and fundamental types.

pub mod brain;
pub mod budget;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod runner;
pub mod search;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{GenerationProvider, MockGenerationProvider, TokenCounter, count_tokens};
pub use budget::{ContextTrimmer, trim_context};
pub use config::{NewsdeskConfig, load_config};
pub use engine::{DirectEngine, GraphEngine, ResearchEngine, UnavailableEngine};
pub use error::{
    ConfigError, EngineError, LlmError, NewsdeskError, Result, SearchError, StoreError,
};
pub use extractor::extract_sections;
pub use graph::{ResearchGraph, combine};
pub use orchestrator::ResearchOrchestrator;
pub use prompts::{DailyBriefingTemplate, PromptTemplate};
pub use runner::run_engine;
pub use search::{MockSearchProvider, SearchProvider, dedup_results};
pub use store::{InMemoryStore, JsonFileStore, ReportStore};
pub use types::{
    ChatMessage, CompletenessAudit, ConfidenceLevel, DeepDive, EngineKind, EngineResult,
    EventCategory, ExtractedSections, ResearchReport, ResearchStatus, Role, SearchHit, ViralEvent,
};
