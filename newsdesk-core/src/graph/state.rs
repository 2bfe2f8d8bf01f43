//! State threaded through one research graph run.

use crate::prompts::{DIVES_AUDIT_PREAMBLE, EVENTS_PREAMBLE, TLDR_PREAMBLE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Static configuration for one fan-out branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub section_name: &'static str,
    pub system_preamble: &'static str,
}

/// The three branches dispatched by the generate node.
pub const SECTION_SPECS: [SectionSpec; 3] = [
    SectionSpec {
        section_name: "tldr",
        system_preamble: TLDR_PREAMBLE,
    },
    SectionSpec {
        section_name: "events",
        system_preamble: EVENTS_PREAMBLE,
    },
    SectionSpec {
        section_name: "dives_audit",
        system_preamble: DIVES_AUDIT_PREAMBLE,
    },
];

/// Order in which branch outputs are recombined.
pub const SECTION_ORDER: [&str; 3] = ["tldr", "events", "dives_audit"];

/// Output of one generation branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionResult {
    pub section_name: String,
    pub content: String,
}

impl SectionResult {
    pub fn new(section_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            section_name: section_name.into(),
            content: content.into(),
        }
    }
}

/// Mutable record owned by a single graph run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub prompt: String,
    pub search_context: String,
    pub full_prompt: String,
    /// Appended in branch completion order, not canonical order.
    pub section_results: Vec<SectionResult>,
    pub combined_markdown: String,
    pub run_id: String,
    pub date: NaiveDate,
}

impl PipelineState {
    pub fn new(prompt: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            prompt: prompt.into(),
            search_context: String::new(),
            full_prompt: String::new(),
            section_results: Vec::new(),
            combined_markdown: String::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
            date,
        }
    }
}

/// Fan-in point for concurrent branches.
///
/// Each branch holds a [`SectionSender`]; results are drained once every
/// sender has been dropped.
pub struct SectionCollector {
    tx: mpsc::Sender<SectionResult>,
    rx: mpsc::Receiver<SectionResult>,
}

/// Branch-side handle of a [`SectionCollector`].
#[derive(Clone)]
pub struct SectionSender(mpsc::Sender<SectionResult>);

impl SectionSender {
    /// Deliver a branch result. Never blocks while the collector has room
    /// for one result per branch.
    pub async fn send(&self, result: SectionResult) {
        // Receiver lives until drain(); a send error means the run was dropped.
        let _ = self.0.send(result).await;
    }
}

impl SectionCollector {
    pub fn with_capacity(branches: usize) -> Self {
        let (tx, rx) = mpsc::channel(branches.max(1));
        Self { tx, rx }
    }

    pub fn sender(&self) -> SectionSender {
        SectionSender(self.tx.clone())
    }

    /// Close the collector and return everything delivered, in arrival order.
    pub async fn drain(self) -> Vec<SectionResult> {
        let Self { tx, mut rx } = self;
        drop(tx);
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results
    }
}
