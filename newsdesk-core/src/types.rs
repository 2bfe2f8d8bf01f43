//! Core type definitions for Newsdesk.
//!
//! Defines chat messages exchanged with generation providers, search hits,
//! the structured entities extracted from an engine's report, and the
//! per-engine and combined report records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message sent to a generation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// One result returned by a search provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl SearchHit {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Which research engine produced a result.
///
/// `Direct` is engine A (single-shot generation), `Graph` is engine B
/// (search, compose, fan-out, combine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Direct,
    Graph,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Direct => write!(f, "direct"),
            EngineKind::Graph => write!(f, "graph"),
        }
    }
}

/// Outcome of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchStatus::Completed => write!(f, "completed"),
            ResearchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Category of a viral event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    ProductLaunch,
    Funding,
    Partnership,
    Regulation,
    Research,
    OpenSource,
}

impl EventCategory {
    /// Map a report field value to a category, defaulting to `Research`.
    ///
    /// Matching ignores case and treats spaces and hyphens as underscores.
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "product_launch" => EventCategory::ProductLaunch,
            "funding" => EventCategory::Funding,
            "partnership" => EventCategory::Partnership,
            "regulation" => EventCategory::Regulation,
            "research" => EventCategory::Research,
            "open_source" => EventCategory::OpenSource,
            _ => EventCategory::Research,
        }
    }
}

/// Confidence attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Map a report field value to a confidence level, defaulting to `Medium`.
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "high" => ConfidenceLevel::High,
            "medium" => ConfidenceLevel::Medium,
            "low" => ConfidenceLevel::Low,
            _ => ConfidenceLevel::Medium,
        }
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '-'], "_")
}

/// A notable event listed in the "Global Viral Events" section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViralEvent {
    pub headline: String,
    pub category: EventCategory,
    /// Impact on a 1-10 scale.
    pub impact_rating: u8,
    pub confidence: ConfidenceLevel,
    pub source: String,
    #[serde(default)]
    pub summary: String,
}

/// An item from the "Strategic Deep Dives" section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDive {
    pub title: String,
    pub priority: String,
    pub summary: String,
    pub key_findings: Vec<String>,
}

/// The engine's self-reported coverage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessAudit {
    pub verified_signals: i64,
    pub sources_checked: i64,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence_score: f64,
    pub gaps: Vec<String>,
}

/// Structured entities extracted from one engine's markdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSections {
    pub tldr: Option<String>,
    pub viral_events: Vec<ViralEvent>,
    pub deep_dives: Vec<DeepDive>,
    pub completeness_audit: Option<CompletenessAudit>,
}

/// The result of one engine invocation. Immutable once built.
///
/// A failed result always has empty markdown, no extracted entities, and
/// a non-empty error message. Build it through [`EngineResult::completed`]
/// or [`EngineResult::failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub engine: EngineKind,
    pub status: ResearchStatus,
    pub raw_markdown: String,
    pub tldr: Option<String>,
    pub viral_events: Vec<ViralEvent>,
    pub deep_dives: Vec<DeepDive>,
    pub completeness_audit: Option<CompletenessAudit>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
}

impl EngineResult {
    pub fn completed(
        engine: EngineKind,
        raw_markdown: String,
        sections: ExtractedSections,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            engine,
            status: ResearchStatus::Completed,
            raw_markdown,
            tldr: sections.tldr,
            viral_events: sections.viral_events,
            deep_dives: sections.deep_dives,
            completeness_audit: sections.completeness_audit,
            started_at,
            completed_at,
            duration_seconds: duration_seconds.max(0.0),
            error_message: None,
        }
    }

    pub fn failed(
        engine: EngineKind,
        error_message: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Self {
        let mut error_message = error_message.into();
        if error_message.trim().is_empty() {
            error_message = format!("{engine} engine failed without a cause");
        }
        Self {
            engine,
            status: ResearchStatus::Failed,
            raw_markdown: String::new(),
            tldr: None,
            viral_events: Vec::new(),
            deep_dives: Vec::new(),
            completeness_audit: None,
            started_at,
            completed_at,
            duration_seconds: duration_seconds.max(0.0),
            error_message: Some(error_message),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResearchStatus::Completed
    }
}

/// A daily report combining both engines' results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// `rpt-<run_date>`, so re-running a date targets the same record.
    pub report_id: String,
    pub run_date: NaiveDate,
    /// Engine A.
    pub direct_result: Option<EngineResult>,
    /// Engine B.
    pub graph_result: Option<EngineResult>,
    pub created_at: DateTime<Utc>,
}

impl ResearchReport {
    /// Derive the report id for a run date.
    pub fn id_for(date: NaiveDate) -> String {
        format!("rpt-{}", date.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(EventCategory::from_label("funding"), EventCategory::Funding);
        assert_eq!(
            EventCategory::from_label("Product Launch"),
            EventCategory::ProductLaunch
        );
        assert_eq!(
            EventCategory::from_label("open-source"),
            EventCategory::OpenSource
        );
        assert_eq!(
            EventCategory::from_label("gossip"),
            EventCategory::Research
        );
    }

    #[test]
    fn test_confidence_from_label() {
        assert_eq!(ConfidenceLevel::from_label("HIGH"), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_label(" low "), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_label("sure"), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_failed_result_invariant() {
        let now = Utc::now();
        let result = EngineResult::failed(EngineKind::Graph, "", now, now, -1.0);
        assert_eq!(result.status, ResearchStatus::Failed);
        assert!(result.raw_markdown.is_empty());
        assert!(result.tldr.is_none());
        assert!(result.viral_events.is_empty());
        assert!(result.completeness_audit.is_none());
        assert!(!result.error_message.as_deref().unwrap_or("").is_empty());
        assert_eq!(result.duration_seconds, 0.0);
    }

    #[test]
    fn test_report_id_for_date() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert_eq!(ResearchReport::id_for(date), "rpt-2026-02-28");
    }

    #[test]
    fn test_engine_result_serializes_snake_case() {
        let now = Utc::now();
        let result = EngineResult::failed(EngineKind::Direct, "boom", now, now, 1.5);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["engine"], "direct");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_message"], "boom");
    }
}
