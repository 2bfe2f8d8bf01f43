//! Engine runner: the failure-isolation boundary around one engine call.

use crate::engine::ResearchEngine;
use crate::error::EngineError;
use crate::extractor::extract_sections;
use crate::types::EngineResult;
use chrono::{NaiveDate, Utc};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Invoke `engine` and capture the outcome as an [`EngineResult`].
///
/// Never fails: engine errors, empty output and an exceeded `deadline` all
/// become a failed result with a readable message.
pub async fn run_engine(
    engine: &dyn ResearchEngine,
    prompt: &str,
    date: NaiveDate,
    deadline: Option<Duration>,
) -> EngineResult {
    let kind = engine.kind();
    let started_at = Utc::now();
    let clock = Instant::now();
    info!(engine = %kind, "Engine started");

    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, engine.research(prompt, date)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::DeadlineExceeded {
                deadline_secs: limit.as_secs(),
            }),
        },
        None => engine.research(prompt, date).await,
    };
    let outcome = outcome.and_then(|markdown| {
        if markdown.trim().is_empty() {
            Err(EngineError::EmptyOutput)
        } else {
            Ok(markdown)
        }
    });

    let completed_at = Utc::now();
    let duration = clock.elapsed().as_secs_f64();

    match outcome {
        Ok(markdown) => {
            let sections = extract_sections(&markdown);
            info!(
                engine = %kind,
                duration_secs = format!("{duration:.1}"),
                events = sections.viral_events.len(),
                deep_dives = sections.deep_dives.len(),
                has_audit = sections.completeness_audit.is_some(),
                "Engine completed"
            );
            EngineResult::completed(kind, markdown, sections, started_at, completed_at, duration)
        }
        Err(e) => {
            error!(engine = %kind, error = %e, "Engine failed");
            EngineResult::failed(kind, e.to_string(), started_at, completed_at, duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngineKind, ResearchStatus};
    use async_trait::async_trait;

    struct ScriptedEngine {
        output: Result<&'static str, &'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl ResearchEngine for ScriptedEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Graph
        }

        async fn research(&self, _prompt: &str, _date: NaiveDate) -> Result<String, EngineError> {
            tokio::time::sleep(self.delay).await;
            self.output
                .map(str::to_string)
                .map_err(|msg| EngineError::Generation(crate::error::LlmError::ApiRequest {
                    message: msg.to_string(),
                }))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 4).unwrap()
    }

    #[tokio::test]
    async fn test_success_runs_extractor() {
        let engine = ScriptedEngine {
            output: Ok("## TL;DR\n- one\n\n## Completeness Audit\n- **Verified Signals**: 7\n"),
            delay: Duration::ZERO,
        };
        let result = run_engine(&engine, "p", date(), None).await;
        assert_eq!(result.status, ResearchStatus::Completed);
        assert_eq!(result.engine, EngineKind::Graph);
        assert_eq!(result.tldr.as_deref(), Some("- one"));
        assert_eq!(result.completeness_audit.unwrap().verified_signals, 7);
        assert!(result.error_message.is_none());
        assert!(result.completed_at >= result.started_at);
        assert!(result.duration_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_failure_is_captured() {
        let engine = ScriptedEngine {
            output: Err("upstream 500"),
            delay: Duration::ZERO,
        };
        let result = run_engine(&engine, "p", date(), None).await;
        assert_eq!(result.status, ResearchStatus::Failed);
        assert!(result.raw_markdown.is_empty());
        assert!(result.error_message.unwrap().contains("upstream 500"));
    }

    #[tokio::test]
    async fn test_blank_output_is_failure() {
        let engine = ScriptedEngine {
            output: Ok("  \n "),
            delay: Duration::ZERO,
        };
        let result = run_engine(&engine, "p", date(), None).await;
        assert_eq!(result.status, ResearchStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("Engine produced no output"));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let engine = ScriptedEngine {
            output: Ok("late"),
            delay: Duration::from_secs(5),
        };
        let result = run_engine(&engine, "p", date(), Some(Duration::from_millis(20))).await;
        assert_eq!(result.status, ResearchStatus::Failed);
        assert!(result.error_message.unwrap().contains("deadline"));
    }
}
