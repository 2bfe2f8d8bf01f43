//! CLI subcommand handlers.

use crate::Commands;
use newsdesk_core::config::{NewsdeskConfig, load_config};
use newsdesk_core::providers::{GeminiProvider, OpenAiCompatibleProvider, TavilySearch};
use newsdesk_core::{
    DailyBriefingTemplate, DirectEngine, EngineKind, EngineResult, GraphEngine, JsonFileStore,
    ReportStore, ResearchEngine, ResearchOrchestrator, ResearchReport, UnavailableEngine,
};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    let config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    match command {
        Commands::Run { date } => {
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            handle_run(config, date).await
        }
        Commands::Show { report_id, json } => handle_show(&config, &report_id, json).await,
        Commands::List { limit } => handle_list(&config, limit).await,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn handle_run(config: NewsdeskConfig, date: chrono::NaiveDate) -> anyhow::Result<()> {
    for warning in config.validate() {
        warn!("{warning}");
    }
    let orchestrator = build_orchestrator(&config);
    let report = orchestrator
        .run_daily(date)
        .await
        .map_err(|e| anyhow::anyhow!("Daily research could not be saved: {}", e))?;
    print!("{}", format_report(&report));
    Ok(())
}

async fn handle_show(config: &NewsdeskConfig, report_id: &str, json: bool) -> anyhow::Result<()> {
    let store = JsonFileStore::new(&config.storage.reports_dir);
    let Some(report) = store.get(report_id).await? else {
        anyhow::bail!(
            "No report '{}' in {}",
            report_id,
            config.storage.reports_dir.display()
        );
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}

async fn handle_list(config: &NewsdeskConfig, limit: usize) -> anyhow::Result<()> {
    let store = JsonFileStore::new(&config.storage.reports_dir);
    let reports = store.list(limit).await?;
    if reports.is_empty() {
        println!("No reports in {}", config.storage.reports_dir.display());
        return Ok(());
    }
    for report in &reports {
        println!("{}", format_list_row(report));
    }
    Ok(())
}

/// Composition root: providers, engines, store and prompt template.
///
/// A provider that cannot be built leaves its engine unavailable rather
/// than aborting the run.
fn build_orchestrator(config: &NewsdeskConfig) -> ResearchOrchestrator {
    let direct: Arc<dyn ResearchEngine> = match GeminiProvider::new(&config.direct_llm) {
        Ok(provider) => Arc::new(DirectEngine::new(
            Arc::new(provider),
            config.direct_llm.retry.clone(),
        )),
        Err(e) => {
            warn!(error = %e, "Direct engine unavailable");
            Arc::new(UnavailableEngine::new(EngineKind::Direct, e.to_string()))
        }
    };

    let graph_parts = OpenAiCompatibleProvider::new(&config.graph_llm)
        .map_err(|e| e.to_string())
        .and_then(|generator| {
            TavilySearch::new(&config.search)
                .map(|search| (generator, search))
                .map_err(|e| e.to_string())
        });
    let graph: Arc<dyn ResearchEngine> = match graph_parts {
        Ok((generator, search)) => Arc::new(GraphEngine::new(
            Arc::new(generator),
            Arc::new(search),
            config.pipeline.clone(),
        )),
        Err(reason) => {
            warn!(error = %reason, "Graph engine unavailable");
            Arc::new(UnavailableEngine::new(EngineKind::Graph, reason))
        }
    };

    ResearchOrchestrator::new(
        direct,
        graph,
        Arc::new(JsonFileStore::new(&config.storage.reports_dir)),
        Arc::new(DailyBriefingTemplate),
    )
    .with_deadline(config.engine.deadline_secs.map(Duration::from_secs))
}

fn format_engine_line(label: &str, result: Option<&EngineResult>) -> String {
    let Some(result) = result else {
        return format!("  {label:<7} not run");
    };
    let mut line = format!(
        "  {label:<7} {:<9} {:>6.1}s",
        result.status.to_string(),
        result.duration_seconds
    );
    if result.is_completed() {
        let _ = write!(
            line,
            "  events={} deep_dives={} audit={}",
            result.viral_events.len(),
            result.deep_dives.len(),
            if result.completeness_audit.is_some() {
                "yes"
            } else {
                "no"
            }
        );
    } else if let Some(message) = &result.error_message {
        let _ = write!(line, "  error: {message}");
    }
    line
}

/// Human-readable summary of a report.
fn format_report(report: &ResearchReport) -> String {
    let mut out = format!(
        "Report {} (run date {}, created {})\n",
        report.report_id,
        report.run_date,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push_str(&format_engine_line("direct", report.direct_result.as_ref()));
    out.push('\n');
    out.push_str(&format_engine_line("graph", report.graph_result.as_ref()));
    out.push('\n');

    for (label, result) in [
        ("direct", report.direct_result.as_ref()),
        ("graph", report.graph_result.as_ref()),
    ] {
        if let Some(tldr) = result.and_then(|r| r.tldr.as_deref()) {
            let _ = write!(out, "\n[{label}] TL;DR\n{tldr}\n");
        }
    }
    out
}

fn format_list_row(report: &ResearchReport) -> String {
    let status = |r: Option<&EngineResult>| {
        r.map(|r| r.status.to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "{}  direct={:<9} graph={}",
        report.report_id,
        status(report.direct_result.as_ref()),
        status(report.graph_result.as_ref())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use newsdesk_core::ExtractedSections;
    use pretty_assertions::assert_eq;

    fn report() -> ResearchReport {
        let now = Utc::now();
        let run_date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let sections = ExtractedSections {
            tldr: Some("- big day".into()),
            ..ExtractedSections::default()
        };
        ResearchReport {
            report_id: ResearchReport::id_for(run_date),
            run_date,
            direct_result: Some(EngineResult::failed(
                EngineKind::Direct,
                "Generation failed: quota",
                now,
                now,
                0.25,
            )),
            graph_result: Some(EngineResult::completed(
                EngineKind::Graph,
                "## TL;DR\n- big day".into(),
                sections,
                now,
                now,
                12.0,
            )),
            created_at: now,
        }
    }

    #[test]
    fn test_format_list_row() {
        assert_eq!(
            format_list_row(&report()),
            "rpt-2026-10-01  direct=failed    graph=completed"
        );
    }

    #[test]
    fn test_format_report_shows_errors_and_tldr() {
        let text = format_report(&report());
        assert!(text.starts_with("Report rpt-2026-10-01 (run date 2026-10-01"));
        assert!(text.contains("error: Generation failed: quota"));
        assert!(text.contains("events=0 deep_dives=0 audit=no"));
        assert!(text.contains("[graph] TL;DR\n- big day"));
        assert!(!text.contains("[direct] TL;DR"));
    }

    #[test]
    fn test_format_engine_line_missing() {
        assert_eq!(format_engine_line("direct", None), "  direct  not run");
    }

    #[test]
    fn test_unconfigured_providers_leave_engines_unavailable() {
        let mut config = NewsdeskConfig::default();
        config.direct_llm.api_key_env = "NEWSDESK_TEST_CLI_MISSING_GEMINI".into();
        config.graph_llm.api_key_env = "NEWSDESK_TEST_CLI_MISSING_OPENAI".into();
        config.search.api_key_env = "NEWSDESK_TEST_CLI_MISSING_TAVILY".into();
        // Builds without panicking even though no key resolves.
        let _ = build_orchestrator(&config);
    }
}
