//! Dual-engine orchestrator.
//!
//! Builds the day's prompt, runs both engines concurrently through
//! [`run_engine`], assembles the [`ResearchReport`] and saves it once.
//! Engine failures live inside the report; only a store failure reaches
//! the caller.

use crate::engine::ResearchEngine;
use crate::error::Result;
use crate::prompts::PromptTemplate;
use crate::runner::run_engine;
use crate::store::ReportStore;
use crate::types::ResearchReport;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct ResearchOrchestrator {
    direct: Arc<dyn ResearchEngine>,
    graph: Arc<dyn ResearchEngine>,
    store: Arc<dyn ReportStore>,
    template: Arc<dyn PromptTemplate>,
    deadline: Option<Duration>,
}

impl ResearchOrchestrator {
    pub fn new(
        direct: Arc<dyn ResearchEngine>,
        graph: Arc<dyn ResearchEngine>,
        store: Arc<dyn ReportStore>,
        template: Arc<dyn PromptTemplate>,
    ) -> Self {
        Self {
            direct,
            graph,
            store,
            template,
            deadline: None,
        }
    }

    /// Bound each engine invocation by `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Produce, save and return the report for `date`.
    pub async fn run_daily(&self, date: NaiveDate) -> Result<ResearchReport> {
        let report_id = ResearchReport::id_for(date);
        let prompt = self.template.build(date);
        info!(report_id = %report_id, "Starting daily research");

        let (direct_result, graph_result) = tokio::join!(
            run_engine(self.direct.as_ref(), &prompt, date, self.deadline),
            run_engine(self.graph.as_ref(), &prompt, date, self.deadline),
        );

        let report = ResearchReport {
            report_id,
            run_date: date,
            direct_result: Some(direct_result),
            graph_result: Some(graph_result),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.save(&report).await {
            error!(report_id = %report.report_id, error = %e, "Failed to save report");
            return Err(e.into());
        }

        info!(
            report_id = %report.report_id,
            direct = %report.direct_result.as_ref().map(|r| r.status.to_string()).unwrap_or_default(),
            graph = %report.graph_result.as_ref().map(|r| r.status.to_string()).unwrap_or_default(),
            "Daily research saved"
        );
        Ok(report)
    }
}
