//! Report persistence.
//!
//! [`ReportStore`] is the seam the orchestrator saves through. Reports are
//! keyed by `report_id`, so saving the same run date twice overwrites.

use crate::error::StoreError;
use crate::types::ResearchReport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert or replace the report with the same id.
    async fn save(&self, report: &ResearchReport) -> Result<(), StoreError>;

    async fn get(&self, report_id: &str) -> Result<Option<ResearchReport>, StoreError>;

    /// Most recent reports first: by `run_date`, then `created_at`.
    async fn list(&self, limit: usize) -> Result<Vec<ResearchReport>, StoreError>;
}

fn newest_first(reports: &mut [ResearchReport]) {
    reports.sort_by(|a, b| {
        b.run_date
            .cmp(&a.run_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Report ids become file names; anything outside `[A-Za-z0-9_-]` is rejected.
fn is_safe_id(report_id: &str) -> bool {
    !report_id.is_empty()
        && report_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// One pretty-printed JSON file per report under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, report_id: &str) -> PathBuf {
        self.dir.join(format!("{report_id}.json"))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Write to a `.tmp` sibling, then rename over the target.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Self::io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| Self::io_error(path, e))
    }
}

#[async_trait]
impl ReportStore for JsonFileStore {
    async fn save(&self, report: &ResearchReport) -> Result<(), StoreError> {
        if !is_safe_id(&report.report_id) {
            return Err(StoreError::Unavailable {
                message: format!("refusing to store report id '{}'", report.report_id),
            });
        }
        let path = self.path_for(&report.report_id);
        let json = serde_json::to_vec_pretty(report)?;
        self.write_atomic(&path, &json).await?;
        debug!(report_id = %report.report_id, path = %path.display(), "Report saved");
        Ok(())
    }

    async fn get(&self, report_id: &str) -> Result<Option<ResearchReport>, StoreError> {
        if !is_safe_id(report_id) {
            return Ok(None);
        }
        let path = self.path_for(report_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                report_id: report_id.to_string(),
                message: e.to_string(),
            })
    }

    async fn list(&self, limit: usize) -> Result<Vec<ResearchReport>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.dir, e)),
        };

        let mut reports = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|data| {
                    serde_json::from_str::<ResearchReport>(&data).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(report) => reports.push(report),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Skipping unreadable report")
                }
            }
        }

        newest_first(&mut reports);
        reports.truncate(limit);
        Ok(reports)
    }
}

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    reports: RwLock<HashMap<String, ResearchReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn save(&self, report: &ResearchReport) -> Result<(), StoreError> {
        self.reports
            .write()
            .await
            .insert(report.report_id.clone(), report.clone());
        Ok(())
    }

    async fn get(&self, report_id: &str) -> Result<Option<ResearchReport>, StoreError> {
        Ok(self.reports.read().await.get(report_id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<ResearchReport>, StoreError> {
        let mut reports: Vec<ResearchReport> = self.reports.read().await.values().cloned().collect();
        newest_first(&mut reports);
        reports.truncate(limit);
        Ok(reports)
    }
}
