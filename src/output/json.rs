//! `issues.json` report
//!
//! The report is the primary artifact of a run. Field order follows the
//! struct declarations and issues keep the aggregated order, so two runs
//! with identical outcomes serialize identically.

use crate::crawler::ValidationRun;
use crate::model::{Issue, LinkEdge, PageRecord, Severity};
use crate::output::OutputError;
use crate::state::PageStatus;
use crate::storage::{RunStatus, Storage, StorageError};
use crate::SentinelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Issue totals per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.info
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub pages: usize,
    pub fetched: usize,
    pub failed: usize,
    pub pending: usize,
    pub issues_by_severity: SeverityCounts,
}

/// The serialized outcome of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Canonical seed URL
    pub site: String,
    /// Host the run ended up validating (differs from the seed host after
    /// an adopted redirect)
    pub final_domain: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub deadline_hit: bool,
    pub summary: ReportSummary,
    pub pages: Vec<PageRecord>,
    pub links: Vec<LinkEdge>,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Builds the report of a run that just finished
    pub fn from_run(run: &ValidationRun, config_hash: &str) -> Self {
        Self::assemble(
            run.seed.clone(),
            run.effective_host.clone(),
            config_hash.to_string(),
            run.started_at,
            run.finished_at,
            run.deadline_hit,
            run.records.clone(),
            run.edges.clone(),
            run.issues.clone(),
        )
    }

    /// Rebuilds the report of a persisted run
    pub fn from_storage(storage: &dyn Storage, run_id: i64) -> Result<Self, SentinelError> {
        let run = storage.get_run(run_id)?;
        let finished_at = run
            .finished_at
            .as_deref()
            .ok_or(OutputError::IncompleteRun(run_id))?;

        Ok(Self::assemble(
            run.seed.clone(),
            run.effective_host.clone().unwrap_or_default(),
            run.config_hash.clone(),
            parse_timestamp(&run.started_at)?,
            parse_timestamp(finished_at)?,
            run.status == RunStatus::DeadlineExceeded,
            storage.load_pages(run_id)?,
            storage.load_links(run_id)?,
            storage.load_issues(run_id)?,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        site: String,
        final_domain: String,
        config_hash: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        deadline_hit: bool,
        pages: Vec<PageRecord>,
        links: Vec<LinkEdge>,
        issues: Vec<Issue>,
    ) -> Self {
        let count = |status: PageStatus| pages.iter().filter(|p| p.status == status).count();
        let summary = ReportSummary {
            pages: pages.len(),
            fetched: count(PageStatus::Fetched),
            failed: count(PageStatus::Failed),
            pending: count(PageStatus::Pending),
            issues_by_severity: SeverityCounts::from_issues(&issues),
        };

        Self {
            site,
            final_domain,
            config_hash,
            started_at,
            finished_at,
            deadline_hit,
            summary,
            pages,
            links,
            issues,
        }
    }

    pub fn to_json(&self) -> Result<String, OutputError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

/// Writes the report to `path`, creating parent directories as needed
pub fn write_issues_json(report: &ValidationReport, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report.to_json()?)?;
    tracing::info!(
        "Wrote {} issues for {} pages to {}",
        report.issues.len(),
        report.pages.len(),
        path.display()
    );
    Ok(())
}

pub fn read_issues_json(path: &Path) -> Result<ValidationReport, OutputError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
