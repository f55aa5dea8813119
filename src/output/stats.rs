//! Statistics for persisted validation runs
//!
//! This module extracts run statistics from the storage layer and prints
//! them for the `--stats` CLI mode.

use crate::model::Severity;
use crate::state::PageStatus;
use crate::storage::{RunRecord, Storage};
use crate::SentinelError;
use std::collections::HashMap;

/// Statistics summary of one run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,

    /// Total number of page records
    pub total_pages: u64,

    /// Count of page records by status
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// Number of internal links recorded
    pub total_links: u64,

    pub issues_by_severity: HashMap<Severity, u64>,
}

impl RunStatistics {
    pub fn pages(&self, status: PageStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn issues(&self, severity: Severity) -> u64 {
        self.issues_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Loads statistics of run `run_id` from storage
pub fn load_statistics(storage: &dyn Storage, run_id: i64) -> Result<RunStatistics, SentinelError> {
    let run = storage.get_run(run_id)?;

    let mut pages_by_status = HashMap::new();
    for status in PageStatus::all_statuses() {
        let count = storage.count_pages_by_status(run_id, status)?;
        if count > 0 {
            pages_by_status.insert(status, count);
        }
    }

    Ok(RunStatistics {
        run,
        total_pages: storage.count_total_pages(run_id)?,
        pages_by_status,
        total_links: storage.count_links(run_id)?,
        issues_by_severity: storage.count_issues_by_severity(run_id)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Validation Statistics (run {}) ===\n", stats.run.id);

    println!("Run:");
    println!("  Seed: {}", stats.run.seed);
    if let Some(host) = &stats.run.effective_host {
        println!("  Validated host: {}", host);
    }
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Pages:");
    println!("  Total: {}", stats.total_pages);
    for status in PageStatus::all_statuses() {
        let count = stats.pages(status);
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!("  Internal links: {}", stats.total_links);
    println!();

    println!("Issues:");
    for severity in Severity::all() {
        println!("  {}: {}", severity, stats.issues(severity));
    }
}
