//! Output module for validation reports
//!
//! This module handles:
//! - Writing and reading the `issues.json` report
//! - Loading and printing statistics of persisted runs

mod json;
pub mod stats;

pub use json::{read_issues_json, write_issues_json, ReportSummary, SeverityCounts, ValidationReport};
pub use stats::{load_statistics, print_statistics, RunStatistics};

use thiserror::Error;

/// Errors produced while writing or reading reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No validation runs found in database")]
    NoRuns,

    #[error("Run {0} has not finished")]
    IncompleteRun(i64),
}
