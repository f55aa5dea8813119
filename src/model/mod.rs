//! Core records produced by a validation run
//!
//! - `PageRecord`: one per discovered canonical URL
//! - `LinkEdge`: an in-scope link between two pages
//! - `Issue`: a normalized, severity-ranked finding

mod issue;
mod page;

pub use issue::{Issue, IssueKind, Severity};
pub use page::{ErrorDetail, FetchSummary, LinkEdge, PageRecord};
