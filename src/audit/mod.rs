//! Issue aggregation
//!
//! The [`IssueAggregator`] collects what the crawl observed beyond individual
//! page outcomes (link edges, malformed hrefs, render captures) and turns
//! page records into a deterministic, severity-ordered issue list.

mod classify;

pub use classify::{fetch_issues, path_matches, render_issues};

use crate::config::AuditConfig;
use crate::model::{Issue, IssueKind, LinkEdge, PageRecord, Severity};
use crate::render::RenderCapture;
use std::collections::HashMap;
use url::Url;

/// Inputs of the severity policy that come from configuration
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    pub auth_path_patterns: Vec<String>,
}

impl AuditPolicy {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            auth_path_patterns: config.auth_path_patterns.clone(),
        }
    }

    /// True if the record's URL, any redirect hop, or its final URL is part
    /// of an authentication flow
    pub fn is_auth_flow(&self, record: &PageRecord) -> bool {
        std::iter::once(&record.url)
            .chain(record.redirect_chain.iter())
            .chain(record.final_url.iter())
            .filter_map(|u| Url::parse(u).ok())
            .any(|u| {
                self.auth_path_patterns
                    .iter()
                    .any(|pattern| path_matches(u.path(), pattern))
            })
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

/// An href on a fetched page that could not be turned into a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLink {
    /// Id of the page record the href appeared on
    pub page_id: u64,
    pub source_url: String,
    pub href: String,
}

/// Collects crawl observations and produces the final issue list
#[derive(Debug, Default)]
pub struct IssueAggregator {
    policy: AuditPolicy,
    /// target -> linking pages, in discovery order
    inbound: HashMap<String, Vec<String>>,
    malformed: Vec<MalformedLink>,
    captures: HashMap<String, RenderCapture>,
}

impl IssueAggregator {
    pub fn new(policy: AuditPolicy) -> Self {
        Self {
            policy,
            inbound: HashMap::new(),
            malformed: Vec::new(),
            captures: HashMap::new(),
        }
    }

    /// Records an internal link. Self-links do not count as inbound links.
    pub fn record_edge(&mut self, edge: &LinkEdge) {
        if edge.source == edge.target {
            return;
        }
        self.inbound
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
    }

    pub fn record_edges<'a, I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = &'a LinkEdge>,
    {
        for edge in edges {
            self.record_edge(edge);
        }
    }

    pub fn record_malformed(&mut self, link: MalformedLink) {
        self.malformed.push(link);
    }

    /// Stores the render capture of the page with canonical URL `url`
    pub fn record_capture(&mut self, url: impl Into<String>, capture: RenderCapture) {
        self.captures.insert(url.into(), capture);
    }

    /// Number of internal pages linking to `url`
    pub fn inbound_count(&self, url: &str) -> usize {
        self.inbound.get(url).map_or(0, Vec::len)
    }

    /// All issues for one page record, in emission order
    ///
    /// Pending records produce nothing: they were never fetched, so there is
    /// no outcome to judge.
    pub fn classify(&self, record: &PageRecord) -> Vec<Issue> {
        if record.is_pending() {
            return Vec::new();
        }

        let sources = self
            .inbound
            .get(&record.url)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let auth_flow = self.policy.is_auth_flow(record);

        let mut issues = fetch_issues(record, sources, auth_flow);

        issues.extend(
            self.malformed
                .iter()
                .filter(|link| link.page_id == record.id)
                .map(|link| {
                    Issue::new(
                        &record.url,
                        record.id,
                        IssueKind::MalformedLink,
                        Severity::Low,
                        format!("Malformed link href '{}'", link.href),
                    )
                    .with_source(&link.source_url)
                }),
        );

        if let Some(capture) = self.captures.get(&record.url) {
            issues.extend(render_issues(record, capture));
        }

        issues
    }

    /// Produces the ordered issue list for a run
    ///
    /// Ordering is by severity, then by the discovery ordinal of the page,
    /// then by emission order within the page. Calling this again with the
    /// same records yields the same list.
    pub fn finalize(&self, records: &[PageRecord]) -> Vec<Issue> {
        let mut ordered: Vec<&PageRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.id);

        let mut issues: Vec<Issue> = ordered
            .into_iter()
            .flat_map(|record| self.classify(record))
            .collect();

        // Stable: keeps discovery then emission order within a severity
        issues.sort_by_key(|issue| issue.severity);

        tracing::debug!(
            "Aggregated {} issues from {} page records",
            issues.len(),
            records.len()
        );
        issues
    }
}
