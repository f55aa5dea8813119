//! Severity policy
//!
//! Pure functions from a page record's outcome (plus its inbound link count
//! and auth-flow flag) to issues. Nothing here looks at run state.

use crate::model::{ErrorDetail, Issue, IssueKind, PageRecord, Severity};
use crate::render::{ConsoleLevel, RenderCapture};

/// Failure text of requests the browser cancelled itself
const ABORTED_REQUEST_MARKER: &str = "ERR_ABORTED";

/// Issues caused by the fetch outcome of `record`
///
/// `inbound_sources` lists the pages linking to the record (self-links
/// excluded); it only matters for 4xx responses.
pub fn fetch_issues(record: &PageRecord, inbound_sources: &[String], auth_flow: bool) -> Vec<Issue> {
    let Some(error) = &record.error else {
        return Vec::new();
    };

    let issue = |kind, severity, description: String| {
        Issue::new(&record.url, record.id, kind, severity, description)
    };

    match error {
        ErrorDetail::TlsHandshake { upstream, message } => {
            let origin = if *upstream {
                "Upstream TLS verification failed (reported by proxy)"
            } else {
                "TLS handshake failed"
            };
            vec![issue(
                IssueKind::TlsFailure,
                Severity::High,
                format!("{}: {}", origin, message),
            )]
        }
        ErrorDetail::ServerError { status } => {
            let severity = if auth_flow {
                Severity::Medium
            } else {
                Severity::High
            };
            let context = if auth_flow { " on authentication flow" } else { "" };
            vec![issue(
                IssueKind::HttpError,
                severity,
                format!("Server error HTTP {}{}", status, context),
            )]
        }
        ErrorDetail::ClientError { status } => {
            if inbound_sources.is_empty() {
                vec![issue(
                    IssueKind::BrokenLink,
                    Severity::Low,
                    format!("HTTP {} with no internal links pointing to it", status),
                )]
            } else {
                inbound_sources
                    .iter()
                    .map(|source| {
                        issue(
                            IssueKind::BrokenLink,
                            Severity::Medium,
                            format!("Broken link: HTTP {} linked from {}", status, source),
                        )
                        .with_source(source)
                    })
                    .collect()
            }
        }
        ErrorDetail::Timeout { attempts } => vec![issue(
            IssueKind::Timeout,
            Severity::High,
            format!("Request timed out after {} attempt(s)", attempts),
        )],
        ErrorDetail::DeadlineExceeded => vec![issue(
            IssueKind::Timeout,
            Severity::Low,
            "Fetch abandoned when the run deadline expired".to_string(),
        )],
        ErrorDetail::ConnectionFailed { message } => vec![issue(
            IssueKind::Unreachable,
            Severity::High,
            format!("Connection failed: {}", message),
        )],
        ErrorDetail::Request { message } => vec![issue(
            IssueKind::Unreachable,
            Severity::High,
            format!("Request failed: {}", message),
        )],
        ErrorDetail::RedirectExhausted { hops, last_url } => vec![issue(
            IssueKind::RedirectExhausted,
            Severity::Medium,
            format!("Redirect limit reached after {} hops (last: {})", hops, last_url),
        )],
    }
}

/// Issues reported by the rendering collaborator for `record`
pub fn render_issues(record: &PageRecord, capture: &RenderCapture) -> Vec<Issue> {
    let mut issues = Vec::new();

    for entry in &capture.console {
        let severity = match entry.level {
            ConsoleLevel::Error => Severity::Low,
            _ => Severity::Info,
        };
        issues.push(Issue::new(
            &record.url,
            record.id,
            IssueKind::ConsoleError,
            severity,
            format!("Console {}: {}", entry.level.as_str(), entry.message),
        ));
    }

    for failed in &capture.failed_requests {
        if failed.failure.contains(ABORTED_REQUEST_MARKER) {
            continue;
        }
        issues.push(Issue::new(
            &record.url,
            record.id,
            IssueKind::ConsoleError,
            Severity::Low,
            format!("Failed to load {}: {}", failed.url, failed.failure),
        ));
    }

    for defect in &capture.defects {
        let mut issue = Issue::new(
            &record.url,
            record.id,
            IssueKind::VisualDefect,
            Severity::Low,
            defect.clone(),
        );
        if let Some(screenshot) = &capture.screenshot {
            issue = issue.with_evidence(screenshot);
        }
        issues.push(issue);
    }

    issues
}

/// True if `path` contains `pattern` ending on a segment boundary
///
/// `/login` matches `/login`, `/login/sso` and `/account/login` but not
/// `/loginhelp`.
pub fn path_matches(path: &str, pattern: &str) -> bool {
    let path = path.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() {
        return false;
    }

    path.match_indices(pattern).any(|(start, _)| {
        matches!(path[start + pattern.len()..].chars().next(), None | Some('/'))
    })
}
