use serde::{Deserialize, Serialize};
use std::fmt;

/// Impact ranking of an issue
///
/// Variants are declared most severe first so the derived `Ord` sorts
/// High before Medium before Low before Info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::High, Self::Medium, Self::Low, Self::Info]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Category of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    HttpError,
    TlsFailure,
    BrokenLink,
    ConsoleError,
    VisualDefect,
    Timeout,
    Unreachable,
    RedirectExhausted,
    MalformedLink,
}

impl IssueKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::HttpError => "http_error",
            Self::TlsFailure => "tls_failure",
            Self::BrokenLink => "broken_link",
            Self::ConsoleError => "console_error",
            Self::VisualDefect => "visual_defect",
            Self::Timeout => "timeout",
            Self::Unreachable => "unreachable",
            Self::RedirectExhausted => "redirect_exhausted",
            Self::MalformedLink => "malformed_link",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "http_error" => Some(Self::HttpError),
            "tls_failure" => Some(Self::TlsFailure),
            "broken_link" => Some(Self::BrokenLink),
            "console_error" => Some(Self::ConsoleError),
            "visual_defect" => Some(Self::VisualDefect),
            "timeout" => Some(Self::Timeout),
            "unreachable" => Some(Self::Unreachable),
            "redirect_exhausted" => Some(Self::RedirectExhausted),
            "malformed_link" => Some(Self::MalformedLink),
            _ => None,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A normalized finding attached to an existing page record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Canonical URL of the page record the issue refers to
    pub url: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
    /// Referring page for broken links, or the page a malformed link sat on
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_url: Option<String>,
    /// Opaque reference such as a screenshot id
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evidence: Option<String>,
    /// Discovery ordinal of the referenced page record
    pub discovery: u64,
}

impl Issue {
    pub fn new(
        url: impl Into<String>,
        discovery: u64,
        kind: IssueKind,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            kind,
            severity,
            description: description.into(),
            source_url: None,
            evidence: None,
            discovery,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_url = Some(source.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}
