use crate::state::PageStatus;
use crate::SentinelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured detail of why a fetch did not produce a usable page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorDetail {
    /// Certificate verification or handshake failure. `upstream` is set when
    /// a proxy reported the failure through a 5xx response body.
    TlsHandshake { message: String, upstream: bool },
    ConnectionFailed { message: String },
    Timeout { attempts: u32 },
    /// The fetch was still in flight when the global deadline expired
    DeadlineExceeded,
    RedirectExhausted { hops: u32, last_url: String },
    ClientError { status: u16 },
    ServerError { status: u16 },
    Request { message: String },
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TlsHandshake {
                message,
                upstream: true,
            } => write!(f, "upstream TLS handshake failed: {}", message),
            Self::TlsHandshake { message, .. } => write!(f, "TLS handshake failed: {}", message),
            Self::ConnectionFailed { message } => write!(f, "connection failed: {}", message),
            Self::Timeout { attempts } => {
                write!(f, "request timed out after {} attempt(s)", attempts)
            }
            Self::DeadlineExceeded => write!(f, "abandoned at the run deadline"),
            Self::RedirectExhausted { hops, last_url } => {
                write!(f, "gave up after {} redirects (last: {})", hops, last_url)
            }
            Self::ClientError { status } => write!(f, "HTTP {}", status),
            Self::ServerError { status } => write!(f, "HTTP {}", status),
            Self::Request { message } => write!(f, "request failed: {}", message),
        }
    }
}

/// Everything a completed fetch contributes to its page record
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    pub status_code: Option<u16>,
    pub final_url: Option<String>,
    pub redirect_chain: Vec<String>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub error: Option<ErrorDetail>,
    pub attempts: u32,
}

impl FetchSummary {
    /// Summary for a fetch abandoned when the run deadline expired
    pub fn deadline_exceeded() -> Self {
        Self {
            error: Some(ErrorDetail::DeadlineExceeded),
            ..Self::default()
        }
    }

    /// Summary for a fetch whose task ended without producing a result
    pub fn lost(message: impl Into<String>) -> Self {
        Self {
            error: Some(ErrorDetail::Request {
                message: message.into(),
            }),
            ..Self::default()
        }
    }
}

/// One record per canonical URL discovered during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Discovery ordinal; the seed is 0
    pub id: u64,
    pub url: String,
    pub depth: u32,
    pub status: PageStatus,
    pub status_code: Option<u16>,
    pub final_url: Option<String>,
    pub redirect_chain: Vec<String>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub error: Option<ErrorDetail>,
    pub attempts: u32,
    pub discovered_at: DateTime<Utc>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Creates a pending record for a freshly accepted URL
    pub fn pending(id: u64, url: impl Into<String>, depth: u32) -> Self {
        Self {
            id,
            url: url.into(),
            depth,
            status: PageStatus::Pending,
            status_code: None,
            final_url: None,
            redirect_chain: Vec::new(),
            content_type: None,
            title: None,
            error: None,
            attempts: 0,
            discovered_at: Utc::now(),
            fetched_at: None,
        }
    }

    /// Applies the outcome of this record's fetch
    ///
    /// A record is completed exactly once: the status becomes `Fetched` when
    /// the summary carries no error and `Failed` otherwise.
    pub fn finish(&mut self, summary: FetchSummary, at: DateTime<Utc>) -> Result<(), SentinelError> {
        let next = if summary.error.is_none() {
            PageStatus::Fetched
        } else {
            PageStatus::Failed
        };

        if !self.status.can_transition_to(next) {
            return Err(SentinelError::InvalidTransition {
                url: self.url.clone(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.status_code = summary.status_code;
        self.final_url = summary.final_url;
        self.redirect_chain = summary.redirect_chain;
        self.content_type = summary.content_type;
        self.title = summary.title;
        self.error = summary.error;
        self.attempts = summary.attempts;
        self.fetched_at = Some(at);
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == PageStatus::Pending
    }
}

/// An in-scope link from `source` to `target` (both canonical URLs)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: String,
    pub target: String,
}

impl LinkEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}
