//! Rendering collaborator seam
//!
//! A headless browser lives outside this crate. Implementations of
//! [`Renderer`] load a fetched page, capture a screenshot reference, the
//! browser console and failed subresource requests, and report any visual
//! defects they detect. The validator only stores what they return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::url::normalize_url;

/// Browser console level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl ConsoleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub message: String,
}

impl ConsoleEntry {
    pub fn new(level: ConsoleLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// A subresource the browser failed to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub url: String,
    /// Browser failure text, e.g. `net::ERR_NAME_NOT_RESOLVED`
    pub failure: String,
}

/// What the renderer observed on one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCapture {
    /// Opaque screenshot reference (path or id)
    pub screenshot: Option<String>,
    pub console: Vec<ConsoleEntry>,
    pub failed_requests: Vec<FailedRequest>,
    /// Human-readable descriptions of layout or visual defects
    pub defects: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to capture {url}: {message}")]
    Capture { url: String, message: String },
}

/// Loads a page in a browser and reports what it saw
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn capture(&self, url: &Url) -> Result<RenderCapture, RenderError>;
}

/// Renderer used when no browser is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

#[async_trait]
impl Renderer for NoRenderer {
    async fn capture(&self, _url: &Url) -> Result<RenderCapture, RenderError> {
        Err(RenderError::Unavailable("no renderer configured".to_string()))
    }
}

/// Which fetched pages are handed to the renderer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReviewSelection {
    #[default]
    None,
    All,
    /// Canonical URLs of the pages to review
    Pages(Vec<String>),
}

impl ReviewSelection {
    /// Builds a selection from configured page URLs
    ///
    /// Entries that fail to canonicalize are ignored (config validation has
    /// already checked that they parse).
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pages: Vec<String> = pages
            .into_iter()
            .filter_map(|p| normalize_url(p.as_ref()).ok())
            .map(|u| u.to_string())
            .collect();

        if pages.is_empty() {
            Self::None
        } else {
            Self::Pages(pages)
        }
    }

    pub fn selects(&self, url: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Pages(pages) => pages.iter().any(|p| p == url),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }
}
