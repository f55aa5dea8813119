//! Site-Sentinel: a website validation crawler
//!
//! This crate crawls a site from a seed URL, classifies every response
//! (status codes, TLS failures, timeouts, redirect exhaustion), hands selected
//! pages to an optional rendering collaborator, and aggregates everything into
//! a severity-ranked issue list.

pub mod audit;
pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod render;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Sentinel operations
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid state transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: state::PageStatus,
        to: state::PageStatus,
    },

    /// The frontier handed out a URL twice or lost track of a page record.
    /// This is a bug and aborts the run.
    #[error("Frontier corruption at {url}: {reason}")]
    FrontierCorruption { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Site-Sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use audit::IssueAggregator;
pub use config::Config;
pub use crawler::{validate, ValidationRun, Validator};
pub use model::{ErrorDetail, Issue, IssueKind, LinkEdge, PageRecord, Severity};
pub use state::PageStatus;
pub use url::{extract_domain, normalize_url, Scope, ScopeDecision};
