//! URL handling module for Site-Sentinel
//!
//! This module provides URL canonicalization, host extraction, wildcard
//! matching, and the crawl scope.

mod domain;
mod matcher;
mod normalize;

pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use normalize::normalize_url;

use ::url::Url;

/// Whether a URL may be traversed by the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeDecision {
    InScope,
    ScopeViolation,
}

impl ScopeDecision {
    pub fn is_in_scope(&self) -> bool {
        matches!(self, Self::InScope)
    }
}

/// The set of hosts a validation run may traverse
///
/// Built from the seed host plus the configured patterns. Hosts reached
/// through the seed's redirect are added at runtime with [`Scope::adopt_host`].
#[derive(Debug, Clone, Default)]
pub struct Scope {
    patterns: Vec<String>,
    adopted: Vec<String>,
}

impl Scope {
    /// Creates a scope from host patterns (exact hosts or `*.base` wildcards)
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
            adopted: Vec::new(),
        }
    }

    /// Creates the scope for a run: the seed host is always allowed
    pub fn for_seed(seed: &Url, allowed_hosts: &[String]) -> Self {
        let mut scope = Self::new(allowed_hosts.iter().cloned());
        if let Some(host) = extract_domain(seed) {
            scope.adopt_host(&host);
        }
        scope
    }

    /// Classifies a URL against the scope
    ///
    /// # Examples
    ///
    /// ```
    /// use site_sentinel::url::{Scope, ScopeDecision};
    /// use url::Url;
    ///
    /// let scope = Scope::new(["docs.example.com"]);
    /// let url = Url::parse("https://thirdparty.example.com/").unwrap();
    /// assert_eq!(scope.classify(&url), ScopeDecision::ScopeViolation);
    /// ```
    pub fn classify(&self, url: &Url) -> ScopeDecision {
        match extract_domain(url) {
            Some(host) if self.allows_host(&host) => ScopeDecision::InScope,
            _ => ScopeDecision::ScopeViolation,
        }
    }

    pub fn allows_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.adopted.iter().any(|h| *h == host)
            || self.patterns.iter().any(|p| matches_wildcard(p, &host))
    }

    /// Adds an exact host to the scope
    ///
    /// Returns true if the host was not already allowed.
    pub fn adopt_host(&mut self, host: &str) -> bool {
        if self.allows_host(host) {
            return false;
        }
        self.adopted.push(host.to_lowercase());
        true
    }

    /// Configured patterns followed by adopted hosts
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.patterns
            .iter()
            .chain(self.adopted.iter())
            .map(String::as_str)
    }
}
