//! URL frontier: discovered-but-not-yet-fetched URLs
//!
//! The frontier owns the run's seen-set and hands URLs out in breadth-first
//! order (by depth, then by insertion within a depth). It enforces the scope,
//! the depth bound and the page bound, which together guarantee termination.

use crate::url::{extract_domain, normalize_url, Scope, ScopeDecision};
use crate::UrlError;
use std::collections::{BTreeMap, HashSet, VecDeque};
use url::Url;

/// A URL accepted by the frontier and waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// Discovery ordinal, also the page record id
    pub id: u64,

    /// Canonical URL
    pub url: Url,

    /// Lowercase host of `url`
    pub host: String,

    /// Link depth from the seed
    pub depth: u32,
}

/// Result of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Newly accepted under the given discovery ordinal
    Accepted(u64),
    AlreadySeen,
    ScopeViolation,
    DepthExceeded,
    PageLimitReached,
    /// The frontier stopped accepting URLs (deadline)
    Closed,
}

impl EnqueueOutcome {
    pub fn accepted_id(&self) -> Option<u64> {
        match self {
            Self::Accepted(id) => Some(*id),
            _ => None,
        }
    }
}

/// Breadth-first frontier with deduplication on canonical URLs
#[derive(Debug)]
pub struct Frontier {
    queues: BTreeMap<u32, VecDeque<QueuedUrl>>,
    seen: HashSet<String>,
    scope: Scope,
    max_depth: u32,
    max_pages: usize,
    next_id: u64,
    closed: bool,
}

impl Frontier {
    pub fn new(scope: Scope, max_depth: u32, max_pages: usize) -> Self {
        Self {
            queues: BTreeMap::new(),
            seen: HashSet::new(),
            scope,
            max_depth,
            max_pages,
            next_id: 0,
            closed: false,
        }
    }

    /// Canonicalizes `raw` and offers it to the frontier
    pub fn enqueue(&mut self, raw: &str, depth: u32) -> Result<EnqueueOutcome, UrlError> {
        let url = normalize_url(raw)?;
        Ok(self.enqueue_url(url, depth))
    }

    /// Offers an already canonical URL to the frontier
    ///
    /// Checks run in a fixed order: closed, scope, seen, depth, page limit.
    /// Only accepted URLs enter the seen-set, so a URL refused for depth may
    /// still be accepted later through a shallower path.
    pub fn enqueue_url(&mut self, url: Url, depth: u32) -> EnqueueOutcome {
        if self.closed {
            return EnqueueOutcome::Closed;
        }

        if self.scope.classify(&url) == ScopeDecision::ScopeViolation {
            tracing::trace!("Dropping out-of-scope URL {}", url);
            return EnqueueOutcome::ScopeViolation;
        }

        if self.seen.contains(url.as_str()) {
            return EnqueueOutcome::AlreadySeen;
        }

        if depth > self.max_depth {
            return EnqueueOutcome::DepthExceeded;
        }

        if self.next_id as usize >= self.max_pages {
            return EnqueueOutcome::PageLimitReached;
        }

        // Scope classification already proved a host exists
        let host = extract_domain(&url).unwrap_or_default();
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(url.as_str().to_string());
        self.queues.entry(depth).or_default().push_back(QueuedUrl {
            id,
            url,
            host,
            depth,
        });

        EnqueueOutcome::Accepted(id)
    }

    /// Next URL in breadth-first order
    pub fn dequeue(&mut self) -> Option<QueuedUrl> {
        self.dequeue_ready(|_| true)
    }

    /// Next URL in breadth-first order whose entry satisfies `ready`
    ///
    /// URLs that are skipped keep their position.
    pub fn dequeue_ready<F>(&mut self, mut ready: F) -> Option<QueuedUrl>
    where
        F: FnMut(&QueuedUrl) -> bool,
    {
        let mut found = None;
        for (depth, queue) in self.queues.iter() {
            if let Some(pos) = queue.iter().position(&mut ready) {
                found = Some((*depth, pos));
                break;
            }
        }

        let (depth, pos) = found?;
        let queue = self.queues.get_mut(&depth)?;
        let queued = queue.remove(pos);
        if queue.is_empty() {
            self.queues.remove(&depth);
        }
        queued
    }

    /// Extends the scope with a host discovered through the seed's redirect
    pub fn adopt_host(&mut self, host: &str) -> bool {
        let adopted = self.scope.adopt_host(host);
        if adopted {
            tracing::info!("Adopted {} as an in-scope host", host);
        }
        adopted
    }

    /// Stops accepting new URLs
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Removes and returns everything still queued, in breadth-first order
    pub fn drain(&mut self) -> Vec<QueuedUrl> {
        std::mem::take(&mut self.queues)
            .into_values()
            .flatten()
            .collect()
    }

    /// Queued URLs in breadth-first order
    pub fn iter(&self) -> impl Iterator<Item = &QueuedUrl> {
        self.queues.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Number of URLs accepted so far
    pub fn accepted(&self) -> u64 {
        self.next_id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}
