//! Validation coordinator - main crawl orchestration logic
//!
//! The coordinator task is the single owner of the frontier, the page
//! records, the link edges and the per-host state. Fetches run as tokio tasks
//! in a `JoinSet`; each holds a permit of the global semaphore and hands its
//! `FetchResult` back by value, so no crawl structure is shared between tasks.

use crate::audit::{AuditPolicy, IssueAggregator, MalformedLink};
use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchPolicy, FetchResult};
use crate::crawler::frontier::{EnqueueOutcome, Frontier};
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::model::{FetchSummary, Issue, LinkEdge, PageRecord};
use crate::render::{NoRenderer, RenderError, Renderer, ReviewSelection};
use crate::state::{HostState, PageStatus};
use crate::url::{extract_domain, normalize_url, Scope};
use crate::SentinelError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{Id as TaskId, JoinSet};
use url::Url;

/// Idle poll interval when no host is ready and nothing is in flight
const MAX_WAIT: Duration = Duration::from_millis(100);

/// Everything a validation run produced
#[derive(Debug, Clone)]
pub struct ValidationRun {
    /// Canonical seed URL
    pub seed: String,

    /// Seed host, or the host the seed redirected to when that was adopted
    pub effective_host: String,

    /// One record per discovered URL, indexed by discovery ordinal
    pub records: Vec<PageRecord>,

    pub edges: Vec<LinkEdge>,

    /// Severity-ordered issues
    pub issues: Vec<Issue>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// The global deadline expired before the frontier was exhausted
    pub deadline_hit: bool,
}

impl ValidationRun {
    pub fn count_by_status(&self, status: PageStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn record(&self, url: &str) -> Option<&PageRecord> {
        self.records.iter().find(|r| r.url == url)
    }
}

/// Runs validations against a configured site
pub struct Validator {
    config: Arc<Config>,
    client: Client,
    policy: Arc<FetchPolicy>,
    renderer: Arc<dyn Renderer>,
    review: ReviewSelection,
}

impl Validator {
    /// Creates a validator without a rendering collaborator
    pub fn new(config: Config) -> Result<Self, SentinelError> {
        Self::with_renderer(config, Arc::new(NoRenderer))
    }

    /// Creates a validator that hands review-selected pages to `renderer`
    ///
    /// Fails if the configuration does not pass [`crate::config::validate`].
    pub fn with_renderer(
        config: Config,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, SentinelError> {
        crate::config::validate(&config)?;
        let client = build_http_client(&config.user_agent, &config.fetcher)?;
        let policy = Arc::new(FetchPolicy::from_config(&config.fetcher));
        let review = ReviewSelection::from_pages(&config.review.pages);

        Ok(Self {
            config: Arc::new(config),
            client,
            policy,
            renderer,
            review,
        })
    }

    /// Replaces the page selection for visual review
    pub fn with_review(mut self, review: ReviewSelection) -> Self {
        self.review = review;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one validation from the configured seed
    ///
    /// Per-page failures never abort the run; they become issues. Only a
    /// frontier corruption (a URL dispatched twice, a record lost) returns
    /// an error.
    pub async fn run(&self) -> Result<ValidationRun, SentinelError> {
        let started_at = Utc::now();
        let validator = &self.config.validator;
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(validator.deadline_secs);

        let seed = normalize_url(&validator.seed)?;
        let scope = Scope::for_seed(&seed, &self.config.scope.allowed_hosts);
        let mut crawl = Crawl::new(
            Arc::clone(&self.config),
            Frontier::new(scope, validator.max_depth, validator.max_pages),
            extract_domain(&seed).unwrap_or_default(),
        );

        match crawl.frontier.enqueue_url(seed.clone(), 0) {
            EnqueueOutcome::Accepted(id) => crawl.push_record(id, seed.as_str(), 0)?,
            outcome => {
                return Err(SentinelError::FrontierCorruption {
                    url: seed.to_string(),
                    reason: format!("seed refused by frontier: {:?}", outcome),
                })
            }
        }

        tracing::info!(
            "Starting validation of {} (max depth {}, max pages {}, deadline {}s)",
            seed,
            validator.max_depth,
            validator.max_pages,
            validator.deadline_secs
        );

        let deadline_hit = self.crawl_until(&mut crawl, deadline).await?;

        if !deadline_hit && tokio::time::Instant::now() < deadline {
            self.render_selected(&mut crawl, deadline).await;
        }

        let issues = crawl.aggregator.finalize(&crawl.records);
        let finished_at = Utc::now();

        tracing::info!(
            "Validation finished: {} pages ({} fetched, {} failed, {} pending), {} issues{}",
            crawl.records.len(),
            crawl.count(PageStatus::Fetched),
            crawl.count(PageStatus::Failed),
            crawl.count(PageStatus::Pending),
            issues.len(),
            if deadline_hit { ", deadline hit" } else { "" }
        );

        Ok(ValidationRun {
            seed: seed.to_string(),
            effective_host: crawl.effective_host,
            records: crawl.records,
            edges: crawl.edges,
            issues,
            started_at,
            finished_at,
            deadline_hit,
        })
    }

    /// Dispatches and collects fetches until the frontier drains or the
    /// deadline expires. Returns whether the deadline was hit.
    async fn crawl_until(
        &self,
        crawl: &mut Crawl,
        deadline: tokio::time::Instant,
    ) -> Result<bool, SentinelError> {
        let semaphore = Arc::new(Semaphore::new(
            self.config.validator.max_concurrent_fetches as usize,
        ));
        let mut tasks: JoinSet<(u64, FetchResult)> = JoinSet::new();
        // Task id -> record id, so a task that dies still frees its slot
        let mut task_records: HashMap<TaskId, u64> = HashMap::new();
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        let mut deadline_hit = false;

        loop {
            self.dispatch_ready(crawl, &mut tasks, &mut task_records, &semaphore)?;

            if tasks.is_empty() && crawl.frontier.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }

            let wait = crawl.wait_hint();

            tokio::select! {
                _ = &mut expiry => {
                    deadline_hit = true;
                    break;
                }
                joined = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    match joined {
                        Some(Ok((task_id, (id, result)))) => {
                            task_records.remove(&task_id);
                            crawl.complete(id, result)?;
                        }
                        Some(Err(e)) => {
                            tracing::error!("Fetch task failed: {}", e);
                            if let Some(id) = task_records.remove(&e.id()) {
                                crawl.abandon(id, FetchSummary::lost("fetch task failed"))?;
                            }
                        }
                        None => {}
                    }
                }
                _ = tokio::time::sleep(wait), if !crawl.frontier.is_empty() => {}
            }
        }

        if deadline_hit {
            crawl.frontier.close();
            tracing::warn!(
                "Deadline reached with {} fetches in flight and {} URLs queued",
                tasks.len(),
                crawl.frontier.len()
            );

            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                // Fetches that finished in the same instant still count
                if let Ok((id, result)) = joined {
                    crawl.complete(id, result)?;
                }
            }

            for id in crawl.in_flight_ids() {
                crawl.abandon(id, FetchSummary::deadline_exceeded())?;
            }

            let queued = crawl.frontier.drain();
            tracing::debug!("{} queued URLs left pending", queued.len());
        }

        // Tasks that died without reporting back
        for id in crawl.in_flight_ids() {
            crawl.abandon(id, FetchSummary::lost("fetch task failed"))?;
        }

        Ok(deadline_hit)
    }

    /// Starts fetches for every ready URL the global pool has room for
    fn dispatch_ready(
        &self,
        crawl: &mut Crawl,
        tasks: &mut JoinSet<(u64, FetchResult)>,
        task_records: &mut HashMap<TaskId, u64>,
        semaphore: &Arc<Semaphore>,
    ) -> Result<(), SentinelError> {
        loop {
            if crawl.frontier.is_empty() {
                return Ok(());
            }

            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                return Ok(());
            };

            let now = std::time::Instant::now();
            let limits = &self.config.validator;
            let hosts = &crawl.hosts;
            let next = crawl.frontier.dequeue_ready(|queued| {
                hosts
                    .get(&queued.host)
                    .map_or(true, |state| state.can_request(limits, now))
            });

            let Some(queued) = next else {
                return Ok(());
            };

            crawl.mark_dispatched(queued.id, &queued.host, queued.url.as_str())?;
            crawl
                .hosts
                .entry(queued.host.clone())
                .or_default()
                .record_dispatch(now);

            tracing::debug!("Fetching {} (depth {})", queued.url, queued.depth);

            let client = self.client.clone();
            let policy = Arc::clone(&self.policy);
            let id = queued.id;
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = fetch_url(&client, &queued.url, &policy).await;
                (queued.id, result)
            });
            task_records.insert(handle.id(), id);
        }
    }

    /// Hands review-selected fetched pages to the renderer
    async fn render_selected(&self, crawl: &mut Crawl, deadline: tokio::time::Instant) {
        if self.review.is_empty() {
            return;
        }

        let selected: Vec<String> = crawl
            .records
            .iter()
            .filter(|r| r.status == PageStatus::Fetched && self.review.selects(&r.url))
            .map(|r| r.url.clone())
            .collect();

        for page in selected {
            let Ok(url) = Url::parse(&page) else {
                continue;
            };

            match tokio::time::timeout_at(deadline, self.renderer.capture(&url)).await {
                Ok(Ok(capture)) => {
                    tracing::debug!(
                        "Rendered {}: {} console entries, {} defects",
                        page,
                        capture.console.len(),
                        capture.defects.len()
                    );
                    crawl.aggregator.record_capture(page, capture);
                }
                Ok(Err(RenderError::Unavailable(reason))) => {
                    tracing::info!("Skipping visual review: {}", reason);
                    return;
                }
                Ok(Err(e)) => tracing::warn!("Render failed for {}: {}", page, e),
                Err(_) => {
                    tracing::warn!("Deadline reached during visual review");
                    return;
                }
            }
        }
    }
}

/// Mutable state of one run, owned by the coordinator task
struct Crawl {
    config: Arc<Config>,
    frontier: Frontier,
    records: Vec<PageRecord>,
    edges: Vec<LinkEdge>,
    aggregator: IssueAggregator,
    hosts: HashMap<String, HostState>,
    /// Record id -> host for fetches in flight
    dispatched: HashMap<u64, String>,
    effective_host: String,
    completed: usize,
}

impl Crawl {
    fn new(config: Arc<Config>, frontier: Frontier, seed_host: String) -> Self {
        let aggregator = IssueAggregator::new(AuditPolicy::from_config(&config.audit));
        Self {
            config,
            frontier,
            records: Vec::new(),
            edges: Vec::new(),
            aggregator,
            hosts: HashMap::new(),
            dispatched: HashMap::new(),
            effective_host: seed_host,
            completed: 0,
        }
    }

    fn count(&self, status: PageStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Creates the pending record for a URL the frontier just accepted
    fn push_record(&mut self, id: u64, url: &str, depth: u32) -> Result<(), SentinelError> {
        if id as usize != self.records.len() {
            return Err(SentinelError::FrontierCorruption {
                url: url.to_string(),
                reason: format!(
                    "discovery ordinal {} does not follow {} records",
                    id,
                    self.records.len()
                ),
            });
        }
        self.records.push(PageRecord::pending(id, url, depth));
        Ok(())
    }

    fn mark_dispatched(&mut self, id: u64, host: &str, url: &str) -> Result<(), SentinelError> {
        let pending = self
            .records
            .get(id as usize)
            .is_some_and(PageRecord::is_pending);

        if !pending || self.dispatched.contains_key(&id) {
            return Err(SentinelError::FrontierCorruption {
                url: url.to_string(),
                reason: "URL dispatched twice".to_string(),
            });
        }

        self.dispatched.insert(id, host.to_string());
        Ok(())
    }

    fn in_flight_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.dispatched.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Time until the politeness delay of some queued host elapses
    fn wait_hint(&self) -> Duration {
        let now = std::time::Instant::now();
        let limits = &self.config.validator;

        self.frontier
            .iter()
            .filter_map(|queued| self.hosts.get(&queued.host))
            .filter(|state| state.in_flight < limits.per_host_concurrency)
            .filter_map(|state| state.time_until_next_request(limits, now))
            .min()
            .map_or(MAX_WAIT, |wait| wait.clamp(Duration::from_millis(1), MAX_WAIT))
    }

    /// Releases the host slot held by a dispatched fetch
    fn release(&mut self, id: u64) -> Result<(), SentinelError> {
        let host = self
            .dispatched
            .remove(&id)
            .ok_or_else(|| SentinelError::FrontierCorruption {
                url: self
                    .records
                    .get(id as usize)
                    .map(|r| r.url.clone())
                    .unwrap_or_default(),
                reason: "completion for a fetch that was not in flight".to_string(),
            })?;

        if let Some(state) = self.hosts.get_mut(&host) {
            state.record_completion();
        }
        Ok(())
    }

    fn record_mut(&mut self, id: u64) -> Result<&mut PageRecord, SentinelError> {
        self.records
            .get_mut(id as usize)
            .ok_or_else(|| SentinelError::FrontierCorruption {
                url: String::new(),
                reason: format!("no page record with id {}", id),
            })
    }

    /// Finishes a dispatched record that never produced a fetch result
    fn abandon(&mut self, id: u64, summary: FetchSummary) -> Result<(), SentinelError> {
        self.release(id)?;
        let record = self.record_mut(id)?;
        tracing::debug!("Abandoning {}", record.url);
        record.finish(summary, Utc::now())
    }

    /// Applies a fetch result and follows the links it yielded
    fn complete(&mut self, id: u64, result: FetchResult) -> Result<(), SentinelError> {
        self.release(id)?;

        let parsed = result
            .html_body()
            .map(|body| parse_html(body, &result.final_url));
        let title = parsed.as_ref().and_then(|p| p.title.clone());
        let summary = result.to_summary(title);

        if id == 0 && self.config.scope.follow_seed_redirect && !result.redirect_chain.is_empty() {
            if let Some(host) = extract_domain(&result.final_url) {
                if self.frontier.adopt_host(&host) {
                    self.effective_host = host;
                }
            }
        }

        let record = self.record_mut(id)?;
        record.finish(summary, Utc::now())?;

        match &record.error {
            None => tracing::debug!(
                "Fetched {} ({})",
                record.url,
                record.status_code.unwrap_or_default()
            ),
            Some(error) => tracing::warn!("{}: {}", record.url, error),
        }

        let source = record.url.clone();
        let depth = record.depth;

        if let Some(parsed) = parsed {
            self.follow_links(id, &source, depth, parsed)?;
        }

        self.completed += 1;
        if self.completed % 10 == 0 {
            tracing::info!(
                "Progress: {} pages completed, {} in flight, {} queued",
                self.completed,
                self.dispatched.len(),
                self.frontier.len()
            );
        }

        Ok(())
    }

    fn follow_links(
        &mut self,
        page_id: u64,
        source: &str,
        depth: u32,
        parsed: ParsedPage,
    ) -> Result<(), SentinelError> {
        for href in parsed.malformed {
            tracing::debug!("Malformed link on {}: {}", source, href);
            self.aggregator.record_malformed(MalformedLink {
                page_id,
                source_url: source.to_string(),
                href,
            });
        }

        let child_depth = depth + 1;
        for link in parsed.links {
            let target = link.to_string();
            match self.frontier.enqueue_url(link, child_depth) {
                EnqueueOutcome::ScopeViolation => continue,
                EnqueueOutcome::Accepted(id) => self.push_record(id, &target, child_depth)?,
                _ => {}
            }

            let edge = LinkEdge::new(source, target);
            self.aggregator.record_edge(&edge);
            self.edges.push(edge);
        }

        Ok(())
    }
}
