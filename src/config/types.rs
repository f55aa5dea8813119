use serde::Deserialize;

/// Main configuration structure for Site-Sentinel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration with defaults for everything except the seed
    pub fn for_seed(seed: &str) -> Self {
        Self {
            validator: ValidatorConfig::new(seed),
            scope: ScopeConfig::default(),
            fetcher: FetcherConfig::default(),
            user_agent: UserAgentConfig::default(),
            audit: AuditConfig::default(),
            review: ReviewConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Crawl bounds and concurrency limits
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Start URL of the validation run
    pub seed: String,

    /// Maximum link depth from the seed
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of page records per run (the seed included)
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Size of the fetch worker pool
    #[serde(
        rename = "max-concurrent-fetches",
        default = "default_max_concurrent_fetches"
    )]
    pub max_concurrent_fetches: u32,

    /// Maximum in-flight fetches against a single host
    #[serde(
        rename = "per-host-concurrency",
        default = "default_per_host_concurrency"
    )]
    pub per_host_concurrency: u32,

    /// Minimum time between request starts to the same host (milliseconds)
    #[serde(
        rename = "politeness-delay-ms",
        default = "default_politeness_delay_ms"
    )]
    pub politeness_delay_ms: u64,

    /// Global deadline for the whole run (seconds)
    #[serde(rename = "deadline-secs", default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl ValidatorConfig {
    pub fn new(seed: &str) -> Self {
        Self {
            seed: seed.to_string(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            per_host_concurrency: default_per_host_concurrency(),
            politeness_delay_ms: default_politeness_delay_ms(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

/// Hosts the crawl may traverse
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Host patterns (e.g., "docs.example.com" or "*.example.com").
    /// The seed host is always in scope.
    #[serde(rename = "allowed-hosts", default)]
    pub allowed_hosts: Vec<String>,

    /// Adopt the seed's final host when the seed redirects to another host
    #[serde(rename = "follow-seed-redirect", default = "default_true")]
    pub follow_seed_redirect: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            follow_seed_redirect: true,
        }
    }
}

/// HTTP fetcher behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Whole-request timeout (milliseconds)
    #[serde(
        rename = "request-timeout-ms",
        default = "default_request_timeout_ms"
    )]
    pub request_timeout_ms: u64,

    /// Connect timeout (milliseconds)
    #[serde(
        rename = "connect-timeout-ms",
        default = "default_connect_timeout_ms"
    )]
    pub connect_timeout_ms: u64,

    /// Maximum redirect hops followed per fetch
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Additional attempts after a transport failure
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on the number of body bytes read per response
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Explicit proxy URL; when absent the HTTP(S)_PROXY environment is used
    #[serde(default)]
    pub proxy: Option<String>,

    /// Accept invalid certificates (useful behind intercepting proxies)
    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,

    /// Body fragments that mark a proxy 5xx as an upstream TLS failure
    #[serde(
        rename = "tls-failure-markers",
        default = "default_tls_failure_markers"
    )]
    pub tls_failure_markers: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_body_bytes: default_max_body_bytes(),
            proxy: None,
            accept_invalid_certs: false,
            tls_failure_markers: default_tls_failure_markers(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Format: Name/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

/// Severity policy inputs
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Path fragments identifying authentication/login flows
    #[serde(
        rename = "auth-path-patterns",
        default = "default_auth_path_patterns"
    )]
    pub auth_path_patterns: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            auth_path_patterns: default_auth_path_patterns(),
        }
    }
}

/// Pages handed to the rendering collaborator for visual review
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub pages: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the structured issue file
    #[serde(rename = "issues-path", default = "default_issues_path")]
    pub issues_path: String,

    /// Path to the SQLite run database (optional)
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            issues_path: default_issues_path(),
            database_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    5
}

fn default_max_pages() -> usize {
    500
}

fn default_max_concurrent_fetches() -> u32 {
    8
}

fn default_per_host_concurrency() -> u32 {
    2
}

fn default_politeness_delay_ms() -> u64 {
    300
}

fn default_deadline_secs() -> u64 {
    1800
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_tls_failure_markers() -> Vec<String> {
    [
        "certificate verify failed",
        "certificate_verify_failed",
        "tls handshake",
        "ssl handshake",
        "x509:",
        "unable to verify the first certificate",
        "self signed certificate",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_crawler_name() -> String {
    "SiteSentinel".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_auth_path_patterns() -> Vec<String> {
    ["/login", "/signin", "/sign-in", "/auth", "/oauth", "/sso"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_issues_path() -> String {
    "./issues.json".to_string()
}
