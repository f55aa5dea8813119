//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the validator, including:
//! - Building HTTP clients with the configured user agent, timeouts and proxy
//! - Manual redirect following with a hop bound
//! - Retry with exponential backoff for transport failures
//! - Response and error classification

use crate::config::{FetcherConfig, UserAgentConfig};
use crate::model::{ErrorDetail, FetchSummary};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Proxy, Response, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

/// Substrings of a transport error chain that indicate a TLS failure
const TLS_ERROR_HINTS: &[&str] = &[
    "certificate",
    "handshake",
    "x509",
    "tls",
    "ssl",
    "received corrupt message",
    "peer is incompatible",
];

/// How a single logical fetch behaves
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_redirects: u32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_body_bytes: usize,
    pub tls_markers: Vec<String>,
}

impl FetchPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_redirects: config.max_redirects,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_body_bytes: config.max_body_bytes,
            tls_markers: config
                .tls_failure_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1u32 << exponent)
    }

    /// Returns the first configured TLS marker found in a proxy error body
    pub fn upstream_tls_marker(&self, body: &str) -> Option<&str> {
        let body = body.to_lowercase();
        self.tls_markers
            .iter()
            .find(|marker| body.contains(marker.as_str()))
            .map(String::as_str)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

/// Classification of a completed fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response
    Success {
        status_code: u16,
        content_type: Option<String>,
        headers: HeaderMap,
        /// Body text; empty unless the content type is HTML
        body: String,
    },

    /// The redirect bound was reached
    RedirectExhausted { hops: u32 },

    /// 4xx response
    ClientError { status_code: u16 },

    /// 5xx response without TLS failure markers
    ServerError { status_code: u16 },

    /// Certificate verification or handshake failure. `upstream` is set when
    /// a proxy reported it in a 502/503/504 body; `status_code` is that
    /// gateway status.
    TlsHandshakeFailure {
        message: String,
        upstream: bool,
        status_code: Option<u16>,
    },

    /// Connection refused, DNS failure, reset
    ConnectionFailed { message: String },

    Timeout,

    /// Any other failure (invalid redirect location, unexpected status, ...)
    RequestFailed { message: String },
}

impl FetchOutcome {
    /// Transport failures are retried; HTTP responses never are
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TlsHandshakeFailure {
                upstream: false,
                ..
            } | Self::ConnectionFailed { .. }
                | Self::Timeout
        )
    }
}

/// Result of one logical fetch (redirects and retries included)
#[derive(Debug)]
pub struct FetchResult {
    pub outcome: FetchOutcome,

    /// Number of request attempts made
    pub attempts: u32,

    /// URLs that answered with a redirect, in order
    pub redirect_chain: Vec<Url>,

    /// Last URL requested
    pub final_url: Url,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    /// HTML body of a successful fetch
    pub fn html_body(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }

    /// Converts the fetch into the fields stored on a page record
    pub fn to_summary(&self, title: Option<String>) -> FetchSummary {
        let mut summary = FetchSummary {
            final_url: Some(self.final_url.to_string()),
            redirect_chain: self.redirect_chain.iter().map(Url::to_string).collect(),
            attempts: self.attempts,
            ..FetchSummary::default()
        };

        match &self.outcome {
            FetchOutcome::Success {
                status_code,
                content_type,
                ..
            } => {
                summary.status_code = Some(*status_code);
                summary.content_type = content_type.clone();
                summary.title = title;
            }
            FetchOutcome::RedirectExhausted { hops } => {
                summary.error = Some(ErrorDetail::RedirectExhausted {
                    hops: *hops,
                    last_url: self.final_url.to_string(),
                });
            }
            FetchOutcome::ClientError { status_code } => {
                summary.status_code = Some(*status_code);
                summary.error = Some(ErrorDetail::ClientError {
                    status: *status_code,
                });
            }
            FetchOutcome::ServerError { status_code } => {
                summary.status_code = Some(*status_code);
                summary.error = Some(ErrorDetail::ServerError {
                    status: *status_code,
                });
            }
            FetchOutcome::TlsHandshakeFailure {
                message,
                upstream,
                status_code,
            } => {
                summary.status_code = *status_code;
                summary.error = Some(ErrorDetail::TlsHandshake {
                    message: message.clone(),
                    upstream: *upstream,
                });
            }
            FetchOutcome::ConnectionFailed { message } => {
                summary.error = Some(ErrorDetail::ConnectionFailed {
                    message: message.clone(),
                });
            }
            FetchOutcome::Timeout => {
                summary.error = Some(ErrorDetail::Timeout {
                    attempts: self.attempts,
                });
            }
            FetchOutcome::RequestFailed { message } => {
                summary.error = Some(ErrorDetail::Request {
                    message: message.clone(),
                });
            }
        }

        summary
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client and followed by [`fetch_url`] so the
/// chain can be recorded. Without an explicit proxy, reqwest honours the
/// `HTTP_PROXY`/`HTTPS_PROXY` environment.
///
/// # Example
///
/// ```no_run
/// use site_sentinel::config::{FetcherConfig, UserAgentConfig};
/// use site_sentinel::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    config: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .use_rustls_tls()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Fetches a URL, following redirects and retrying transport failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | TLS handshake failure | Retry up to `max_retries`, exponential backoff |
/// | Connection failure | Retry up to `max_retries`, exponential backoff |
/// | Timeout | Retry up to `max_retries`, exponential backoff |
/// | HTTP 4xx / 5xx | Immediate |
/// | Proxy-reported TLS failure | Immediate |
/// | Redirect bound reached | Immediate |
pub async fn fetch_url(client: &Client, url: &Url, policy: &FetchPolicy) -> FetchResult {
    let mut attempts = 0;

    loop {
        attempts += 1;
        let (outcome, redirect_chain, final_url) = fetch_once(client, url, policy).await;

        if outcome.is_retryable() && attempts <= policy.max_retries {
            let backoff = policy.backoff_for(attempts);
            tracing::debug!(
                "Attempt {} for {} failed ({:?}), retrying in {:?}",
                attempts,
                url,
                outcome,
                backoff
            );
            tokio::time::sleep(backoff).await;
            continue;
        }

        return FetchResult {
            outcome,
            attempts,
            redirect_chain,
            final_url,
        };
    }
}

/// One attempt: a GET plus any redirects it leads to
async fn fetch_once(
    client: &Client,
    url: &Url,
    policy: &FetchPolicy,
) -> (FetchOutcome, Vec<Url>, Url) {
    let mut current = url.clone();
    let mut chain: Vec<Url> = Vec::new();

    loop {
        let response = match client.get(current.clone()).send().await {
            Ok(response) => response,
            Err(e) => return (classify_transport_error(&e), chain, current),
        };

        let status = response.status();
        if is_followable_redirect(status) {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                if chain.len() as u32 >= policy.max_redirects {
                    let hops = chain.len() as u32;
                    return (FetchOutcome::RedirectExhausted { hops }, chain, current);
                }

                let next = match current.join(location) {
                    Ok(next) => next,
                    Err(e) => {
                        let message = format!("invalid redirect location '{}': {}", location, e);
                        return (FetchOutcome::RequestFailed { message }, chain, current);
                    }
                };

                tracing::trace!("{} redirected ({}) to {}", current, status, next);
                chain.push(std::mem::replace(&mut current, next));
                continue;
            }
        }

        let outcome = classify_response(response, policy).await;
        return (outcome, chain, current);
    }
}

fn is_followable_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

async fn classify_response(response: Response, policy: &FetchPolicy) -> FetchOutcome {
    let status = response.status();
    let status_code = status.as_u16();

    if status.is_client_error() {
        return FetchOutcome::ClientError { status_code };
    }

    if status.is_server_error() {
        // Proxies report failed origin handshakes as gateway errors
        if matches!(status_code, 502..=504) {
            if let Ok(body) = read_body_capped(response, policy.max_body_bytes).await {
                if let Some(marker) = policy.upstream_tls_marker(&body) {
                    return FetchOutcome::TlsHandshakeFailure {
                        message: format!("proxy returned HTTP {}: {}", status_code, marker),
                        upstream: true,
                        status_code: Some(status_code),
                    };
                }
            }
        }
        return FetchOutcome::ServerError { status_code };
    }

    if status.is_success() {
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if content_type.as_deref().is_some_and(is_html) {
            match read_body_capped(response, policy.max_body_bytes).await {
                Ok(body) => body,
                Err(e) => return classify_transport_error(&e),
            }
        } else {
            String::new()
        };

        return FetchOutcome::Success {
            status_code,
            content_type,
            headers,
            body,
        };
    }

    FetchOutcome::RequestFailed {
        message: format!("unexpected HTTP status {}", status),
    }
}

fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

/// Reads at most `cap` bytes of the body
async fn read_body_capped(mut response: Response, cap: usize) -> Result<String, reqwest::Error> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = cap.saturating_sub(buf.len());
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Maps a reqwest error to a transport outcome
///
/// Only the source chain is inspected for TLS hints; the top-level message
/// embeds the URL, whose host could contain "ssl" or "tls".
fn classify_transport_error(e: &reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        return FetchOutcome::Timeout;
    }

    let message = error_chain_message(e);
    if looks_like_tls_failure(&message) {
        return FetchOutcome::TlsHandshakeFailure {
            message,
            upstream: false,
            status_code: None,
        };
    }

    if e.is_connect() {
        return FetchOutcome::ConnectionFailed { message };
    }

    FetchOutcome::RequestFailed {
        message: e.to_string(),
    }
}

fn error_chain_message(e: &reqwest::Error) -> String {
    let mut parts = Vec::new();
    let mut source = e.source();
    while let Some(err) = source {
        parts.push(err.to_string());
        source = err.source();
    }
    if parts.is_empty() {
        e.to_string()
    } else {
        parts.join(": ")
    }
}

fn looks_like_tls_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    TLS_ERROR_HINTS.iter().any(|hint| message.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_policy() -> FetchPolicy {
        FetchPolicy {
            max_redirects: 5,
            max_retries: 0,
            retry_backoff: Duration::from_millis(10),
            max_body_bytes: 64 * 1024,
            tls_markers: FetchPolicy::default().tls_markers,
        }
    }

    fn test_client(timeout_ms: u64) -> Client {
        let fetcher = FetcherConfig {
            request_timeout_ms: timeout_ms,
            ..FetcherConfig::default()
        };
        build_http_client(&UserAgentConfig::default(), &fetcher).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let fetcher = FetcherConfig {
            proxy: Some("http://127.0.0.1:3128".to_string()),
            ..FetcherConfig::default()
        };
        assert!(build_http_client(&UserAgentConfig::default(), &fetcher).is_ok());
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = FetchPolicy {
            retry_backoff: Duration::from_millis(500),
            ..FetchPolicy::default()
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_upstream_marker_case_insensitive() {
        let policy = FetchPolicy::default();
        assert!(policy
            .upstream_tls_marker("upstream connect error: CERTIFICATE_VERIFY_FAILED")
            .is_some());
        assert!(policy.upstream_tls_marker("Service Unavailable").is_none());
    }

    #[test]
    fn test_tls_hints() {
        assert!(looks_like_tls_failure("invalid peer certificate: UnknownIssuer"));
        assert!(looks_like_tls_failure("received corrupt message of type InvalidContentType"));
        assert!(!looks_like_tls_failure("tcp connect error: Connection refused (os error 111)"));
    }

    #[tokio::test]
    async fn test_fetch_success_reads_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><title>Home</title></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(5000), &url(&server, "/"), &test_policy()).await;
        assert!(result.is_success());
        assert_eq!(result.attempts, 1);
        assert!(result.html_body().unwrap().contains("Home"));
        assert!(result.redirect_chain.is_empty());
    }

    #[tokio::test]
    async fn test_non_html_body_not_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 32], "image/png"))
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(5000), &url(&server, "/logo.png"), &test_policy()).await;
        assert!(result.is_success());
        assert!(result.html_body().is_none());
    }

    #[tokio::test]
    async fn test_client_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(5000), &url(&server, "/missing"), &test_policy()).await;
        assert!(matches!(
            result.outcome,
            FetchOutcome::ClientError { status_code: 404 }
        ));
        let summary = result.to_summary(None);
        assert_eq!(summary.error, Some(ErrorDetail::ClientError { status: 404 }));
    }

    #[tokio::test]
    async fn test_plain_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(5000), &url(&server, "/"), &test_policy()).await;
        assert!(matches!(
            result.outcome,
            FetchOutcome::ServerError { status_code: 503 }
        ));
    }

    #[tokio::test]
    async fn test_proxy_reported_tls_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string(
                "upstream connect error: TLS error: 268435581:SSL routines:OPENSSL_internal:CERTIFICATE_VERIFY_FAILED",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let policy = FetchPolicy {
            max_retries: 2,
            ..test_policy()
        };
        let result = fetch_url(&test_client(5000), &url(&server, "/"), &policy).await;
        assert!(matches!(
            result.outcome,
            FetchOutcome::TlsHandshakeFailure { upstream: true, .. }
        ));
        // HTTP responses are never retried
        assert_eq!(result.attempts, 1);

        let summary = result.to_summary(None);
        assert_eq!(summary.status_code, Some(503));
        assert!(matches!(
            summary.error,
            Some(ErrorDetail::TlsHandshake { upstream: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_handshake_against_plain_http_is_tls_failure() {
        let server = MockServer::start().await;
        let policy = FetchPolicy {
            max_retries: 1,
            ..test_policy()
        };
        // An https URL against the plain-HTTP mock server fails the handshake
        let target = Url::parse(&format!("https://{}/", server.address())).unwrap();
        let result = fetch_url(&test_client(5000), &target, &policy).await;

        assert!(
            matches!(
                result.outcome,
                FetchOutcome::TlsHandshakeFailure {
                    upstream: false,
                    status_code: None,
                    ..
                }
            ),
            "unexpected outcome: {:?}",
            result.outcome
        );
        assert_eq!(result.attempts, policy.max_retries + 1);

        let summary = result.to_summary(None);
        assert_eq!(summary.status_code, None);
        assert!(matches!(
            summary.error,
            Some(ErrorDetail::TlsHandshake { upstream: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_redirect_chain_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/middle"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/middle"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(5000), &url(&server, "/old"), &test_policy()).await;
        assert!(result.is_success());
        assert_eq!(result.final_url.path(), "/new");
        let chain: Vec<&str> = result.redirect_chain.iter().map(|u| u.path()).collect();
        assert_eq!(chain, vec!["/old", "/middle"]);
    }

    #[tokio::test]
    async fn test_self_redirect_loop_terminates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(5000), &url(&server, "/loop"), &test_policy()).await;
        assert!(matches!(
            result.outcome,
            FetchOutcome::RedirectExhausted { hops: 5 }
        ));
        let summary = result.to_summary(None);
        assert!(matches!(
            summary.error,
            Some(ErrorDetail::RedirectExhausted { hops: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried() {
        // Reserve a port, then free it so nothing is listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let policy = FetchPolicy {
            max_retries: 2,
            ..test_policy()
        };
        let target = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let result = fetch_url(&test_client(5000), &target, &policy).await;

        assert!(matches!(
            result.outcome,
            FetchOutcome::ConnectionFailed { .. }
        ));
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let result = fetch_url(&test_client(300), &url(&server, "/slow"), &test_policy()).await;
        assert!(matches!(result.outcome, FetchOutcome::Timeout));
        assert_eq!(
            result.to_summary(None).error,
            Some(ErrorDetail::Timeout { attempts: 1 })
        );
    }

    #[tokio::test]
    async fn test_body_capped() {
        let server = MockServer::start().await;
        let big = format!("<html>{}</html>", "a".repeat(10_000));
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(big, "text/html"))
            .mount(&server)
            .await;

        let policy = FetchPolicy {
            max_body_bytes: 1024,
            ..test_policy()
        };
        let result = fetch_url(&test_client(5000), &url(&server, "/"), &policy).await;
        assert_eq!(result.html_body().unwrap().len(), 1024);
    }
}
