use site_sentinel::config::Config;
use site_sentinel::normalize_url;
use wiremock::ResponseTemplate;

/// Configuration for a fast run against a local mock server
pub fn test_config(seed: &str) -> Config {
    let mut config = Config::for_seed(seed);
    config.validator.politeness_delay_ms = 0;
    config.validator.per_host_concurrency = 4;
    config.validator.deadline_secs = 30;
    config.fetcher.max_retries = 0;
    config.fetcher.retry_backoff_ms = 10;
    config.fetcher.request_timeout_ms = 5_000;
    config.user_agent.crawler_name = "SentinelTest".to_string();
    config
}

/// An HTML page response
pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html")
}

/// Canonical form of `url`, as stored on page records
pub fn canonical(url: &str) -> String {
    normalize_url(url).unwrap().to_string()
}
