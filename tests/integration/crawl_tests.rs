use crate::common::{canonical, html, test_config};
use site_sentinel::crawler::Validator;
use site_sentinel::{ErrorDetail, IssueKind, PageStatus, Severity};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TLS_PROXY_BODY: &str =
    "Bad Gateway: upstream connect error: x509: certificate signed by unknown authority";

#[tokio::test]
async fn test_end_to_end_severity_classification() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
            <a href="/ok-one">One</a>
            <a href="/ok-two">Two</a>
            <a href="/tls-a">TLS A</a>
            <a href="/tls-b">TLS B</a>
            <a href="/missing">Missing</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    for page in ["/ok-one", "/ok-two"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("<html><title>Fine</title><body>ok</body></html>"))
            .mount(&server)
            .await;
    }
    for page in ["/tls-a", "/tls-b"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(503).set_body_string(TLS_PROXY_BODY))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let run = Validator::new(test_config(&base))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(run.records.len(), 6);
    assert!(!run.deadline_hit);
    assert_eq!(run.count_by_status(PageStatus::Fetched), 3);
    assert_eq!(run.count_by_status(PageStatus::Failed), 3);

    let high: Vec<_> = run
        .issues
        .iter()
        .filter(|i| i.severity == Severity::High)
        .collect();
    assert_eq!(high.len(), 2);
    assert!(high.iter().all(|i| i.kind == IssueKind::TlsFailure));
    for page in ["/tls-a", "/tls-b"] {
        let record = run.record(&canonical(&format!("{}{}", base, page))).unwrap();
        assert_eq!(record.status_code, Some(503));
    }

    let medium: Vec<_> = run
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Medium)
        .collect();
    assert_eq!(medium.len(), 1);
    assert_eq!(medium[0].kind, IssueKind::BrokenLink);
    assert_eq!(medium[0].url, canonical(&format!("{}/missing", base)));
    assert_eq!(medium[0].source_url.as_deref(), Some(canonical(&base).as_str()));

    assert_eq!(run.issues.len(), 3);

    for clean in [base.clone(), format!("{}/ok-one", base), format!("{}/ok-two", base)] {
        let url = canonical(&clean);
        assert!(run.issues.iter().all(|i| i.url != url), "{} should be clean", url);
        assert_eq!(run.record(&url).unwrap().status, PageStatus::Fetched);
    }

    let seed = run.record(&canonical(&base)).unwrap();
    assert_eq!(seed.title.as_deref(), Some("Home"));
    assert_eq!(seed.id, 0);
}

#[tokio::test]
async fn test_each_canonical_url_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/a">a</a>
            <a href="/a/">a slash</a>
            <a href="/a#section">a fragment</a>
            <a href="/a?utm_source=newsletter">a tracked</a>
            <a href="/b">b</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/">home</a><a href="/b">b</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/a">a</a><a href="/b">self</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let run = Validator::new(test_config(&base))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(run.records.len(), 3);
    assert!(run.issues.is_empty());

    let ids: Vec<u64> = run.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_redirect_loop_is_bounded() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/loop">loop</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.fetcher.max_redirects = 5;
    let run = Validator::new(config).unwrap().run().await.unwrap();

    let looped = run.record(&canonical(&format!("{}/loop", base))).unwrap();
    assert_eq!(looped.status, PageStatus::Failed);
    assert!(matches!(
        looped.error,
        Some(ErrorDetail::RedirectExhausted { hops: 5, .. })
    ));

    assert_eq!(run.issues.len(), 1);
    assert_eq!(run.issues[0].kind, IssueKind::RedirectExhausted);
    assert_eq!(run.issues[0].severity, Severity::Medium);
}

#[tokio::test]
async fn test_server_error_on_login_is_medium() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/login">Sign in</a><a href="/api">API</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let run = Validator::new(test_config(&base))
        .unwrap()
        .run()
        .await
        .unwrap();

    let severity_of = |page: &str| {
        let url = canonical(&format!("{}{}", base, page));
        run.issues.iter().find(|i| i.url == url).unwrap().severity
    };
    assert_eq!(severity_of("/login"), Severity::Medium);
    assert_eq!(severity_of("/api"), Severity::High);
    assert_eq!(run.issues[0].severity, Severity::High);
}

#[tokio::test]
async fn test_depth_and_page_limits() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/1">1</a><a href="/2">2</a><a href="/3">3</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1"))
        .respond_with(html(r#"<a href="/1/deeper">deeper</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/deeper"))
        .respond_with(html("never fetched"))
        .expect(0)
        .mount(&server)
        .await;
    for page in ["/2", "/3"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("leaf"))
            .mount(&server)
            .await;
    }

    let mut config = test_config(&base);
    config.validator.max_depth = 1;
    let run = Validator::new(config).unwrap().run().await.unwrap();
    assert_eq!(run.records.len(), 4);
    assert!(run.records.iter().all(|r| r.depth <= 1));

    let mut config = test_config(&base);
    config.validator.max_pages = 2;
    let run = Validator::new(config).unwrap().run().await.unwrap();
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.count_by_status(PageStatus::Pending), 0);
}

#[tokio::test]
async fn test_unreachable_seed_is_high() {
    // Nothing listens on the discard port on loopback
    let mut config = test_config("http://127.0.0.1:9/");
    config.fetcher.connect_timeout_ms = 500;
    let run = Validator::new(config).unwrap().run().await.unwrap();

    assert_eq!(run.records.len(), 1);
    let seed = &run.records[0];
    assert_eq!(seed.status, PageStatus::Failed);
    assert!(matches!(
        seed.error,
        Some(ErrorDetail::ConnectionFailed { .. }) | Some(ErrorDetail::Timeout { .. })
    ));
    assert_eq!(run.issues.len(), 1);
    assert_eq!(run.issues[0].severity, Severity::High);
}
