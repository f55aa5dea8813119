use crate::common::{canonical, html, test_config};
use site_sentinel::crawler::Validator;
use site_sentinel::{ErrorDetail, IssueKind, PageStatus, Severity};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

#[tokio::test]
async fn test_deadline_abandons_in_flight_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/slow">slow</a><a href="/quick">quick</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quick"))
        .respond_with(html("quick"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("slow").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.validator.deadline_secs = 1;

    let started = Instant::now();
    let run = Validator::new(config).unwrap().run().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));

    assert!(run.deadline_hit);
    assert_eq!(run.records.len(), 3);

    let slow = run.record(&canonical(&format!("{}/slow", base))).unwrap();
    assert_eq!(slow.status, PageStatus::Failed);
    assert_eq!(slow.error, Some(ErrorDetail::DeadlineExceeded));

    let quick = run.record(&canonical(&format!("{}/quick", base))).unwrap();
    assert_eq!(quick.status, PageStatus::Fetched);

    assert_eq!(run.issues.len(), 1);
    assert_eq!(run.issues[0].kind, IssueKind::Timeout);
    assert_eq!(run.issues[0].severity, Severity::Low);
}

#[tokio::test]
async fn test_request_timeout_is_high() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/stuck">stuck</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stuck"))
        .respond_with(html("late").set_delay(Duration::from_secs(3)))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = test_config(&base);
    config.fetcher.request_timeout_ms = 200;
    config.fetcher.max_retries = 1;

    let run = Validator::new(config).unwrap().run().await.unwrap();
    assert!(!run.deadline_hit);

    let stuck = run.record(&canonical(&format!("{}/stuck", base))).unwrap();
    assert_eq!(stuck.error, Some(ErrorDetail::Timeout { attempts: 2 }));
    assert_eq!(stuck.attempts, 2);

    assert_eq!(run.issues.len(), 1);
    assert_eq!(run.issues[0].kind, IssueKind::Timeout);
    assert_eq!(run.issues[0].severity, Severity::High);
}
