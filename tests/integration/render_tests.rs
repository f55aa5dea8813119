use crate::common::{canonical, html, test_config};
use async_trait::async_trait;
use site_sentinel::crawler::Validator;
use site_sentinel::render::{
    ConsoleEntry, ConsoleLevel, FailedRequest, RenderCapture, RenderError, Renderer,
    ReviewSelection,
};
use site_sentinel::{IssueKind, Severity};
use std::sync::{Arc, Mutex};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renderer that reports a fixed capture and remembers what it was asked for
#[derive(Default)]
struct FakeRenderer {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn capture(&self, url: &Url) -> Result<RenderCapture, RenderError> {
        self.seen.lock().unwrap().push(url.to_string());
        Ok(RenderCapture {
            screenshot: Some(format!("shots/{}.png", url.path().trim_matches('/'))),
            console: vec![
                ConsoleEntry::new(ConsoleLevel::Error, "Uncaught ReferenceError: x"),
                ConsoleEntry::new(ConsoleLevel::Info, "hydrated"),
            ],
            failed_requests: vec![FailedRequest {
                url: "https://cdn.invalid/app.css".to_string(),
                failure: "net::ERR_ABORTED".to_string(),
            }],
            defects: vec!["Navigation menu overflows viewport".to_string()],
        })
    }
}

async fn site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/pricing">Pricing</a><a href="/gone">Gone</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(html("pricing"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_configured_review_pages_are_rendered() {
    let server = site().await;
    let pricing = canonical(&format!("{}/pricing", server.uri()));

    let mut config = test_config(&server.uri());
    config.review.pages = vec![format!("{}/pricing/", server.uri())];

    let renderer = Arc::new(FakeRenderer::default());
    let run = Validator::with_renderer(config, renderer.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(*renderer.seen.lock().unwrap(), vec![pricing.clone()]);

    let rendered: Vec<_> = run.issues.iter().filter(|i| i.url == pricing).collect();
    let kinds: Vec<(IssueKind, Severity)> = rendered.iter().map(|i| (i.kind, i.severity)).collect();
    assert_eq!(
        kinds,
        vec![
            (IssueKind::ConsoleError, Severity::Low),
            (IssueKind::VisualDefect, Severity::Low),
            (IssueKind::ConsoleError, Severity::Info),
        ]
    );
    let defect = rendered
        .iter()
        .find(|i| i.kind == IssueKind::VisualDefect)
        .unwrap();
    assert_eq!(defect.evidence.as_deref(), Some("shots/pricing.png"));
}

#[tokio::test]
async fn test_review_all_skips_failed_pages() {
    let server = site().await;
    let renderer = Arc::new(FakeRenderer::default());

    let run = Validator::with_renderer(test_config(&server.uri()), renderer.clone())
        .unwrap()
        .with_review(ReviewSelection::All)
        .run()
        .await
        .unwrap();

    let seen = renderer.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(!seen.iter().any(|u| u.ends_with("/gone")));

    let gone = canonical(&format!("{}/gone", server.uri()));
    let gone_issues: Vec<_> = run.issues.iter().filter(|i| i.url == gone).collect();
    assert_eq!(gone_issues.len(), 1);
    assert_eq!(gone_issues[0].kind, IssueKind::BrokenLink);
    assert_eq!(gone_issues[0].severity, Severity::Medium);
}

#[tokio::test]
async fn test_no_renderer_yields_only_fetch_issues() {
    let server = site().await;
    let run = Validator::new(test_config(&server.uri()))
        .unwrap()
        .with_review(ReviewSelection::All)
        .run()
        .await
        .unwrap();

    assert_eq!(run.issues.len(), 1);
    assert_eq!(run.issues[0].kind, IssueKind::BrokenLink);
}
