use crate::common::{canonical, html, test_config};
use site_sentinel::crawler::Validator;
use site_sentinel::PageStatus;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The seed on `localhost` redirects to `127.0.0.1`; links on the new host
/// are followed and third-party links are dropped.
#[tokio::test]
async fn test_seed_redirect_adopts_final_host() {
    let origin = MockServer::start().await;
    let platform = MockServer::start().await;
    let origin_port = origin.address().port();
    let platform_base = platform.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/", platform_base).as_str()),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<a href="{0}/docs">Docs</a>
            <a href="http://thirdparty.invalid/widget">Widget</a>"#,
            platform_base
        )))
        .mount(&platform)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html("docs"))
        .expect(1)
        .mount(&platform)
        .await;

    let seed = format!("http://localhost:{}/", origin_port);
    let run = Validator::new(test_config(&seed))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(run.effective_host, "127.0.0.1");
    assert_eq!(run.records.len(), 2);

    let seed_record = &run.records[0];
    assert_eq!(seed_record.url, canonical(&seed));
    assert_eq!(seed_record.status, PageStatus::Fetched);
    assert_eq!(seed_record.redirect_chain, vec![canonical(&seed)]);

    let docs = canonical(&format!("{}/docs", platform_base));
    assert_eq!(run.record(&docs).unwrap().status, PageStatus::Fetched);
    assert!(run.records.iter().all(|r| !r.url.contains("thirdparty")));
    assert!(run.edges.iter().all(|e| !e.target.contains("thirdparty")));
    assert!(run.issues.is_empty());
}

#[tokio::test]
async fn test_seed_redirect_not_followed_when_disabled() {
    let origin = MockServer::start().await;
    let platform = MockServer::start().await;
    let platform_base = platform.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/", platform_base).as_str()),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(r#"<a href="{}/docs">Docs</a>"#, platform_base)))
        .mount(&platform)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html("docs"))
        .expect(0)
        .mount(&platform)
        .await;

    let seed = format!("http://localhost:{}/", origin.address().port());
    let mut config = test_config(&seed);
    config.scope.follow_seed_redirect = false;
    let run = Validator::new(config).unwrap().run().await.unwrap();

    assert_eq!(run.effective_host, "localhost");
    assert_eq!(run.records.len(), 1);
}

#[tokio::test]
async fn test_allowed_hosts_extend_scope() {
    let origin = MockServer::start().await;
    let other = MockServer::start().await;
    let other_docs = format!("http://localhost:{}/docs", other.address().port());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(r#"<a href="{}">Docs</a>"#, other_docs)))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&other)
        .await;

    let mut config = test_config(&origin.uri());
    config.scope.allowed_hosts = vec!["127.0.0.1".to_string(), "localhost".to_string()];
    let run = Validator::new(config).unwrap().run().await.unwrap();

    assert_eq!(run.records.len(), 2);
    assert_eq!(run.issues.len(), 1);
    assert_eq!(run.issues[0].url, canonical(&other_docs));
}
