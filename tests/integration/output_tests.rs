use crate::common::{html, test_config};
use site_sentinel::crawler::Validator;
use site_sentinel::output::{load_statistics, read_issues_json, write_issues_json, ValidationReport};
use site_sentinel::storage::{open_storage, persist_run, RunStatus, Storage};
use site_sentinel::{PageStatus, Severity};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn small_site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/about">About</a><a href="/broken">Broken</a><a href="/down">Down</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html(r#"<title>About</title><a href="/broken">Broken</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_issues_json_written_and_read_back() {
    let server = small_site().await;
    let dir = TempDir::new().unwrap();
    let issues_path = dir.path().join("out").join("issues.json");

    let run = Validator::new(test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();
    let report = ValidationReport::from_run(&run, "cafebabe");
    write_issues_json(&report, &issues_path).unwrap();

    let loaded = read_issues_json(&issues_path).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.config_hash, "cafebabe");
    assert_eq!(loaded.final_domain, "127.0.0.1");
    assert_eq!(loaded.summary.pages, 4);
    assert_eq!(loaded.summary.fetched, 2);
    assert_eq!(loaded.summary.failed, 2);
    assert_eq!(loaded.summary.issues_by_severity.high, 1);
    // Two pages link to /broken
    assert_eq!(loaded.summary.issues_by_severity.medium, 2);
    assert_eq!(loaded.issues[0].severity, Severity::High);
}

#[tokio::test]
async fn test_run_persisted_and_exported_from_storage() {
    let server = small_site().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sentinel.db");

    let run = Validator::new(test_config(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let mut storage = open_storage(&db_path).unwrap();
    let run_id = persist_run(&mut storage, &run, "hash-1").unwrap();

    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.id, run_id);
    assert_eq!(latest.status, RunStatus::Completed);
    assert_eq!(latest.effective_host.as_deref(), Some("127.0.0.1"));

    assert_eq!(storage.load_pages(run_id).unwrap(), run.records);
    assert_eq!(storage.load_issues(run_id).unwrap(), run.issues);

    let stats = load_statistics(&storage, run_id).unwrap();
    assert_eq!(stats.total_pages, 4);
    assert_eq!(stats.pages(PageStatus::Failed), 2);
    assert_eq!(stats.issues(Severity::Medium), 2);
    assert_eq!(stats.total_links, run.edges.len() as u64);

    let exported = ValidationReport::from_storage(&storage, run_id).unwrap();
    let direct = ValidationReport::from_run(&run, "hash-1");
    assert_eq!(exported.issues, direct.issues);
    assert_eq!(exported.summary, direct.summary);
    assert_eq!(exported.links, direct.links);
}
