//! Integration tests for the feed service

use crate::{test_crawler, LISTING, NEWS_FEED};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use web2feed::config::{FeedRegistry, Reload};
use web2feed::service::Service;
use web2feed::storage::open_repository;
use web2feed::Web2FeedError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(server)
        .await;
}

fn write_feed(dir: &Path, body: &str, base_url: &str) {
    std::fs::write(dir.join("news.toml"), body.replace("BASE", base_url))
        .expect("Failed to write feed file");
}

fn build_service(dir: &TempDir) -> Service {
    let registry = FeedRegistry::load_dir(&dir.path().join("feeds")).unwrap();
    let repository = open_repository(&dir.path().join("web2feed.db"), Duration::from_secs(3600))
        .expect("Failed to open store");
    Service::new(
        Arc::new(registry),
        repository,
        test_crawler(),
        Duration::from_secs(3600),
    )
}

fn setup(base_url: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let feeds = dir.path().join("feeds");
    std::fs::create_dir(&feeds).unwrap();
    write_feed(&feeds, NEWS_FEED, base_url);
    dir
}

#[tokio::test]
async fn test_run_feed_saves_only_new_records() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let dir = setup(&server.uri());
    let service = build_service(&dir);

    assert_eq!(service.run_feed("news").await.unwrap(), 2);
    // Everything is known now, so the second run produces nothing
    assert_eq!(service.run_feed("news").await.unwrap(), 0);

    let page = service.repository().find_page("news", "", 0, 1).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].key, "/post/2");

    let found = service.repository().find_page("news", "First", 10, 1).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "First & best");
}

#[tokio::test]
async fn test_unknown_feed() {
    let server = MockServer::start().await;
    let dir = setup(&server.uri());
    let service = build_service(&dir);

    assert!(matches!(
        service.update("missing"),
        Err(Web2FeedError::UnknownFeed(_))
    ));
    assert!(matches!(
        service.run_feed("missing").await,
        Err(Web2FeedError::UnknownFeed(_))
    ));
}

#[tokio::test]
async fn test_update_schedules_immediately() {
    let server = MockServer::start().await;
    let dir = setup(&server.uri());
    let service = build_service(&dir);

    service.update("news").unwrap();
    assert_eq!(service.schedule().len(), 1);
    assert_eq!(
        service.schedule().pop_due(chrono::Local::now()).as_deref(),
        Some("news")
    );
}

#[tokio::test]
async fn test_reload_picks_up_changes() {
    let server = MockServer::start().await;
    let dir = setup(&server.uri());
    let service = build_service(&dir);

    assert_eq!(service.reload("news").unwrap(), Reload::Unchanged);
    assert!(service.schedule().is_empty());

    let changed = format!("period = 60\n{NEWS_FEED}");
    write_feed(&dir.path().join("feeds"), &changed, &server.uri());

    assert_eq!(service.reload("news").unwrap(), Reload::Reloaded);
    let feed = service.registry().get("news").unwrap();
    assert_eq!(feed.period, Some(Duration::from_secs(60)));
    assert_eq!(service.schedule().len(), 1);
}

#[tokio::test]
async fn test_service_loop_runs_scheduled_feeds() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let dir = setup(&server.uri());
    let service = Arc::new(build_service(&dir));

    let handle = tokio::spawn(Arc::clone(&service).run());

    let mut stored = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stored = service.repository().find_page("news", "", 0, 1).unwrap().len();
        if stored == 2 {
            break;
        }
    }
    handle.abort();

    assert_eq!(stored, 2);
}
