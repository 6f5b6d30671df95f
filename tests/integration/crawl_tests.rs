//! Integration tests for feed runs

use crate::{feed_from_toml, test_crawler, LISTING, NEWS_FEED};
use chrono::{Datelike, Timelike};
use std::sync::Arc;
use web2feed::crawler::RunError;
use web2feed::feed::{render_rss, Record};
use web2feed::storage::{Repository, SqliteRepository};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn keys(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.key.as_str()).collect()
}

#[tokio::test]
async fn test_two_candidates_produce_two_records() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", LISTING).await;

    let feed = feed_from_toml(NEWS_FEED, &server.uri());
    let records = test_crawler().run(&feed).await.expect("Run failed");

    assert_eq!(keys(&records), vec!["/post/1", "/post/2"]);
    let first = &records[0];
    assert_eq!(first.title, "First & best");
    assert_eq!(first.link, format!("{}/post/1", server.uri()));
    assert_eq!(first.guid, first.link);
    assert_eq!(first.body, "<p>First &amp; best</p>");
    assert_eq!(first.feed, "news");
    assert_eq!(
        (first.published_at.day(), first.published_at.hour()),
        (1, 4)
    );

    let xml = render_rss(&feed.desc, &records).unwrap();
    assert!(xml.contains("<title>First &amp; best</title>"));
    assert!(xml.contains("<![CDATA[<p>First &amp; best</p>]]>"));
}

#[tokio::test]
async fn test_known_key_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", LISTING).await;

    let feed = feed_from_toml(NEWS_FEED, &server.uri());
    let repository = Arc::new(SqliteRepository::new_in_memory().unwrap());
    let crawler = test_crawler().with_repository(repository.clone());

    let first_run = crawler.run(&feed).await.unwrap();
    repository.save(&first_run[..1]).unwrap();

    let second_run = crawler.run(&feed).await.unwrap();
    assert_eq!(keys(&second_run), vec!["/post/2"]);
}

#[tokio::test]
async fn test_failing_listing_fails_the_run() {
    let server = MockServer::start().await;
    let listing_b = r#"<ul class="news">
        <li><a href="/b/1">B1</a><time>2021-11-01 00:00:00</time></li>
        <li><a href="/b/2">B2</a><time>2021-11-01 00:00:00</time></li>
        <li><a href="/b/3">B3</a><time>2021-11-01 00:00:00</time></li>
    </ul>"#;
    mount_page(&server, "/b", listing_b).await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let toml = NEWS_FEED.replace(
        r#"toc_url = "BASE/list""#,
        r#"toc_urls = ["BASE/a", "BASE/b"]"#,
    );
    let feed = feed_from_toml(&toml, &server.uri());

    let err = test_crawler().run(&feed).await.unwrap_err();
    assert!(matches!(err, RunError::Listing(_)));
    assert_eq!(err.failed_urls(), vec![format!("{}/a", server.uri())]);
    assert!(err.to_string().contains("/a"));
}

#[tokio::test]
async fn test_listing_recovers_within_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/list", LISTING).await;

    let feed = feed_from_toml(NEWS_FEED, &server.uri());
    let records = test_crawler().run(&feed).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_malformed_candidate_is_dropped() {
    let server = MockServer::start().await;
    let listing = LISTING.replace("2021-11-02 05:30:00", "sometime");
    mount_page(&server, "/list", &listing).await;

    let feed = feed_from_toml(NEWS_FEED, &server.uri());
    let records = test_crawler().run(&feed).await.unwrap();
    assert_eq!(keys(&records), vec!["/post/1"]);
}

#[tokio::test]
async fn test_duplicate_keys_collapse() {
    let server = MockServer::start().await;
    let listing = r#"<ul class="news">
        <li><a href="/same">One</a><time>2021-11-01 00:00:00</time></li>
        <li><a href="/same">Two</a><time>2021-11-02 00:00:00</time></li>
    </ul>"#;
    mount_page(&server, "/list", listing).await;

    let feed = feed_from_toml(NEWS_FEED, &server.uri());
    let records = test_crawler().run(&feed).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "One");
}

#[tokio::test]
async fn test_extra_page_enriches_candidates() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", LISTING).await;

    for id in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path(format!("/post/{id}")))
            .and(header("x-token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<article><div class="content"><p>Full text {id}</p></div><img src="/img/{id}.png"></article>"#
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let toml = NEWS_FEED.replace(r#"body = "<p>{{ .title }}</p>""#, r#"body = "{{ .content }}"
thumbnail = "BASE{{ .image }}""#)
        + r#"
[rule.extra_page]
url = "BASE{{ .href }}"

[rule.extra_page.headers]
X-Token = "secret"

[rule.extra_page.selectors.content]
selector = "div.content"
attr = "html"

[rule.extra_page.selectors.image]
selector = "img"
attr = "src"
"#;
    let feed = feed_from_toml(&toml, &server.uri());
    let records = test_crawler().run(&feed).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1].body, "<p>Full text 2</p>");
    assert_eq!(
        records[1].thumbnail.as_deref(),
        Some(format!("{}/img/2.png", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_gbk_listing_is_decoded() {
    let server = MockServer::start().await;
    // <li><a href="/1">中文</a><time>2021-11-01 00:00:00</time></li> in GBK
    let mut body = b"<ul class=\"news\"><li><a href=\"/1\">".to_vec();
    body.extend_from_slice(&[0xD6, 0xD0, 0xCE, 0xC4]);
    body.extend_from_slice(b"</a><time>2021-11-01 00:00:00</time></li></ul>");

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let toml = NEWS_FEED.replace("key = \"href\"", "key = \"href\"\nencoding = \"gbk\"");
    let feed = feed_from_toml(&toml, &server.uri());
    let records = test_crawler().run(&feed).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "中文");
}

#[tokio::test]
async fn test_repeated_runs_are_stable() {
    let server = MockServer::start().await;
    mount_page(&server, "/list", LISTING).await;

    let feed = feed_from_toml(NEWS_FEED, &server.uri());
    let crawler = test_crawler();
    let first = crawler.run(&feed).await.unwrap();
    let second = crawler.run(&feed).await.unwrap();

    assert_eq!(keys(&first), keys(&second));
}
