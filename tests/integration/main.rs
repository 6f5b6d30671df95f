//! Integration tests for web2feed
//!
//! These tests use wiremock to serve listing and detail pages and exercise
//! the full pipeline through the real HTTP fetcher.

mod crawl_tests;
mod service_tests;

use std::sync::Arc;
use std::time::Duration;
use web2feed::config::{Feed, FeedConfig};
use web2feed::crawler::{Crawler, FetchSettings, HttpFetcher, RetryPolicy};

/// Builds a feed from a TOML body with `BASE` replaced by the mock server URI
pub fn feed_from_toml(toml_body: &str, base_url: &str) -> Feed {
    let config: FeedConfig = toml::from_str(&toml_body.replace("BASE", base_url))
        .expect("Failed to parse feed config");
    Feed::compile(config).expect("Failed to compile feed")
}

/// A crawler over the real HTTP client with a short retry delay
pub fn test_crawler() -> Crawler {
    let fetcher = HttpFetcher::new(&FetchSettings::default()).expect("Failed to build fetcher");
    Crawler::new(Arc::new(fetcher)).with_retry(RetryPolicy {
        attempts: 5,
        delay: Duration::from_millis(10),
    })
}

/// Listing page with two items
pub const LISTING: &str = r#"<html><body>
<ul class="news">
  <li><a href="/post/1">First &amp; best</a><time>2021-11-01 04:20:00</time></li>
  <li><a href="/post/2">Second</a><time>2021-11-02 05:30:00</time></li>
</ul>
</body></html>"#;

/// Feed reading `LISTING` from `BASE/list`
pub const NEWS_FEED: &str = r#"
[desc]
title = "news"
link = "BASE/"

[rule]
toc_url = "BASE/list"
item_selector = "ul.news > li"
key = "href"

[rule.selectors.href]
selector = "a"
attr = "href"

[rule.selectors.title]
selector = "a"

[rule.selectors.date]
selector = "time"

[rule.template]
title = "{{ .title }}"
link = "BASE{{ .href }}"
published_at = "{{ .date }}"
body = "<p>{{ .title }}</p>"
"#;
