//! Integration tests for the crawl engine
//!
//! These tests use wiremock to serve listing pages and robots.txt and run
//! the full fetch, paginate and extract cycle end-to-end.

use newsprint::config::{parse_site_config, DocumentFormat, SiteConfig};
use newsprint::crawler::{CategoryStatus, CrawlEngine};
use newsprint::pagination::StopReason;
use std::ops::Range;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a site document pointing at the mock server
fn site_config(base_url: &str, category: &str) -> SiteConfig {
    let content = format!(
        r#"
site_name = "mock-news"
base_url = "{base_url}"

[crawl]
user_agent = "NewsprintTest/1.0"
timeout_secs = 5
max_retries = 2
backoff_ms = 10
max_backoff_ms = 50
page_delay_ms = 0

[pagination]
type = "query-parameter"
param = "page"
start = 1

{category}
"#
    );
    parse_site_config(&content, DocumentFormat::Toml).expect("valid site config")
}

const LATEST: &str = r#"
[categories.latest]
url_pattern = "/news"

[categories.latest.selectors]
articles = "article.post"
title = "h2"
link = "h2 a"
summary = "p.excerpt"
publish_date = { css = "time", attr = "datetime" }
"#;

const ARCHIVE: &str = r#"
[categories.archive]
url_pattern = "/archive"

[categories.archive.selectors]
articles = "article.post"
title = "h2"
link = "h2 a"

[categories.archive.pagination]
type = "next-button"
selector = "a.next"
"#;

/// A listing page with one container per id
fn listing(ids: Range<usize>, next: Option<&str>) -> String {
    let mut html = String::from("<html><body><main>");
    for id in ids {
        html.push_str(&format!(
            r#"<article class="post">
                <h2><a href="/story/{id}">Story {id}</a></h2>
                <p class="excerpt">Summary of story {id}</p>
                <time datetime="2024-03-01T08:00:00Z">1 March</time>
            </article>"#
        ));
    }
    if let Some(href) = next {
        html.push_str(&format!(r#"<a class="next" href="{}">Next</a>"#, href));
    }
    html.push_str("</main></body></html>");
    html
}

async fn mount_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_limit_stops_before_page_budget() {
    let server = MockServer::start().await;
    mount_page(&server, "1", listing(0..6, None)).await;
    mount_page(&server, "2", listing(6..12, None)).await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(12..18, None)))
        .expect(0)
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 10, 2).await.unwrap();

    assert_eq!(report.total_articles(), 10);
    let links: Vec<_> = report.articles.iter().map(|a| a.link.clone()).collect();
    assert_eq!(links[0], format!("{}/story/0", server.uri()));
    assert_eq!(links[9], format!("{}/story/9", server.uri()));
    assert!(report.articles[0].published.is_some());
    assert_eq!(report.articles[0].summary.as_deref(), Some("Summary of story 0"));

    let stats = report.category("latest").unwrap();
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.stop_reason, Some(StopReason::LimitReached));
    assert_eq!(stats.status, CategoryStatus::Completed);
}

#[tokio::test]
async fn test_empty_page_ends_pagination() {
    let server = MockServer::start().await;
    mount_page(&server, "1", listing(0..6, None)).await;
    mount_page(&server, "2", listing(0..0, None)).await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(12..18, None)))
        .expect(0)
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 0, 5).await.unwrap();

    assert_eq!(report.total_articles(), 6);
    let stats = report.category("latest").unwrap();
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.stop_reason, Some(StopReason::EmptyPage));
}

#[tokio::test]
async fn test_repeated_crawls_do_not_duplicate_articles() {
    let server = MockServer::start().await;
    mount_page(&server, "1", listing(0..6, None)).await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();

    let first = engine.crawl(&["latest".to_string()], 0, 1).await.unwrap();
    assert_eq!(first.total_articles(), 6);

    let second = engine.crawl(&["latest".to_string()], 0, 1).await.unwrap();
    assert_eq!(second.total_articles(), 0);
    assert_eq!(second.category("latest").unwrap().duplicates, 6);
    assert_eq!(engine.collector().len(), 6);
}

#[tokio::test]
async fn test_robots_disallow_skips_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /news\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(0..6, None)))
        .expect(0)
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 0, 2).await.unwrap();

    assert_eq!(report.total_articles(), 0);
    let stats = report.category("latest").unwrap();
    assert_eq!(stats.pages_skipped, 2);
    assert_eq!(stats.pages_fetched, 0);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, "1", listing(0..6, None)).await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 0, 1).await.unwrap();

    assert_eq!(report.total_articles(), 6);
    let stats = report.category("latest").unwrap();
    assert_eq!(stats.pages_failed, 0);
    assert_eq!(stats.status, CategoryStatus::Completed);
}

#[tokio::test]
async fn test_client_error_fails_category_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 0, 1).await.unwrap();

    let stats = report.category("latest").unwrap();
    assert_eq!(stats.pages_failed, 1);
    assert_eq!(stats.status, CategoryStatus::Failed);
    assert!(stats.errors[0].contains("404"));
}

#[tokio::test]
async fn test_next_button_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/archive"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing(0..3, Some("/archive/page/2"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/archive/page/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(3..5, None)))
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), ARCHIVE)).unwrap();
    let report = engine.crawl(&[], 0, 10).await.unwrap();

    assert_eq!(report.total_articles(), 5);
    let stats = report.category("archive").unwrap();
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.stop_reason, Some(StopReason::NoNextLink));
}

#[tokio::test]
async fn test_blocking_page_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Please complete the CAPTCHA</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 0, 1).await.unwrap();

    let stats = report.category("latest").unwrap();
    assert_eq!(stats.pages_failed, 1);
    assert!(stats.errors[0].contains("captcha"));
}

#[tokio::test]
async fn test_third_party_scripts_are_not_blocking_pages() {
    let server = MockServer::start().await;
    let body = listing(0..1, None).replace(
        "<html><body>",
        r#"<html><head>
            <script src="https://cdnjs.cloudflare.com/ajax/libs/jquery/3.7.1/jquery.min.js"></script>
            <script src="https://www.google.com/recaptcha/api.js"></script>
        </head><body><div class="g-recaptcha" data-sitekey="key"></div>"#,
    );
    mount_page(&server, "1", body).await;

    let engine = CrawlEngine::new(site_config(&server.uri(), LATEST)).unwrap();
    let report = engine.crawl(&[], 0, 1).await.unwrap();

    let stats = report.category("latest").unwrap();
    assert_eq!(report.total_articles(), 1);
    assert!(stats.errors.is_empty(), "unexpected errors: {:?}", stats.errors);
    assert_eq!(stats.status, CategoryStatus::Completed);
}

const FEATURED: &str = r#"
[categories.featured]
url_pattern = "/news"

[categories.featured.selectors]
articles = "article.post"
title = "h2"
link = "h2 a"
publish_date = { css = "time", attr = "datetime" }

[categories.featured.article]
content = ["div.entry-content"]
content_remove = [".share"]
"#;

/// An article page carrying JSON-LD metadata and an og:image
fn article_page(paragraphs: &[&str]) -> String {
    let mut html = String::from(
        r#"<html><head>
        <meta property="og:image" content="/media/cover.jpg">
        <script type="application/ld+json">
          {"@type": "NewsArticle", "author": {"name": "Amina Benali"}, "articleSection": "Economy"}
        </script>
        </head><body><div class="entry-content">"#,
    );
    for p in paragraphs {
        html.push_str(&format!("<p>{}</p>", p));
    }
    html.push_str(r#"<div class="share"><p>Share on social media</p></div></div></body></html>"#);
    html
}

#[tokio::test]
async fn test_article_pages_enrich_records() {
    let server = MockServer::start().await;
    mount_page(&server, "1", listing(0..3, None)).await;
    Mock::given(method("GET"))
        .and(path("/story/0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_page(&["Opening paragraph.", "Second paragraph."])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/story/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/story/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_page(&["Opening paragraph.", "Second paragraph."])),
        )
        .mount(&server)
        .await;

    let engine = CrawlEngine::new(site_config(&server.uri(), FEATURED)).unwrap();
    let report = engine.crawl(&[], 0, 1).await.unwrap();

    assert_eq!(report.total_articles(), 2);
    let first = &report.articles[0];
    assert_eq!(
        first.content.as_deref(),
        Some("Opening paragraph.\nSecond paragraph.")
    );
    assert_eq!(first.content_hash.as_ref().map(String::len), Some(64));
    assert_eq!(first.author.as_deref(), Some("Amina Benali"));
    assert_eq!(first.section.as_deref(), Some("Economy"));
    assert_eq!(
        first.image_url.as_deref(),
        Some(format!("{}/media/cover.jpg", server.uri()).as_str())
    );
    assert!(first.published.is_some());

    let unavailable = &report.articles[1];
    assert_eq!(unavailable.link, format!("{}/story/1", server.uri()));
    assert_eq!(unavailable.content, None);

    let stats = report.category("featured").unwrap();
    assert_eq!(stats.details_fetched, 2);
    assert_eq!(stats.details_failed, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.status, CategoryStatus::Completed);
}
