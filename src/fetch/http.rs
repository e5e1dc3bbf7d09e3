//! HTTP fetcher built on reqwest

use crate::config::CrawlSettings;
use crate::detect::visible_text;
use crate::fetch::{PageFetchResult, PageFetcher};
use crate::{NewsprintError, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Builds an HTTP client from the crawl settings
///
/// # Arguments
///
/// * `settings` - Crawl settings carrying the user agent and request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(settings: &CrawlSettings) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.timeout)
        .connect_timeout(Duration::from_secs(10).min(settings.timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] that issues plain GET requests
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    block_markers: Vec<String>,
}

impl HttpFetcher {
    /// Creates a fetcher
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client to issue requests with
    /// * `block_markers` - Lowercase phrases identifying captcha or
    ///   access-denied interstitials
    pub fn new(client: Client, block_markers: Vec<String>) -> Self {
        Self {
            client,
            block_markers: block_markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn from_settings(settings: &CrawlSettings) -> Result<Self> {
        let client = build_http_client(settings)?;
        Ok(Self::new(client, settings.block_markers.clone()))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Finds a block marker in the rendered text of `body`
    ///
    /// Only the title and visible text are searched, so script sources and
    /// widget markup (`cdnjs.cloudflare.com`, reCAPTCHA iframes) never match.
    fn find_block_marker(&self, body: &str) -> Option<String> {
        if self.block_markers.is_empty() {
            return None;
        }
        let document = Html::parse_document(body);
        let lowered = visible_text(document.root_element()).to_lowercase();
        self.block_markers
            .iter()
            .find(|marker| lowered.contains(marker.as_str()))
            .cloned()
    }
}

fn classify_send_error(url: &Url, e: reqwest::Error) -> NewsprintError {
    if e.is_timeout() {
        NewsprintError::Timeout {
            url: url.to_string(),
        }
    } else {
        NewsprintError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<PageFetchResult> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(NewsprintError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        if let Some(marker) = self.find_block_marker(&body) {
            return Err(NewsprintError::Blocked {
                url: url.to_string(),
                marker,
            });
        }

        debug!("Fetched {} ({} bytes, final {})", url, body.len(), final_url);

        Ok(PageFetchResult {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Client::new(), vec!["Captcha".to_string()])
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/news", server.uri())).unwrap();
        let page = fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_status_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gone = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let err = fetcher().fetch(&gone).await.unwrap_err();
        assert!(matches!(err, NewsprintError::HttpStatus { status: 404, .. }));
        assert!(!err.is_retryable());

        let down = Url::parse(&format!("{}/down", server.uri())).unwrap();
        let err = fetcher().fetch(&down).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_block_marker_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocked"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<h1>Please solve the CAPTCHA</h1>"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/blocked", server.uri())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, NewsprintError::Blocked { ref marker, .. } if marker == "captcha"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_markers_in_markup_ignored() {
        let server = MockServer::start().await;
        let body = r#"<html><head><title>Latest news</title>
            <script src="https://cdnjs.cloudflare.com/ajax/libs/jquery/3.7.1/jquery.min.js"></script>
            <script>var captchaKey = "site-key";</script></head>
            <body><div class="g-recaptcha" data-sitekey="x"></div><p>Story text</p></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(
            Client::new(),
            vec!["captcha".to_string(), "cloudflare".to_string()],
        );
        let url = Url::parse(&format!("{}/news", server.uri())).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert!(page.body.contains("Story text"));
    }

    #[test]
    fn test_marker_in_title_detected() {
        let fetcher = HttpFetcher::new(Client::new(), vec!["Access Denied".to_string()]);
        let body = "<html><head><title>Access denied</title></head><body></body></html>";
        assert_eq!(fetcher.find_block_marker(body).as_deref(), Some("access denied"));
        assert_eq!(fetcher.find_block_marker("<p>Welcome</p>"), None);
    }
}
