//! Crawl-policy checking
//!
//! The crawl engine asks a [`PolicyChecker`] before every fetch. The
//! default checker, [`RobotsPolicy`], fetches robots.txt once per origin,
//! caches it for 24 hours and reports both path permissions and the
//! `Crawl-delay` hint.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Outcome of a crawl-policy check
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDecision {
    /// The URL may be fetched; `crawl_delay` is the site's requested pacing
    Allowed { crawl_delay: Option<Duration> },
    /// The URL must be skipped
    Denied,
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Collaborator deciding whether a URL may be fetched
#[async_trait]
pub trait PolicyChecker: Send + Sync {
    async fn check(&self, url: &Url) -> PolicyDecision;
}

/// Policy that allows every URL
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PolicyChecker for AllowAll {
    async fn check(&self, _url: &Url) -> PolicyDecision {
        PolicyDecision::Allowed { crawl_delay: None }
    }
}

/// robots.txt-backed policy with a per-origin cache
pub struct RobotsPolicy {
    client: reqwest::Client,
    user_agent: String,
    cache: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsPolicy {
    /// Creates a policy that fetches robots.txt with `client`
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `user_agent` - User agent whose rules are applied
    pub fn new(client: reqwest::Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, origin: &str) -> Option<CachedRobots> {
        let cache = self.cache.lock().ok()?;
        cache.get(origin).filter(|c| !c.is_stale()).cloned()
    }

    fn store(&self, origin: String, entry: CachedRobots) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(origin, entry);
        }
    }

    /// Fetches robots.txt for an origin
    ///
    /// A missing file (4xx) or any fetch failure allows everything; a site
    /// without reachable rules is not treated as a site that forbids crawling.
    async fn fetch_robots(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);

        let response = match self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
                return ParsedRobots::allow_all();
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("{} returned {}; allowing all", robots_url, status);
            return ParsedRobots::allow_all();
        }

        match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => {
                warn!("Failed to read {}: {}; allowing all", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }
}

#[async_trait]
impl PolicyChecker for RobotsPolicy {
    async fn check(&self, url: &Url) -> PolicyDecision {
        let origin = url.origin().ascii_serialization();

        let entry = match self.cached(&origin) {
            Some(entry) => entry,
            None => {
                let entry = CachedRobots::new(self.fetch_robots(&origin).await);
                self.store(origin, entry.clone());
                entry
            }
        };

        if entry.is_allowed(url.as_str(), &self.user_agent) {
            PolicyDecision::Allowed {
                crawl_delay: entry
                    .crawl_delay(&self.user_agent)
                    .filter(|d| d.is_finite())
                    .map(Duration::from_secs_f64),
            }
        } else {
            PolicyDecision::Denied
        }
    }
}
