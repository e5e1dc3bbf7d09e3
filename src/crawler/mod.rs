//! Crawler module
//!
//! This module contains the crawl engine and the types it reports:
//! - [`CrawlEngine`] walks categories page by page
//! - [`ArticleRecord`] is one extracted article
//! - [`CategoryStats`] and [`CrawlReport`] account for every page and article

mod collector;
mod engine;
mod record;
mod stats;

pub use collector::ArticleCollector;
pub use engine::CrawlEngine;
pub use record::ArticleRecord;
pub use stats::{CategoryStats, CategoryStatus};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of one `crawl` call
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub site_id: String,
    /// Fingerprint of the site document, when known
    pub config_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Articles in category order
    pub articles: Vec<ArticleRecord>,
    pub categories: Vec<CategoryStats>,
}

impl CrawlReport {
    pub fn total_articles(&self) -> usize {
        self.articles.len()
    }

    /// Stats of one category
    pub fn category(&self, name: &str) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.category == name)
    }

    /// Categories that did not complete cleanly
    pub fn failed_categories(&self) -> impl Iterator<Item = &CategoryStats> {
        self.categories.iter().filter(|c| c.partial_failure())
    }
}
