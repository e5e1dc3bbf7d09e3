use crate::url::LinkFilters;
use indexmap::IndexMap;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

// ===== Raw documents =====
//
// Raw documents mirror the on-disk shape with every field optional so that
// validation can report all missing or malformed fields in one pass.

/// Site configuration document as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteDocument {
    pub site_name: Option<String>,
    pub base_url: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub categories: IndexMap<String, CategoryDocument>,
    pub pagination: Option<PaginationDocument>,
    #[serde(default)]
    pub crawl: CrawlDocument,
    #[serde(default)]
    pub filters: FilterDocument,
    /// Article page rules shared by every category without its own block
    pub article: Option<ArticleDocument>,
}

/// One category entry of a site document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryDocument {
    pub url_pattern: Option<String>,
    pub slug: Option<String>,
    pub selectors: Option<SelectorDocument>,
    pub pagination: Option<PaginationDocument>,
    pub article: Option<ArticleDocument>,
}

/// Rules for scraping the article page behind each listing link
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleDocument {
    /// Body containers, tried in order
    #[serde(default)]
    pub content: Vec<String>,
    /// Nodes removed from the body before its text is read
    #[serde(default)]
    pub content_remove: Vec<String>,
    /// Elements whose text forms the paragraphs of the body
    pub text_elements: Option<Vec<String>>,
    pub image: Option<RawSelector>,
    pub author: Option<RawSelector>,
    #[serde(alias = "publish_date")]
    pub date: Option<RawSelector>,
    pub section: Option<RawSelector>,
}

/// Selector rules of a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorDocument {
    pub articles: Option<RawSelector>,
    pub title: Option<RawSelector>,
    pub link: Option<RawSelector>,
    pub summary: Option<RawSelector>,
    #[serde(alias = "publish_date")]
    pub date: Option<RawSelector>,
    pub author: Option<RawSelector>,
    pub tags: Option<RawSelector>,
}

/// A selector is either a bare CSS string or a `{ css, attr }` table
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSelector {
    Css(String),
    Detailed {
        css: Option<String>,
        attr: Option<String>,
    },
}

/// Pagination block; `type` selects which of the other fields apply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationDocument {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub param: Option<String>,
    pub start: Option<i64>,
    pub template: Option<String>,
    pub first_page: Option<String>,
    pub selector: Option<String>,
    pub attr: Option<String>,
    pub trigger: Option<String>,
    pub max_iterations: Option<i64>,
}

/// Network behaviour of the crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlDocument {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub page_delay_ms: u64,
    pub respect_robots: bool,
    pub category_concurrency: usize,
    pub block_markers: Vec<String>,
}

impl Default for CrawlDocument {
    fn default() -> Self {
        Self {
            user_agent: format!("NewsprintBot/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 15,
            max_retries: 3,
            backoff_ms: 1500,
            max_backoff_ms: 30_000,
            page_delay_ms: 1500,
            respect_robots: true,
            category_concurrency: 1,
            block_markers: vec![
                "captcha".to_string(),
                "cloudflare".to_string(),
                "access denied".to_string(),
            ],
        }
    }
}

/// Link filtering rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterDocument {
    pub same_domain_only: bool,
    pub exclude_substrings: Vec<String>,
    pub deny_regex: Vec<String>,
    pub allow_regex: Vec<String>,
}

impl Default for FilterDocument {
    fn default() -> Self {
        Self {
            same_domain_only: true,
            exclude_substrings: Vec::new(),
            deny_regex: Vec::new(),
            allow_regex: Vec::new(),
        }
    }
}

// ===== Validated model =====

/// Validated, immutable configuration of one news site
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Site identifier
    pub site_name: String,
    pub base_url: Url,
    pub language: Option<String>,
    /// Categories in document order
    pub categories: IndexMap<String, CategoryConfig>,
    /// Site-level pagination default, if one was declared
    pub pagination: Option<PaginationConfig>,
    pub crawl: CrawlSettings,
    pub filters: LinkFilters,
}

impl SiteConfig {
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.get(name)
    }

    /// Category names in document order
    pub fn category_names(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }
}

/// Validated configuration of one category listing
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub name: String,
    /// The pattern as written, e.g. `/category/{slug}/`
    pub url_pattern: String,
    pub slug: String,
    /// Absolute URL of the first listing page
    pub url: Url,
    pub selectors: SelectorSet,
    /// Effective pagination: the category override or the site default
    pub pagination: PaginationConfig,
    /// Article page rules; `None` keeps records at listing-page fields
    pub article: Option<ArticleSelectors>,
}

/// Selector rules applied to an article page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSelectors {
    pub content: Vec<String>,
    pub content_remove: Vec<String>,
    pub text_elements: Vec<String>,
    pub image: Option<FieldSelector>,
    pub author: Option<FieldSelector>,
    pub date: Option<FieldSelector>,
    pub section: Option<FieldSelector>,
}

/// Paragraph-level elements read from an article body by default
pub const DEFAULT_TEXT_ELEMENTS: &[&str] = &["p", "li", "h2", "h3", "blockquote"];

/// Selector rules applied to a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSet {
    /// Selector matching one element per article
    pub articles: String,
    pub title: FieldSelector,
    pub link: FieldSelector,
    pub summary: Option<FieldSelector>,
    pub date: Option<FieldSelector>,
    pub author: Option<FieldSelector>,
    pub tags: Option<FieldSelector>,
}

/// A CSS selector plus an optional attribute to read instead of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    pub css: String,
    pub attr: Option<String>,
}

impl FieldSelector {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: None,
        }
    }

    pub fn with_attr(css: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: Some(attr.into()),
        }
    }
}

/// How successive listing pages of a category are discovered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationConfig {
    /// `?param=N` with N counting up from `start`
    QueryParameter { param: String, start: u32 },

    /// `{page}` substituted into a path template
    PathSegment {
        template: String,
        start: u32,
        first_page: Option<String>,
    },

    /// Follow the link found under `selector`
    NextButton { selector: String, attr: String },

    /// Repeatedly activate `trigger` in a live document
    ScriptTriggeredLoad { trigger: String, max_iterations: u32 },
}

impl PaginationConfig {
    /// The document name of this pagination kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::QueryParameter { .. } => "query-parameter",
            Self::PathSegment { .. } => "path-segment",
            Self::NextButton { .. } => "next-button",
            Self::ScriptTriggeredLoad { .. } => "script-triggered-load",
        }
    }

    /// Returns true if a failed page can be skipped without losing the chain
    pub fn can_skip_pages(&self) -> bool {
        matches!(self, Self::QueryParameter { .. } | Self::PathSegment { .. })
    }
}

/// Network behaviour of the crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub page_delay: Duration,
    pub respect_robots: bool,
    pub category_concurrency: usize,
    pub block_markers: Vec<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        let doc = CrawlDocument::default();
        Self {
            user_agent: doc.user_agent,
            timeout: Duration::from_secs(doc.timeout_secs),
            max_retries: doc.max_retries,
            backoff: Duration::from_millis(doc.backoff_ms),
            max_backoff: Duration::from_millis(doc.max_backoff_ms),
            page_delay: Duration::from_millis(doc.page_delay_ms),
            respect_robots: doc.respect_robots,
            category_concurrency: doc.category_concurrency,
            block_markers: doc.block_markers,
        }
    }
}
