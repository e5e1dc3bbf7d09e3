//! Content-Region Detector
//!
//! Locates the article body on an arbitrary page with an ordered chain of
//! strategies; the first strategy that succeeds wins and the whole page is
//! the last resort, so detection never fails:
//!
//! 1. domain-specific selectors
//! 2. generic article/content container patterns
//! 3. text-density scoring of block-level candidates
//! 4. the full page

mod dom;
mod strategies;

pub use dom::{css_path, visible_text};

use crate::url::lookup_host;
use crate::{ConfigError, ValidationReport};
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Which strategy located a region; lower rank means higher confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    DomainSpecific = 1,
    GenericPattern = 2,
    TextDensity = 3,
    FullPage = 4,
}

impl DetectionStrategy {
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainSpecific => "domain-specific",
            Self::GenericPattern => "generic-pattern",
            Self::TextDensity => "text-density",
            Self::FullPage => "full-page",
        }
    }
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What part of the page to capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RegionTarget {
    /// The first element matching this CSS selector
    Selector(String),
    FullPage,
}

/// A detected content region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRegion {
    pub target: RegionTarget,
    pub strategy: DetectionStrategy,
    /// Visible text length of the region
    pub text_length: usize,
}

impl ContentRegion {
    pub fn full_page(text_length: usize) -> Self {
        Self {
            target: RegionTarget::FullPage,
            strategy: DetectionStrategy::FullPage,
            text_length,
        }
    }

    pub fn is_full_page(&self) -> bool {
        self.target == RegionTarget::FullPage
    }

    pub fn selector(&self) -> Option<&str> {
        match &self.target {
            RegionTarget::Selector(css) => Some(css),
            RegionTarget::FullPage => None,
        }
    }
}

/// Text-density heuristic thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct DensityConfig {
    /// A candidate needs this much visible text...
    pub min_text_length: usize,
    /// ...or at least this many paragraphs
    pub min_paragraphs: usize,
    /// Score added per paragraph
    pub paragraph_weight: f64,
    /// Minimum score of the winning candidate
    pub score_floor: f64,
    /// Block-level elements considered as candidates
    pub candidates: String,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            min_text_length: 500,
            min_paragraphs: 3,
            paragraph_weight: 10.0,
            score_floor: 20.0,
            candidates: "article, main, section, div, td".to_string(),
        }
    }
}

/// Detector tables and thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Host (or `*.domain` pattern) to selectors tried in order
    pub domain_selectors: BTreeMap<String, Vec<String>>,
    /// Common article containers tried in order
    pub generic_selectors: Vec<String>,
    /// Minimum visible text of a generic-pattern match
    pub generic_min_text: usize,
    pub density: DensityConfig,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let mut domain_selectors = BTreeMap::new();
        for (domain, selectors) in [
            ("hespress.com", &["article", ".article-content", ".post-content"][..]),
            ("fr.hespress.com", &["article", ".article-content", ".post-content"][..]),
            ("alnoortv.ma", &[".td-post-content", ".td-container", ".td-main-content", "article", ".post"][..]),
            ("aujourdhui.ma", &[".article-content", ".post-content", ".entry-content", "article", ".td-post-content"][..]),
            ("alhoriyanews.com", &[".news-details", ".article-body", ".content", "article", ".single-content"][..]),
            ("achtari24.com", &[".news-details", ".article-body", "article", ".td-post-content"][..]),
            ("almaghribtoday.net", &[".article-content", ".post-content", ".entry-content", "article"][..]),
            ("icimeknes.com", &["article", ".entry-content", ".news-body"][..]),
            ("icicasa.com", &["article", ".entry-content", ".story-content"][..]),
            ("*.hibapress.com", &["article", ".story-content", ".news-body"][..]),
        ] {
            domain_selectors.insert(domain.to_string(), strings(selectors));
        }

        Self {
            domain_selectors,
            generic_selectors: strings(&[
                "article",
                ".article-content",
                ".article-body",
                ".entry-content",
                ".post-content",
                ".story-content",
                ".news-content",
                ".news-details",
                "main",
                ".content",
            ]),
            generic_min_text: 300,
            density: DensityConfig::default(),
        }
    }
}

/// Compiled detector
#[derive(Debug, Clone)]
pub struct ContentDetector {
    domains: BTreeMap<String, Vec<(String, Selector)>>,
    generic: Vec<(String, Selector)>,
    generic_min_text: usize,
    density: DensityConfig,
    candidates: Option<Selector>,
    paragraph: Option<Selector>,
    body: Option<Selector>,
}

type Strategy = fn(&ContentDetector, &Html, &str) -> Option<ContentRegion>;

/// The strategy chain, evaluated in order
const CHAIN: &[Strategy] = &[
    strategies::domain_specific,
    strategies::generic_patterns,
    strategies::text_density,
];

impl ContentDetector {
    /// Compiles a detector
    ///
    /// # Returns
    ///
    /// * `Ok(ContentDetector)` - Every selector compiled
    /// * `Err(ConfigError::Invalid)` - Every selector that did not compile
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        let mut report = ValidationReport::new();
        let detector = Self::build(config, &mut report);
        report.into_result()?;
        Ok(detector)
    }

    /// Compiles a detector, leaving out selectors that do not compile
    fn build(config: DetectorConfig, report: &mut ValidationReport) -> Self {
        let mut compile = |field: String, css: &str| match Selector::parse(css) {
            Ok(selector) => Some((css.to_string(), selector)),
            Err(e) => {
                report.push(field, format!("invalid selector '{}': {}", css, e));
                None
            }
        };

        let mut domains = BTreeMap::new();
        for (domain, selectors) in &config.domain_selectors {
            let compiled: Vec<_> = selectors
                .iter()
                .enumerate()
                .filter_map(|(i, css)| compile(format!("detector.domains.{}[{}]", domain, i), css))
                .collect();
            domains.insert(domain.to_lowercase(), compiled);
        }

        let generic = config
            .generic_selectors
            .iter()
            .enumerate()
            .filter_map(|(i, css)| compile(format!("detector.generic_selectors[{}]", i), css))
            .collect();

        let candidates = compile(
            "detector.density.candidates".to_string(),
            &config.density.candidates,
        )
        .map(|(_, selector)| selector);

        Self {
            domains,
            generic,
            generic_min_text: config.generic_min_text,
            density: config.density,
            candidates,
            paragraph: Selector::parse("p").ok(),
            body: Selector::parse("body").ok(),
        }
    }

    /// Locates the content region of `document`
    ///
    /// # Arguments
    ///
    /// * `document` - The parsed page
    /// * `domain` - Host the page was loaded from
    ///
    /// # Returns
    ///
    /// The region found by the first successful strategy, or the full page.
    pub fn detect(&self, document: &Html, domain: &str) -> ContentRegion {
        for strategy in CHAIN {
            if let Some(region) = strategy(self, document, domain) {
                tracing::debug!(
                    "Content region for {} via {}: {:?}",
                    domain,
                    region.strategy,
                    region.target
                );
                return region;
            }
        }

        let text_length = self
            .body
            .as_ref()
            .and_then(|body| document.select(body).next())
            .map(|body| visible_text(body).chars().count())
            .unwrap_or(0);
        tracing::debug!("No content region for {}; using the full page", domain);
        ContentRegion::full_page(text_length)
    }

    /// Parses `html` and detects its content region
    pub fn detect_html(&self, html: &str, domain: &str) -> ContentRegion {
        let document = Html::parse_document(html);
        self.detect(&document, domain)
    }

    fn domain_selectors(&self, domain: &str) -> Option<&Vec<(String, Selector)>> {
        lookup_host(&self.domains, domain)
    }
}

impl Default for ContentDetector {
    fn default() -> Self {
        let mut report = ValidationReport::new();
        Self::build(DetectorConfig::default(), &mut report)
    }
}
