//! Extraction Pipeline
//!
//! Applies a category's selector rules to a parsed listing page. Selectors
//! are compiled once per category; a selector that does not parse is an
//! [`ExtractionError`] for that category. Extraction itself is a lazy,
//! single-pass iterator over the article containers of one document.
//! Article pages behind the listing links are read by [`CompiledArticle`].

mod article;
mod date;

pub use article::{ArticleDetail, CompiledArticle};
pub use date::{parse_publish_date, PublishDate};

use crate::config::{FieldSelector, SelectorSet};
use crate::url::resolve_link;
use crate::ExtractionError;
use scraper::element_ref::Select;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::fmt;
use url::Url;

/// A selector plus the attribute to read from its first match
#[derive(Debug, Clone)]
struct CompiledField {
    selector: Selector,
    attr: Option<String>,
}

impl CompiledField {
    fn compile(field: &str, raw: &FieldSelector) -> Result<Self, ExtractionError> {
        Ok(Self {
            selector: parse_selector(field, &raw.css)?,
            attr: raw.attr.clone(),
        })
    }
}

fn parse_selector(field: &str, css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        field: field.to_string(),
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Compiled selector rules of one category
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    articles: Selector,
    title: CompiledField,
    link: CompiledField,
    summary: Option<CompiledField>,
    date: Option<CompiledField>,
    author: Option<CompiledField>,
    tags: Option<CompiledField>,
    next: Option<CompiledField>,
    anchor: Selector,
}

impl CompiledSelectors {
    /// Compiles a selector set
    ///
    /// # Arguments
    ///
    /// * `set` - The category's selector rules
    /// * `next` - The "next page" selector of next-button pagination, if any
    ///
    /// # Returns
    ///
    /// * `Ok(CompiledSelectors)` - Every selector parsed
    /// * `Err(ExtractionError)` - The first selector that did not parse
    pub fn compile(set: &SelectorSet, next: Option<&FieldSelector>) -> Result<Self, ExtractionError> {
        let optional = |field: &str, raw: &Option<FieldSelector>| {
            raw.as_ref()
                .map(|raw| CompiledField::compile(field, raw))
                .transpose()
        };

        Ok(Self {
            articles: parse_selector("articles", &set.articles)?,
            title: CompiledField::compile("title", &set.title)?,
            link: CompiledField::compile("link", &set.link)?,
            summary: optional("summary", &set.summary)?,
            date: optional("date", &set.date)?,
            author: optional("author", &set.author)?,
            tags: optional("tags", &set.tags)?,
            next: next
                .map(|raw| CompiledField::compile("pagination.selector", raw))
                .transpose()?,
            anchor: parse_selector("link", "a[href]")?,
        })
    }

    /// Number of article containers in the document
    pub fn container_count(&self, document: &Html) -> usize {
        document.select(&self.articles).count()
    }

    /// Reads the "next page" link, resolved against the page it was found on
    pub fn next_link(&self, document: &Html, page_url: &Url) -> Option<Url> {
        let next = self.next.as_ref()?;
        let element = document.select(&next.selector).next()?;
        let href = match next.attr.as_deref() {
            Some(attr) => element
                .value()
                .attr(attr)
                .map(str::to_string)
                .or_else(|| self.descendant_href(element))?,
            None => self.descendant_href(element)?,
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        page_url.join(href).ok()
    }

    /// Iterates over the article drafts of a document
    ///
    /// The iterator is lazy and single-pass; links are resolved against
    /// `base_url`.
    pub fn drafts<'a>(&'a self, document: &'a Html, base_url: &'a Url) -> ArticleDrafts<'a> {
        ArticleDrafts {
            selectors: self,
            containers: document.root_element().select(&self.articles),
            base_url,
            position: 0,
        }
    }

    fn descendant_href(&self, element: ElementRef<'_>) -> Option<String> {
        if let Some(href) = element.value().attr("href") {
            return Some(href.to_string());
        }
        element
            .select(&self.anchor)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    }

    fn build_draft(&self, container: ElementRef<'_>, base_url: &Url) -> Result<ArticleDraft, DropReason> {
        let title = field_value(container, &self.title, None)
            .filter(|t| !t.is_empty())
            .ok_or(DropReason::MissingTitle)?;

        let href = match self.link.attr.as_deref() {
            Some(attr) => container
                .select(&self.link.selector)
                .next()
                .and_then(|e| e.value().attr(attr).map(str::to_string)),
            None => container
                .select(&self.link.selector)
                .next()
                .and_then(|e| self.descendant_href(e)),
        }
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .ok_or(DropReason::MissingLink)?;

        let link = resolve_link(base_url, &href)
            .map_err(|e| DropReason::InvalidLink(format!("'{}': {}", href, e)))?;

        let summary = self
            .summary
            .as_ref()
            .and_then(|f| field_value(container, f, None))
            .filter(|s| !s.is_empty());
        let published = self
            .date
            .as_ref()
            .and_then(|f| field_value(container, f, Some("datetime")))
            .and_then(|raw| parse_publish_date(&raw));
        let author = self
            .author
            .as_ref()
            .and_then(|f| field_value(container, f, None))
            .filter(|a| !a.is_empty());
        let tags = self
            .tags
            .as_ref()
            .map(|f| {
                container
                    .select(&f.selector)
                    .filter_map(|e| element_value(e, f.attr.as_deref(), None))
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(ArticleDraft {
            title,
            link,
            summary,
            published,
            author,
            tags,
        })
    }
}

/// Value of the first element matching `field` inside `container`
fn field_value(container: ElementRef<'_>, field: &CompiledField, preferred: Option<&str>) -> Option<String> {
    let element = container.select(&field.selector).next()?;
    element_value(element, field.attr.as_deref(), preferred)
}

/// Reads the configured attribute, then `preferred`, then `content`, then text
fn element_value(element: ElementRef<'_>, attr: Option<&str>, preferred: Option<&str>) -> Option<String> {
    if let Some(attr) = attr {
        return element.value().attr(attr).map(normalize_ws);
    }
    let value = element.value();
    if let Some(v) = preferred.and_then(|p| value.attr(p)) {
        return Some(normalize_ws(v));
    }
    if let Some(v) = value.attr("content") {
        return Some(normalize_ws(v));
    }
    Some(normalize_ws(&element.text().collect::<String>()))
}

/// Collapses runs of whitespace and trims
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One extracted article before run metadata is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    /// Canonical absolute link
    pub link: Url,
    pub summary: Option<String>,
    pub published: Option<PublishDate>,
    pub author: Option<String>,
    pub tags: BTreeSet<String>,
}

/// Why an article container produced no draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    MissingTitle,
    MissingLink,
    InvalidLink(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => f.write_str("missing title"),
            Self::MissingLink => f.write_str("missing link"),
            Self::InvalidLink(detail) => write!(f, "invalid link {}", detail),
        }
    }
}

/// A container that was dropped, with its position on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedArticle {
    pub position: usize,
    pub reason: DropReason,
}

/// Lazy iterator over the article containers of one document
pub struct ArticleDrafts<'a> {
    selectors: &'a CompiledSelectors,
    containers: Select<'a, 'a>,
    base_url: &'a Url,
    position: usize,
}

impl<'a> Iterator for ArticleDrafts<'a> {
    type Item = Result<ArticleDraft, DroppedArticle>;

    fn next(&mut self) -> Option<Self::Item> {
        let container = self.containers.next()?;
        let position = self.position;
        self.position += 1;
        Some(
            self.selectors
                .build_draft(container, self.base_url)
                .map_err(|reason| DroppedArticle { position, reason }),
        )
    }
}
