//! Article page extraction: body text, image, and metadata backfilled
//! from JSON-LD

use super::{element_value, normalize_ws, parse_selector, parse_publish_date, CompiledField, PublishDate};
use crate::config::ArticleSelectors;
use crate::url::resolve_link;
use crate::ExtractionError;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Never part of the readable body
const HIDDEN: &[&str] = &["script", "style", "noscript", "template", "svg", "iframe"];

/// What an article page adds to its listing entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetail {
    /// Body paragraphs joined by newlines; empty when no container matched
    pub content: String,
    /// Hex SHA-256 of `content`
    pub content_hash: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub published: Option<PublishDate>,
    pub section: Option<String>,
}

/// Compiled article page rules of one category
#[derive(Debug, Clone)]
pub struct CompiledArticle {
    content: Vec<Selector>,
    content_remove: Vec<Selector>,
    text_elements: Selector,
    image: Option<CompiledField>,
    author: Option<CompiledField>,
    date: Option<CompiledField>,
    section: Option<CompiledField>,
    json_ld: Selector,
    og_image: Selector,
    any_image: Selector,
}

impl CompiledArticle {
    /// Compiles the article rules, failing on the first selector that does
    /// not parse
    pub fn compile(rules: &ArticleSelectors) -> Result<Self, ExtractionError> {
        let many = |field: &str, values: &[String]| {
            values
                .iter()
                .map(|css| parse_selector(field, css))
                .collect::<Result<Vec<_>, _>>()
        };
        let optional = |field: &str, raw: &Option<crate::config::FieldSelector>| {
            raw.as_ref()
                .map(|raw| CompiledField::compile(field, raw))
                .transpose()
        };

        Ok(Self {
            content: many("article.content", &rules.content)?,
            content_remove: many("article.content_remove", &rules.content_remove)?,
            text_elements: parse_selector("article.text_elements", &rules.text_elements.join(", "))?,
            image: optional("article.image", &rules.image)?,
            author: optional("article.author", &rules.author)?,
            date: optional("article.date", &rules.date)?,
            section: optional("article.section", &rules.section)?,
            json_ld: parse_selector("article", "script[type='application/ld+json']")?,
            og_image: parse_selector("article", "meta[property='og:image'], meta[name='og:image']")?,
            any_image: parse_selector("article", "img[src]")?,
        })
    }

    /// Extracts the detail of one article page
    ///
    /// Configured selectors win; author, publish date and section fall back
    /// to the page's JSON-LD, the image falls back to `og:image` and then to
    /// the first image of the page.
    pub fn extract(&self, body: &str, page_url: &Url) -> ArticleDetail {
        let document = Html::parse_document(body);
        let root = document.root_element();
        let json_ld = self.json_ld(&document);

        let content = self.content(&document);
        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));

        let author = self
            .author
            .as_ref()
            .and_then(|f| first_value(root, f, None))
            .or_else(|| json_ld.get("author").and_then(person_name));
        let published = self
            .date
            .as_ref()
            .and_then(|f| first_value(root, f, Some("datetime")))
            .or_else(|| json_string(json_ld.get("datePublished")))
            .and_then(|raw| parse_publish_date(&raw));
        let section = self
            .section
            .as_ref()
            .and_then(|f| first_value(root, f, None))
            .or_else(|| json_string(json_ld.get("articleSection")));

        ArticleDetail {
            content,
            content_hash,
            image_url: self.image(&document, page_url),
            author,
            published,
            section,
        }
    }

    fn content(&self, document: &Html) -> String {
        let Some(container) = self
            .content
            .iter()
            .find_map(|selector| document.select(selector).next())
        else {
            return String::new();
        };

        let removed: HashSet<NodeId> = self
            .content_remove
            .iter()
            .flat_map(|selector| container.select(selector))
            .map(|e| e.id())
            .collect();

        let mut paragraphs: Vec<String> = Vec::new();
        for element in container.select(&self.text_elements) {
            if is_removed(element, container.id(), &removed) {
                continue;
            }
            let mut parts = Vec::new();
            collect_text(element, &removed, &mut parts);
            let text = normalize_ws(&parts.join(" "));
            if text.is_empty() || paragraphs.last() == Some(&text) {
                continue;
            }
            paragraphs.push(text);
        }
        paragraphs.join("\n")
    }

    fn image(&self, document: &Html, page_url: &Url) -> Option<String> {
        let root = document.root_element();
        let configured = self
            .image
            .as_ref()
            .and_then(|f| first_value(root, f, Some("src")));
        let og = || {
            document
                .select(&self.og_image)
                .find_map(|e| e.value().attr("content"))
                .map(str::to_string)
        };
        let first_img = || {
            document
                .select(&self.any_image)
                .find_map(|e| e.value().attr("src"))
                .map(str::to_string)
        };

        configured
            .filter(|v| !v.is_empty())
            .or_else(og)
            .or_else(first_img)
            .and_then(|src| resolve_link(page_url, src.trim()).ok())
            .map(String::from)
    }

    /// Top-level JSON-LD objects of the page merged into one, later keys
    /// overriding earlier ones; blocks that do not parse are ignored
    fn json_ld(&self, document: &Html) -> Map<String, Value> {
        let mut merged = Map::new();
        for script in document.select(&self.json_ld) {
            let text: String = script.text().collect();
            let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
                continue;
            };
            let objects = match value {
                Value::Object(object) => vec![object],
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(object) => Some(object),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for object in objects {
                merged.extend(object);
            }
        }
        merged
    }
}

fn first_value(root: ElementRef<'_>, field: &CompiledField, preferred: Option<&str>) -> Option<String> {
    let element = root.select(&field.selector).next()?;
    element_value(element, field.attr.as_deref(), preferred).filter(|v| !v.is_empty())
}

/// True if `element` or an ancestor below `container` was removed
fn is_removed(element: ElementRef<'_>, container: NodeId, removed: &HashSet<NodeId>) -> bool {
    if removed.contains(&element.id()) {
        return true;
    }
    element
        .ancestors()
        .take_while(|node| node.id() != container)
        .any(|node| removed.contains(&node.id()))
}

fn collect_text<'a>(element: ElementRef<'a>, removed: &HashSet<NodeId>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        if removed.contains(&child.id()) {
            continue;
        }
        match child.value() {
            Node::Text(text) => parts.push(text),
            Node::Element(el) if HIDDEN.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, removed, parts);
                }
            }
            _ => {}
        }
    }
}

/// `"Jane"`, `{"name": "Jane"}` or a list of either
fn person_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => Some(normalize_ws(name)),
        Value::Object(object) => object.get("name").and_then(person_name),
        Value::Array(items) => items.iter().find_map(person_name),
        _ => None,
    }
    .filter(|name| !name.is_empty())
}

fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(normalize_ws(s)),
        Value::Array(items) => items.iter().find_map(|v| json_string(Some(v))),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}
