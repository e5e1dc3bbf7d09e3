use crate::config::types::{
    ArticleDocument, ArticleSelectors, CategoryConfig, CategoryDocument, CrawlDocument, CrawlSettings, FieldSelector,
    FilterDocument, PaginationConfig, PaginationDocument, RawSelector, SelectorDocument,
    SelectorSet, SiteConfig, SiteDocument, DEFAULT_TEXT_ELEMENTS,
};
use crate::url::LinkFilters;
use crate::{ConfigError, ValidationReport};
use indexmap::IndexMap;
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Validates a site document and builds the typed configuration
///
/// Every offending field is collected before failing, so a single run of
/// the validator reports the full list of problems in the document.
pub fn validate_site(doc: SiteDocument) -> Result<SiteConfig, ConfigError> {
    let mut report = ValidationReport::new();

    let site_name = match doc.site_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            if !name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
            {
                report.push(
                    "site_name",
                    format!(
                        "must contain only alphanumerics, '-', '_' or '.', got '{}'",
                        name
                    ),
                );
            }
            name.to_string()
        }
        _ => {
            report.push("site_name", "is required and cannot be empty");
            String::new()
        }
    };

    let base_url = validate_base_url(doc.base_url.as_deref(), &mut report);

    let site_pagination = doc
        .pagination
        .as_ref()
        .and_then(|p| validate_pagination(p, "pagination", &mut report));

    if doc.categories.is_empty() {
        report.push("categories", "at least one category must be declared");
    }

    let site_article = doc
        .article
        .as_ref()
        .and_then(|a| validate_article(a, "article", &mut report));

    let mut categories = IndexMap::new();
    for (name, category) in &doc.categories {
        let field = format!("categories.{}", name);
        if let Some(validated) = validate_category(
            name,
            category,
            base_url.as_ref(),
            site_pagination.as_ref(),
            site_article.as_ref(),
            &field,
            &mut report,
        ) {
            categories.insert(name.clone(), validated);
        }
    }

    let crawl = validate_crawl(&doc.crawl, &mut report);
    let filters = validate_filters(&doc.filters, &mut report);

    report.into_result()?;

    // Every branch that yields None above also recorded an issue
    let base_url = base_url.ok_or_else(|| missing("base_url"))?;

    Ok(SiteConfig {
        site_name,
        base_url,
        language: doc.language,
        categories,
        pagination: site_pagination,
        crawl,
        filters,
    })
}

fn missing(field: &str) -> ConfigError {
    let mut report = ValidationReport::new();
    report.push(field, "is required");
    ConfigError::Invalid(report)
}

fn validate_base_url(raw: Option<&str>, report: &mut ValidationReport) -> Option<Url> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        report.push("base_url", "is required and cannot be empty");
        return None;
    };

    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            if url.host_str().is_none() {
                report.push("base_url", format!("'{}' has no host", raw));
                return None;
            }
            Some(url)
        }
        Ok(url) => {
            report.push(
                "base_url",
                format!("must use http or https, got '{}'", url.scheme()),
            );
            None
        }
        Err(e) => {
            report.push("base_url", format!("invalid URL '{}': {}", raw, e));
            None
        }
    }
}

fn validate_category(
    name: &str,
    doc: &CategoryDocument,
    base_url: Option<&Url>,
    site_pagination: Option<&PaginationConfig>,
    site_article: Option<&ArticleSelectors>,
    field: &str,
    report: &mut ValidationReport,
) -> Option<CategoryConfig> {
    if name.trim().is_empty() {
        report.push(field, "category name cannot be empty");
    }

    let slug = doc.slug.clone().unwrap_or_else(|| name.to_string());

    let url_pattern = match doc.url_pattern.as_deref().map(str::trim) {
        Some(pattern) if !pattern.is_empty() => Some(pattern.to_string()),
        _ => {
            report.push(format!("{}.url_pattern", field), "is required");
            None
        }
    };

    let url = match (&url_pattern, base_url) {
        (Some(pattern), Some(base)) => {
            let expanded = expand_url_pattern(pattern, &slug);
            match base.join(&expanded) {
                Ok(url) => Some(url),
                Err(e) => {
                    report.push(
                        format!("{}.url_pattern", field),
                        format!("'{}' does not resolve against the base URL: {}", pattern, e),
                    );
                    None
                }
            }
        }
        _ => None,
    };

    let selectors = match &doc.selectors {
        Some(selectors) => validate_selectors(selectors, &format!("{}.selectors", field), report),
        None => {
            report.push(format!("{}.selectors", field), "is required");
            None
        }
    };

    let pagination = match &doc.pagination {
        Some(p) => validate_pagination(p, &format!("{}.pagination", field), report),
        None => match site_pagination {
            Some(p) => Some(p.clone()),
            None => {
                report.push(
                    format!("{}.pagination", field),
                    "no pagination configured (declare a site-level `pagination` or a category override)",
                );
                None
            }
        },
    };

    let article = match &doc.article {
        Some(a) => validate_article(a, &format!("{}.article", field), report),
        None => site_article.cloned(),
    };

    Some(CategoryConfig {
        name: name.to_string(),
        url_pattern: url_pattern?,
        slug,
        url: url?,
        selectors: selectors?,
        pagination: pagination?,
        article,
    })
}

/// Validates an article block; at least one `content` selector is required
fn validate_article(
    doc: &ArticleDocument,
    field: &str,
    report: &mut ValidationReport,
) -> Option<ArticleSelectors> {
    let list = |values: &[String], name: &str, report: &mut ValidationReport| {
        let mut out = Vec::new();
        for (index, value) in values.iter().enumerate() {
            match value.trim() {
                "" => report.push(format!("{}.{}[{}]", field, name, index), "cannot be empty"),
                v => out.push(v.to_string()),
            }
        }
        out
    };

    let content = list(&doc.content, "content", report);
    if doc.content.is_empty() {
        report.push(
            format!("{}.content", field),
            "at least one content selector is required",
        );
    }
    let content_remove = list(&doc.content_remove, "content_remove", report);
    let text_elements = match &doc.text_elements {
        Some(elements) => list(elements, "text_elements", report),
        None => DEFAULT_TEXT_ELEMENTS.iter().map(|e| e.to_string()).collect(),
    };

    let image = optional_selector(doc.image.as_ref(), &format!("{}.image", field), report);
    let author = optional_selector(doc.author.as_ref(), &format!("{}.author", field), report);
    let date = optional_selector(doc.date.as_ref(), &format!("{}.date", field), report);
    let section = optional_selector(doc.section.as_ref(), &format!("{}.section", field), report);

    if content.is_empty() {
        return None;
    }
    Some(ArticleSelectors {
        content,
        content_remove,
        text_elements,
        image,
        author,
        date,
        section,
    })
}

/// Substitutes the category slug into a URL pattern
///
/// Both `{slug}` and `{category}` placeholders are accepted.
pub(crate) fn expand_url_pattern(pattern: &str, slug: &str) -> String {
    pattern.replace("{slug}", slug).replace("{category}", slug)
}

fn validate_selectors(
    doc: &SelectorDocument,
    field: &str,
    report: &mut ValidationReport,
) -> Option<SelectorSet> {
    let articles = required_selector(doc.articles.as_ref(), &format!("{}.articles", field), report);
    let title = required_selector(doc.title.as_ref(), &format!("{}.title", field), report);
    let link = required_selector(doc.link.as_ref(), &format!("{}.link", field), report);

    let summary = optional_selector(doc.summary.as_ref(), &format!("{}.summary", field), report);
    let date = optional_selector(doc.date.as_ref(), &format!("{}.date", field), report);
    let author = optional_selector(doc.author.as_ref(), &format!("{}.author", field), report);
    let tags = optional_selector(doc.tags.as_ref(), &format!("{}.tags", field), report);

    Some(SelectorSet {
        articles: articles?.css,
        title: title?,
        link: link?,
        summary,
        date,
        author,
        tags,
    })
}

fn convert_selector(raw: &RawSelector) -> Option<FieldSelector> {
    match raw {
        RawSelector::Css(css) if !css.trim().is_empty() => Some(FieldSelector::css(css.trim())),
        RawSelector::Detailed { css: Some(css), attr } if !css.trim().is_empty() => {
            Some(FieldSelector {
                css: css.trim().to_string(),
                attr: attr
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string),
            })
        }
        _ => None,
    }
}

fn required_selector(
    raw: Option<&RawSelector>,
    field: &str,
    report: &mut ValidationReport,
) -> Option<FieldSelector> {
    match raw {
        Some(raw) => {
            let converted = convert_selector(raw);
            if converted.is_none() {
                report.push(field, "selector `css` cannot be empty");
            }
            converted
        }
        None => {
            report.push(field, "is required");
            None
        }
    }
}

fn optional_selector(
    raw: Option<&RawSelector>,
    field: &str,
    report: &mut ValidationReport,
) -> Option<FieldSelector> {
    let raw = raw?;
    let converted = convert_selector(raw);
    if converted.is_none() {
        report.push(field, "selector `css` cannot be empty");
    }
    converted
}

/// Validates a pagination block, checking the parameters its kind requires
fn validate_pagination(
    doc: &PaginationDocument,
    field: &str,
    report: &mut ValidationReport,
) -> Option<PaginationConfig> {
    let Some(kind) = doc.kind.as_deref().map(str::trim) else {
        report.push(format!("{}.type", field), "is required");
        return None;
    };

    let start = |report: &mut ValidationReport| -> Option<u32> {
        match doc.start {
            None => Some(1),
            Some(n) if n >= 0 && n <= u32::MAX as i64 => Some(n as u32),
            Some(n) => {
                report.push(format!("{}.start", field), format!("must be >= 0, got {}", n));
                None
            }
        }
    };

    let non_empty = |value: &Option<String>, name: &str, report: &mut ValidationReport| {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                report.push(
                    format!("{}.{}", field, name),
                    format!("is required for pagination type '{}'", kind),
                );
                None
            }
        }
    };

    match kind {
        "query-parameter" => {
            let param = non_empty(&doc.param, "param", report);
            let start = start(report);
            Some(PaginationConfig::QueryParameter {
                param: param?,
                start: start?,
            })
        }
        "path-segment" => {
            let template = non_empty(&doc.template, "template", report);
            if let Some(t) = &template {
                if !t.contains("{page}") {
                    report.push(
                        format!("{}.template", field),
                        format!("must contain the '{{page}}' placeholder, got '{}'", t),
                    );
                }
            }
            let start = start(report);
            Some(PaginationConfig::PathSegment {
                template: template.filter(|t| t.contains("{page}"))?,
                start: start?,
                first_page: doc.first_page.clone(),
            })
        }
        "next-button" => {
            let selector = non_empty(&doc.selector, "selector", report);
            Some(PaginationConfig::NextButton {
                selector: selector?,
                attr: doc
                    .attr
                    .clone()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| "href".to_string()),
            })
        }
        "script-triggered-load" => {
            let trigger = non_empty(&doc.trigger, "trigger", report);
            let max_iterations = match doc.max_iterations {
                Some(n) if n >= 1 && n <= u32::MAX as i64 => Some(n as u32),
                Some(n) => {
                    report.push(
                        format!("{}.max_iterations", field),
                        format!("must be >= 1, got {}", n),
                    );
                    None
                }
                None => {
                    report.push(
                        format!("{}.max_iterations", field),
                        "is required for pagination type 'script-triggered-load'",
                    );
                    None
                }
            };
            Some(PaginationConfig::ScriptTriggeredLoad {
                trigger: trigger?,
                max_iterations: max_iterations?,
            })
        }
        other => {
            report.push(
                format!("{}.type", field),
                format!(
                    "unknown pagination type '{}' (expected query-parameter, path-segment, next-button or script-triggered-load)",
                    other
                ),
            );
            None
        }
    }
}

fn validate_crawl(doc: &CrawlDocument, report: &mut ValidationReport) -> CrawlSettings {
    if doc.user_agent.trim().is_empty() {
        report.push("crawl.user_agent", "cannot be empty");
    }

    if doc.timeout_secs < 1 || doc.timeout_secs > 300 {
        report.push(
            "crawl.timeout_secs",
            format!("must be between 1 and 300, got {}", doc.timeout_secs),
        );
    }

    if doc.max_retries > 10 {
        report.push(
            "crawl.max_retries",
            format!("must be <= 10, got {}", doc.max_retries),
        );
    }

    if doc.max_backoff_ms < doc.backoff_ms {
        report.push(
            "crawl.max_backoff_ms",
            format!(
                "must be >= backoff_ms ({}), got {}",
                doc.backoff_ms, doc.max_backoff_ms
            ),
        );
    }

    if doc.category_concurrency < 1 || doc.category_concurrency > 32 {
        report.push(
            "crawl.category_concurrency",
            format!("must be between 1 and 32, got {}", doc.category_concurrency),
        );
    }

    CrawlSettings {
        user_agent: doc.user_agent.trim().to_string(),
        timeout: Duration::from_secs(doc.timeout_secs),
        max_retries: doc.max_retries,
        backoff: Duration::from_millis(doc.backoff_ms),
        max_backoff: Duration::from_millis(doc.max_backoff_ms),
        page_delay: Duration::from_millis(doc.page_delay_ms),
        respect_robots: doc.respect_robots,
        category_concurrency: doc.category_concurrency,
        block_markers: doc
            .block_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect(),
    }
}

fn validate_filters(doc: &FilterDocument, report: &mut ValidationReport) -> LinkFilters {
    let compile = |patterns: &[String], field: &str, report: &mut ValidationReport| {
        let mut compiled = Vec::new();
        for (index, pattern) in patterns.iter().enumerate() {
            match Regex::new(pattern) {
                Ok(re) => compiled.push(re),
                Err(e) => report.push(
                    format!("{}[{}]", field, index),
                    format!("invalid regex '{}': {}", pattern, e),
                ),
            }
        }
        compiled
    };

    LinkFilters {
        same_domain_only: doc.same_domain_only,
        exclude_substrings: doc
            .exclude_substrings
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect(),
        deny: compile(&doc.deny_regex, "filters.deny_regex", report),
        allow: compile(&doc.allow_regex, "filters.allow_regex", report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> SelectorDocument {
        SelectorDocument {
            articles: Some(RawSelector::Css("article".to_string())),
            title: Some(RawSelector::Css("h2".to_string())),
            link: Some(RawSelector::Detailed {
                css: Some("h2 a".to_string()),
                attr: Some("href".to_string()),
            }),
            ..Default::default()
        }
    }

    fn query_pagination() -> PaginationDocument {
        PaginationDocument {
            kind: Some("query-parameter".to_string()),
            param: Some("page".to_string()),
            ..Default::default()
        }
    }

    fn valid_document() -> SiteDocument {
        let mut categories = IndexMap::new();
        categories.insert(
            "politics".to_string(),
            CategoryDocument {
                url_pattern: Some("/category/{slug}/".to_string()),
                slug: Some("politique".to_string()),
                selectors: Some(selectors()),
                pagination: None,
                article: None,
            },
        );
        SiteDocument {
            site_name: Some("example-news".to_string()),
            base_url: Some("https://news.example.com".to_string()),
            categories,
            pagination: Some(query_pagination()),
            ..Default::default()
        }
    }

    fn issues(result: Result<SiteConfig, ConfigError>) -> ValidationReport {
        match result {
            Err(ConfigError::Invalid(report)) => report,
            other => panic!("expected validation failure, got {:?}", other.map(|c| c.site_name)),
        }
    }

    #[test]
    fn test_valid_document() {
        let config = validate_site(valid_document()).unwrap();
        let politics = config.category("politics").unwrap();
        assert_eq!(
            politics.url.as_str(),
            "https://news.example.com/category/politique/"
        );
        assert_eq!(politics.pagination.kind_name(), "query-parameter");
        assert_eq!(
            politics.pagination,
            PaginationConfig::QueryParameter {
                param: "page".to_string(),
                start: 1
            }
        );
    }

    #[test]
    fn test_category_override_wins() {
        let mut doc = valid_document();
        doc.categories.get_mut("politics").unwrap().pagination = Some(PaginationDocument {
            kind: Some("next-button".to_string()),
            selector: Some("a.next".to_string()),
            ..Default::default()
        });

        let config = validate_site(doc).unwrap();
        assert_eq!(
            config.category("politics").unwrap().pagination,
            PaginationConfig::NextButton {
                selector: "a.next".to_string(),
                attr: "href".to_string()
            }
        );
    }

    #[test]
    fn test_every_offending_field_is_reported() {
        let mut doc = valid_document();
        doc.site_name = None;
        doc.base_url = Some("ftp://example.com".to_string());
        doc.pagination = Some(PaginationDocument {
            kind: Some("infinite-scroll".to_string()),
            ..Default::default()
        });
        let politics = doc.categories.get_mut("politics").unwrap();
        politics.url_pattern = None;
        politics.selectors.as_mut().unwrap().title = None;

        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("site_name"));
        assert!(report.has_issue_for("base_url"));
        assert!(report.has_issue_for("pagination.type"));
        assert!(report.has_issue_for("categories.politics.url_pattern"));
        assert!(report.has_issue_for("categories.politics.selectors.title"));
        assert!(report.has_issue_for("categories.politics.pagination"));
        assert!(report.len() >= 6);
    }

    #[test]
    fn test_kind_parameters_required() {
        let mut doc = valid_document();
        doc.pagination = Some(PaginationDocument {
            kind: Some("script-triggered-load".to_string()),
            ..Default::default()
        });

        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("pagination.trigger"));
        assert!(report.has_issue_for("pagination.max_iterations"));
    }

    #[test]
    fn test_path_template_needs_placeholder() {
        let mut doc = valid_document();
        doc.pagination = Some(PaginationDocument {
            kind: Some("path-segment".to_string()),
            template: Some("page/".to_string()),
            ..Default::default()
        });

        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("pagination.template"));
    }

    #[test]
    fn test_negative_start_rejected() {
        let mut doc = valid_document();
        doc.pagination.as_mut().unwrap().start = Some(-2);
        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("pagination.start"));
    }

    #[test]
    fn test_invalid_filter_regex() {
        let mut doc = valid_document();
        doc.filters.deny_regex = vec!["([".to_string(), "/tag/".to_string()];
        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("filters.deny_regex[0]"));
        assert!(!report.has_issue_for("filters.deny_regex[1]"));
    }

    #[test]
    fn test_crawl_limits() {
        let mut doc = valid_document();
        doc.crawl.timeout_secs = 0;
        doc.crawl.category_concurrency = 0;
        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("crawl.timeout_secs"));
        assert!(report.has_issue_for("crawl.category_concurrency"));
    }

    #[test]
    fn test_no_categories() {
        let mut doc = valid_document();
        doc.categories.clear();
        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("categories"));
    }

    #[test]
    fn test_site_article_block_inherited() {
        let mut doc = valid_document();
        doc.article = Some(ArticleDocument {
            content: vec!["div.entry-content".to_string()],
            content_remove: vec![".share".to_string()],
            image: Some(RawSelector::Detailed {
                css: Some("figure img".to_string()),
                attr: Some("src".to_string()),
            }),
            ..Default::default()
        });

        let config = validate_site(doc).unwrap();
        let article = config.category("politics").unwrap().article.as_ref().unwrap();
        assert_eq!(article.content, vec!["div.entry-content"]);
        assert_eq!(article.content_remove, vec![".share"]);
        assert_eq!(article.text_elements.len(), DEFAULT_TEXT_ELEMENTS.len());
        assert_eq!(
            article.image,
            Some(FieldSelector::with_attr("figure img", "src"))
        );
    }

    #[test]
    fn test_article_block_requires_content() {
        let mut doc = valid_document();
        doc.categories.get_mut("politics").unwrap().article = Some(ArticleDocument {
            content_remove: vec![" ".to_string()],
            ..Default::default()
        });

        let report = issues(validate_site(doc));
        assert!(report.has_issue_for("categories.politics.article.content"));
        assert!(report.has_issue_for("categories.politics.article.content_remove[0]"));
    }

    #[test]
    fn test_expand_url_pattern() {
        assert_eq!(expand_url_pattern("/c/{slug}/", "sport"), "/c/sport/");
        assert_eq!(expand_url_pattern("/{category}", "eco"), "/eco");
        assert_eq!(expand_url_pattern("/latest", "eco"), "/latest");
    }
}
