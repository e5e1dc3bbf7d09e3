use crate::capture::sanitize_label;
use crate::crawler::{ArticleRecord, CrawlReport};
use crate::Result;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Articles grouped by category, categories in first-seen order
pub fn group_by_category(articles: &[ArticleRecord]) -> IndexMap<&str, Vec<&ArticleRecord>> {
    let mut groups: IndexMap<&str, Vec<&ArticleRecord>> = IndexMap::new();
    for article in articles {
        groups.entry(article.category.as_str()).or_default().push(article);
    }
    groups
}

/// Files produced by one [`JsonArticleWriter::write_report`] call
#[derive(Debug, Default)]
pub struct WrittenFiles {
    pub raw: PathBuf,
    pub classified: Vec<PathBuf>,
}

/// Writes crawl reports under a root directory
///
/// - `raw/<site>/<run timestamp>.json`: the complete report of one run
/// - `classified/<site>/<category>.json`: every article ever seen for a
///   category, merged across runs by link
#[derive(Debug, Clone)]
pub struct JsonArticleWriter {
    root: PathBuf,
}

impl JsonArticleWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_path(&self, report: &CrawlReport) -> PathBuf {
        self.root
            .join("raw")
            .join(sanitize_label(&report.site_id))
            .join(format!("{}.json", report.started_at.format("%Y%m%d_%H%M%S")))
    }

    pub fn classified_path(&self, site_id: &str, category: &str) -> PathBuf {
        self.root
            .join("classified")
            .join(sanitize_label(site_id))
            .join(format!("{}.json", sanitize_label(category)))
    }

    /// Writes the raw report and merges its articles into the classified files
    pub fn write_report(&self, report: &CrawlReport) -> Result<WrittenFiles> {
        let raw = self.raw_path(report);
        write_json(&raw, report)?;
        tracing::info!("Wrote {} article(s) to {}", report.total_articles(), raw.display());

        let mut written = WrittenFiles {
            raw,
            classified: Vec::new(),
        };

        for (category, articles) in group_by_category(&report.articles) {
            let path = self.classified_path(&report.site_id, category);
            let added = merge_into(&path, &articles)?;
            tracing::debug!("{}: {} new article(s) in {}", category, added, path.display());
            written.classified.push(path);
        }

        Ok(written)
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

/// Appends articles whose link is not in the file yet; returns how many
fn merge_into(path: &Path, articles: &[&ArticleRecord]) -> Result<usize> {
    let mut existing: Vec<ArticleRecord> = if path.exists() {
        serde_json::from_str(&fs::read_to_string(path)?)?
    } else {
        Vec::new()
    };

    let mut links: HashSet<String> = existing.iter().map(|a| a.link.clone()).collect();
    let before = existing.len();
    for article in articles {
        if links.insert(article.link.clone()) {
            existing.push((*article).clone());
        }
    }

    write_json(path, &existing)?;
    Ok(existing.len() - before)
}
