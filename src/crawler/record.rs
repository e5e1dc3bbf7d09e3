use crate::extract::{ArticleDetail, ArticleDraft, PublishDate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One extracted article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub site_id: String,
    pub category: String,
    pub title: String,
    /// Canonical absolute link; unique within a crawl run
    pub link: String,
    pub summary: Option<String>,
    pub published: Option<PublishDate>,
    pub author: Option<String>,
    pub tags: BTreeSet<String>,
    /// Body text read from the article page
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl ArticleRecord {
    pub fn from_draft(site_id: &str, category: &str, draft: ArticleDraft) -> Self {
        Self {
            site_id: site_id.to_string(),
            category: category.to_string(),
            title: draft.title,
            link: draft.link.into(),
            summary: draft.summary,
            published: draft.published,
            author: draft.author,
            tags: draft.tags,
            content: None,
            content_hash: None,
            image_url: None,
            section: None,
            extracted_at: Utc::now(),
        }
    }

    /// Adds what the article page provided; listing-page values win
    pub fn with_detail(mut self, detail: ArticleDetail) -> Self {
        self.author = self.author.or(detail.author);
        self.published = self.published.or(detail.published);
        self.section = detail.section;
        self.image_url = detail.image_url;
        if !detail.content.is_empty() {
            self.content = Some(detail.content);
            self.content_hash = Some(detail.content_hash);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_publish_date;
    use url::Url;

    fn draft() -> ArticleDraft {
        ArticleDraft {
            title: "Story".to_string(),
            link: Url::parse("https://news.example.com/story").unwrap(),
            summary: None,
            published: None,
            author: Some("Desk".to_string()),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_detail_fills_gaps_only() {
        let detail = ArticleDetail {
            content: "Body".to_string(),
            content_hash: "abc".to_string(),
            image_url: Some("https://news.example.com/a.jpg".to_string()),
            author: Some("Amina Benali".to_string()),
            published: parse_publish_date("2024-05-03"),
            section: Some("Economy".to_string()),
        };

        let record = ArticleRecord::from_draft("site", "eco", draft()).with_detail(detail);
        assert_eq!(record.author.as_deref(), Some("Desk"));
        assert!(record.published.is_some());
        assert_eq!(record.content.as_deref(), Some("Body"));
        assert_eq!(record.content_hash.as_deref(), Some("abc"));
        assert_eq!(record.section.as_deref(), Some("Economy"));
    }

    #[test]
    fn test_empty_body_leaves_content_unset() {
        let record =
            ArticleRecord::from_draft("site", "eco", draft()).with_detail(ArticleDetail::default());
        assert_eq!(record.content, None);
        assert_eq!(record.content_hash, None);
    }
}
