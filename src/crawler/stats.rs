use crate::pagination::StopReason;
use serde::{Serialize, Serializer};

/// How a category crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Pagination ended naturally or a limit was reached
    Completed,
    /// Some pages failed or the chain broke early
    PartialFailure,
    /// Nothing could be crawled (e.g. an invalid selector)
    Failed,
}

fn serialize_stop<S: Serializer>(stop: &Option<StopReason>, s: S) -> Result<S::Ok, S::Error> {
    match stop {
        Some(reason) => s.serialize_some(&reason.to_string()),
        None => s.serialize_none(),
    }
}

/// Counters of one category crawl
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub pages_requested: u32,
    pub pages_fetched: u32,
    pub pages_failed: u32,
    /// Pages denied by the crawl policy
    pub pages_skipped: u32,
    pub articles_found: usize,
    /// Containers without a title or link
    pub articles_dropped: usize,
    /// Links rejected by the link filters
    pub articles_filtered: usize,
    /// Repeated links, and article pages whose body was already seen
    pub duplicates: usize,
    pub articles_kept: usize,
    /// Article pages fetched and extracted
    pub details_fetched: usize,
    /// Article pages that could not be fetched; the listing entry is kept
    pub details_failed: usize,
    /// Article pages denied by the crawl policy
    pub details_skipped: usize,
    #[serde(serialize_with = "serialize_stop")]
    pub stop_reason: Option<StopReason>,
    pub status: CategoryStatus,
    pub errors: Vec<String>,
}

impl CategoryStats {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            pages_requested: 0,
            pages_fetched: 0,
            pages_failed: 0,
            pages_skipped: 0,
            articles_found: 0,
            articles_dropped: 0,
            articles_filtered: 0,
            duplicates: 0,
            articles_kept: 0,
            details_fetched: 0,
            details_failed: 0,
            details_skipped: 0,
            stop_reason: None,
            status: CategoryStatus::Completed,
            errors: Vec::new(),
        }
    }

    /// Marks the category as failed outright
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = CategoryStatus::Failed;
        self.errors.push(error.into());
    }

    /// Derives the final status from the counters and stop reason
    pub fn settle(&mut self, stop: Option<StopReason>) {
        self.stop_reason = stop;
        if self.status == CategoryStatus::Failed {
            return;
        }
        let broke = stop.is_some_and(|s| s.is_failure());
        if broke || self.pages_failed > 0 {
            self.status = if self.pages_fetched == 0 {
                CategoryStatus::Failed
            } else {
                CategoryStatus::PartialFailure
            };
        }
    }

    pub fn partial_failure(&self) -> bool {
        self.status != CategoryStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_completed() {
        let mut stats = CategoryStats::new("politics");
        stats.pages_fetched = 2;
        stats.settle(Some(StopReason::EmptyPage));
        assert_eq!(stats.status, CategoryStatus::Completed);
        assert!(!stats.partial_failure());
    }

    #[test]
    fn test_settle_partial_failure() {
        let mut stats = CategoryStats::new("politics");
        stats.pages_fetched = 1;
        stats.pages_failed = 1;
        stats.settle(Some(StopReason::FetchFailed));
        assert_eq!(stats.status, CategoryStatus::PartialFailure);
    }

    #[test]
    fn test_settle_nothing_fetched_is_failure() {
        let mut stats = CategoryStats::new("politics");
        stats.pages_failed = 1;
        stats.settle(Some(StopReason::FetchFailed));
        assert_eq!(stats.status, CategoryStatus::Failed);
    }

    #[test]
    fn test_failed_is_sticky() {
        let mut stats = CategoryStats::new("politics");
        stats.fail("invalid selector");
        stats.settle(None);
        assert_eq!(stats.status, CategoryStatus::Failed);
        assert_eq!(stats.errors, vec!["invalid selector"]);
    }

    #[test]
    fn test_serializes_stop_reason_as_text() {
        let mut stats = CategoryStats::new("politics");
        stats.settle(Some(StopReason::PageLimit));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["stop_reason"], "page limit reached");
        assert_eq!(json["status"], "completed");
    }
}
