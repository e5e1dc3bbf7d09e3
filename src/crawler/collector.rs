//! Run-scoped deduplication of article links and article bodies

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Set of canonical links already emitted by an engine
///
/// Cloning shares the underlying set. All category crawls of an engine
/// insert through the same mutex, so a link is accepted at most once no
/// matter how many categories list it.
#[derive(Debug, Clone, Default)]
pub struct ArticleCollector {
    seen: Arc<Mutex<HashSet<String>>>,
    bodies: Arc<Mutex<HashSet<String>>>,
}

impl ArticleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `link`, returning false if it was already present
    pub fn insert(&self, link: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert(link.to_string())
    }

    /// Records the hash of an article body, returning false if the same
    /// body was already emitted under another link
    pub fn insert_body(&self, content_hash: &str) -> bool {
        let mut bodies = self.bodies.lock().unwrap_or_else(PoisonError::into_inner);
        bodies.insert(content_hash.to_string())
    }

    pub fn contains(&self, link: &str) -> bool {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.contains(link)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every link and body
    pub fn clear(&self) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
