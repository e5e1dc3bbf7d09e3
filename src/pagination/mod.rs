//! Pagination Controller
//!
//! Walks the listing pages of one category under a [`PaginationConfig`]
//! until a stop condition is met. The controller never fetches anything
//! itself: the crawl engine asks it for the next target, fetches it, and
//! reports what it observed on the page.
//!
//! [`PaginationConfig`]: crate::config::PaginationConfig

mod controller;

pub use controller::PaginationController;

use std::fmt;
use url::Url;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    /// No page requested yet
    Start,
    /// Another page may follow
    HasNext,
    /// The category is finished
    Exhausted,
    /// Pagination broke and cannot continue
    Error,
}

/// What the engine should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch this listing page over HTTP
    Fetch(Url),
    /// Open a live document at this URL (first step of script-triggered loads)
    Open(Url),
    /// Activate the load trigger in the open document
    Trigger { selector: String, iteration: u32 },
    /// No more pages
    Done(StopReason),
}

/// Why a category stopped paginating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The article-container selector matched nothing
    EmptyPage,
    /// The "next" link (or load trigger) is absent
    NoNextLink,
    /// `max_pages` listing pages were requested
    PageLimit,
    /// A trigger produced no new article containers
    NoNewContent,
    /// The trigger was activated `max_iterations` times
    MaxIterations,
    /// The "next" link pointed at a page already visited
    RepeatedUrl,
    /// A page could not be fetched and the chain cannot be resumed
    FetchFailed,
    /// The crawl policy denied a page the chain depends on
    PolicyDenied,
    /// The article limit was reached
    LimitReached,
}

impl StopReason {
    /// True when the stop reflects a failure rather than natural completion
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed | Self::PolicyDenied)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EmptyPage => "empty page",
            Self::NoNextLink => "no next link",
            Self::PageLimit => "page limit reached",
            Self::NoNewContent => "no new content after trigger",
            Self::MaxIterations => "max iterations reached",
            Self::RepeatedUrl => "next link already visited",
            Self::FetchFailed => "fetch failed",
            Self::PolicyDenied => "denied by crawl policy",
            Self::LimitReached => "article limit reached",
        };
        f.write_str(text)
    }
}

/// What the engine saw on a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageObservation {
    /// Number of article-container matches in the document
    pub container_matches: usize,
    /// Absolute URL read from the "next" selector, if present
    pub next_link: Option<Url>,
}

/// Result of handling the target returned by [`PaginationController::next_page`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Observed(PageObservation),
    /// Fetch failed after retries
    FetchFailed,
    /// The crawl policy denied the page
    Denied,
    /// The load trigger is absent from the live document
    TriggerMissing,
}
