//! Page fetching collaborators
//!
//! The crawl engine talks to the network only through [`PageFetcher`]
//! (plain HTTP documents) and [`ScriptDriver`] (live documents whose
//! content grows when a trigger is activated). Both are traits so tests and
//! alternative transports can be swapped in.

mod http;
mod retry;

pub use http::{build_http_client, HttpFetcher};
pub use retry::{fetch_with_retry, RetryPolicy};

use crate::Result;
use async_trait::async_trait;
use url::Url;

/// A fetched document
#[derive(Debug, Clone)]
pub struct PageFetchResult {
    /// The URL that was requested
    pub url: Url,
    /// The URL after redirects
    pub final_url: Url,
    /// HTTP status of the final response
    pub status: u16,
    pub body: String,
}

/// Fetches one document per call
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`
    ///
    /// Errors are classified so that [`crate::NewsprintError::is_retryable`]
    /// tells transient failures from permanent ones.
    async fn fetch(&self, url: &Url) -> Result<PageFetchResult>;
}

/// Opens live document sessions for script-triggered pagination
#[async_trait]
pub trait ScriptDriver: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Box<dyn ScriptSession>>;
}

/// One live document owned by a single category crawl
#[async_trait]
pub trait ScriptSession: Send {
    /// Serializes the current document state
    async fn html(&mut self) -> Result<String>;

    /// Activates the element matched by `selector`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The trigger was found and activated
    /// * `Ok(false)` - No element matches `selector`
    async fn trigger(&mut self, selector: &str) -> Result<bool>;
}
