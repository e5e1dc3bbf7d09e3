//! Rendering collaborator seam
//!
//! A [`RenderBackend`] hands out [`RenderContext`]s; each context is owned
//! by exactly one worker at a time (`&mut self` everywhere), so a context is
//! never driven concurrently.

use crate::capture::ImageFormat;
use crate::Result;
use async_trait::async_trait;
use url::Url;

/// Part of the loaded page to encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget<'a> {
    FullPage,
    /// The first element matching a CSS selector
    Element(&'a str),
}

/// One isolated rendering context (a browser page, a tab, a test double)
#[async_trait]
pub trait RenderContext: Send {
    /// Navigates to `url` and returns the rendered document
    async fn load(&mut self, url: &Url) -> Result<String>;

    /// Removes popups and overlays matching `selectors`
    ///
    /// # Returns
    ///
    /// The number of elements removed.
    async fn dismiss_popups(&mut self, selectors: &[String]) -> Result<usize>;

    /// Encodes `target` of the loaded page as an image
    async fn capture(&mut self, target: RenderTarget<'_>, format: ImageFormat) -> Result<Vec<u8>>;

    /// Releases the context
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Creates fresh rendering contexts
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
}
