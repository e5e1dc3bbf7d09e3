//! Headless Chromium collaborator (`chromium` feature)

use crate::capture::render::{RenderBackend, RenderContext, RenderTarget};
use crate::capture::ImageFormat;
use crate::fetch::{ScriptDriver, ScriptSession};
use crate::{NewsprintError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Pause after activating a trigger so the page can append its content
const TRIGGER_SETTLE: Duration = Duration::from_millis(1500);

fn render_error(url: &str, e: impl std::fmt::Display) -> NewsprintError {
    NewsprintError::Render {
        url: url.to_string(),
        message: e.to_string(),
    }
}

fn screenshot_format(format: ImageFormat) -> CaptureScreenshotFormat {
    match format {
        ImageFormat::Png => CaptureScreenshotFormat::Png,
        ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        ImageFormat::Webp => CaptureScreenshotFormat::Webp,
    }
}

/// One shared browser process; every context is a separate page
pub struct ChromiumBackend {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumBackend {
    /// Launches a headless browser
    pub async fn launch(request_timeout: Duration) -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(request_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| render_error("about:blank", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| render_error("about:blank", e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Headless browser started");
        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    async fn open_page(&self) -> Result<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| render_error("about:blank", e))
    }

    /// A script driver sharing this browser
    pub fn script_driver(self: &Arc<Self>) -> Arc<dyn ScriptDriver> {
        Arc::new(ChromiumScriptDriver {
            backend: Arc::clone(self),
        })
    }
}

impl Drop for ChromiumBackend {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self.open_page().await?;
        Ok(Box::new(ChromiumContext {
            page,
            url: String::from("about:blank"),
        }))
    }
}

struct ChromiumContext {
    page: Page,
    url: String,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn load(&mut self, url: &Url) -> Result<String> {
        self.url = url.to_string();
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| render_error(&self.url, e))?;
        self.page
            .content()
            .await
            .map_err(|e| render_error(&self.url, e))
    }

    async fn dismiss_popups(&mut self, selectors: &[String]) -> Result<usize> {
        let list = serde_json::to_string(selectors)?;
        let script = format!(
            "(() => {{ let n = 0; for (const s of {}) {{ \
               try {{ document.querySelectorAll(s).forEach(e => {{ e.remove(); n++; }}); }} catch (_) {{}} \
             }} document.body && (document.body.style.overflow = 'auto'); return n; }})()",
            list
        );
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| render_error(&self.url, e))?;
        Ok(result.into_value::<usize>().unwrap_or(0))
    }

    async fn capture(&mut self, target: RenderTarget<'_>, format: ImageFormat) -> Result<Vec<u8>> {
        match target {
            RenderTarget::FullPage => {
                let params = ScreenshotParams::builder()
                    .format(screenshot_format(format))
                    .full_page(true)
                    .build();
                self.page
                    .screenshot(params)
                    .await
                    .map_err(|e| render_error(&self.url, e))
            }
            RenderTarget::Element(css) => {
                let element = self
                    .page
                    .find_element(css)
                    .await
                    .map_err(|e| render_error(&self.url, format!("element '{}': {}", css, e)))?;
                element
                    .screenshot(screenshot_format(format))
                    .await
                    .map_err(|e| render_error(&self.url, e))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| render_error(&self.url, e))
    }
}

/// Live documents for script-triggered pagination
struct ChromiumScriptDriver {
    backend: Arc<ChromiumBackend>,
}

#[async_trait]
impl ScriptDriver for ChromiumScriptDriver {
    async fn open(&self, url: &Url) -> Result<Box<dyn ScriptSession>> {
        let page = self.backend.open_page().await?;
        page.goto(url.as_str())
            .await
            .map_err(|e| render_error(url.as_str(), e))?;
        Ok(Box::new(ChromiumSession {
            page,
            url: url.to_string(),
        }))
    }
}

struct ChromiumSession {
    page: Page,
    url: String,
}

#[async_trait]
impl ScriptSession for ChromiumSession {
    async fn html(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| render_error(&self.url, e))
    }

    async fn trigger(&mut self, selector: &str) -> Result<bool> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|e| render_error(&self.url, e))?;
        tokio::time::sleep(TRIGGER_SETTLE).await;
        Ok(true)
    }
}
