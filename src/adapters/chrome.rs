use crate::domain::ports::{BrowserSession, Locator};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const IS_INTERACTABLE_JS: &str = "function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none'
        && !this.disabled;
}";
const FORCE_CLICK_JS: &str = "function() { this.click(); }";
const SCROLL_CENTER_JS: &str = "function() { this.scrollIntoView({block: 'center'}); }";

fn cdp_error(action: &str, e: impl std::fmt::Display) -> EtlError {
    EtlError::browser(format!("{} failed: {}", action, e))
}

/// A Chrome window driven over the DevTools protocol.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    page: Page,
}

impl ChromeSession {
    /// Launches Chrome (1920x1080). `CHROMIUM_PATH` overrides executable discovery.
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .request_timeout(Duration::from_secs(60))
            .no_sandbox()
            .arg("--disable-dev-shm-usage");
        if !headless {
            builder = builder.with_head();
        }
        if let Ok(path) = std::env::var("CHROMIUM_PATH") {
            builder = builder.chrome_executable(PathBuf::from(path));
        }
        let config = builder
            .build()
            .map_err(|e| cdp_error("Building browser config", e))?;

        tracing::debug!("Launching browser (headless: {})", headless);
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| cdp_error("Browser launch", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {:?}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(cdp_error("Opening page", e));
            }
        };

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: std::sync::Mutex::new(Some(handler_task)),
            page,
        })
    }

    async fn resolve(&self, locator: &Locator) -> Result<Option<Element>> {
        let matches = self
            .page
            .find_elements(locator.selector.as_str())
            .await
            .map_err(|e| cdp_error(&format!("Finding {}", locator.selector), e))?;

        let Some(element) = matches.into_iter().nth(locator.index) else {
            return Ok(None);
        };
        match &locator.child {
            Some(child) => Ok(element.find_element(child.as_str()).await.ok()),
            None => Ok(Some(element)),
        }
    }

    async fn require(&self, locator: &Locator) -> Result<Element> {
        self.resolve(locator)
            .await?
            .ok_or_else(|| EtlError::browser(format!("No element matches {}", locator)))
    }

    async fn evaluate(&self, expression: &str) -> Result<()> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|e| cdp_error("Script evaluation", e))?;
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| cdp_error(&format!("Navigating to {}", url), e))?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| cdp_error("Reading page source", e))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let matches = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| cdp_error(&format!("Finding {}", selector), e))?;
        Ok(matches.len())
    }

    async fn text(&self, locator: &Locator) -> Result<Option<String>> {
        match self.resolve(locator).await? {
            Some(element) => element
                .inner_text()
                .await
                .map_err(|e| cdp_error("Reading text", e)),
            None => Ok(None),
        }
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        match self.resolve(locator).await? {
            Some(element) => element
                .attribute(name)
                .await
                .map_err(|e| cdp_error("Reading attribute", e)),
            None => Ok(None),
        }
    }

    async fn is_interactable(&self, locator: &Locator) -> Result<bool> {
        let Some(element) = self.resolve(locator).await? else {
            return Ok(false);
        };
        let returns = element
            .call_js_fn(IS_INTERACTABLE_JS, false)
            .await
            .map_err(|e| cdp_error("Visibility check", e))?;
        Ok(returns
            .result
            .value
            .as_ref()
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.require(locator).await?;
        element
            .click()
            .await
            .map_err(|e| cdp_error(&format!("Clicking {}", locator), e))?;
        Ok(())
    }

    async fn force_click(&self, locator: &Locator) -> Result<()> {
        let element = self.require(locator).await?;
        element
            .call_js_fn(FORCE_CLICK_JS, false)
            .await
            .map_err(|e| cdp_error(&format!("Script click on {}", locator), e))?;
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        let element = self.require(locator).await?;
        element
            .call_js_fn(SCROLL_CENTER_JS, false)
            .await
            .map_err(|e| cdp_error("Scrolling", e))?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        self.evaluate("window.scrollTo(0, 0)").await
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
    }

    /// Idempotent; later calls are no-ops.
    async fn close(&self) -> Result<()> {
        let browser = self.browser.lock().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                let _ = browser.wait().await;
                closed.map_err(|e| cdp_error("Closing browser", e))
            }
            None => Ok(()),
        };

        if let Ok(mut handler) = self.handler.lock() {
            if let Some(task) = handler.take() {
                task.abort();
            }
        }
        result
    }
}
