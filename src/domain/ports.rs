use crate::domain::batch::{JobRun, JobRunRequest, JobRunState, TableSnapshot};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Addresses the `index`-th element matching `selector`, optionally narrowed
/// to its first descendant matching `child`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub selector: String,
    pub index: usize,
    pub child: Option<String>,
}

impl Locator {
    pub fn first(selector: &str) -> Self {
        Self::nth(selector, 0)
    }

    pub fn nth(selector: &str, index: usize) -> Self {
        Self {
            selector: selector.to_string(),
            index,
            child: None,
        }
    }

    pub fn within(&self, child: &str) -> Self {
        Self {
            selector: self.selector.clone(),
            index: self.index,
            child: Some(child.to_string()),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)?;
        if let Some(child) = &self.child {
            write!(f, " >> {}", child)?;
        }
        Ok(())
    }
}

/// A live page in a browser. Lookups that find nothing return `Ok(None)`
/// (or `Ok(false)`); actions on a missing element return an error.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn page_source(&self) -> Result<String>;
    async fn count(&self, selector: &str) -> Result<usize>;
    async fn text(&self, locator: &Locator) -> Result<Option<String>>;
    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;
    /// Displayed and enabled.
    async fn is_interactable(&self, locator: &Locator) -> Result<bool>;
    async fn click(&self, locator: &Locator) -> Result<()>;
    /// Dispatches the click from script, bypassing overlay and hit-testing checks.
    async fn force_click(&self, locator: &Locator) -> Result<()>;
    async fn scroll_into_view(&self, locator: &Locator) -> Result<()>;
    async fn scroll_to_top(&self) -> Result<()>;
    async fn scroll_to_bottom(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

pub trait ObjectStore: Send + Sync {
    fn put_object(
        &self,
        key: &str,
        data: &[u8],
        replace: bool,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Size in bytes, or `None` when the object does not exist.
    fn head_object(&self, key: &str) -> impl std::future::Future<Output = Result<Option<u64>>> + Send;

    fn read_object(&self, key: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Human-readable location of `key`, e.g. `s3://bucket/key`.
    fn describe(&self, key: &str) -> String;
}

#[async_trait]
pub trait TableSource: Send + Sync {
    async fn fetch_table(&self, table: &str) -> Result<TableSnapshot>;
}

#[async_trait]
pub trait JobTrigger: Send + Sync {
    async fn run_now(&self, request: &JobRunRequest) -> Result<JobRun>;
    async fn run_state(&self, run_id: i64) -> Result<JobRunState>;
}
