//! Navigation capability injected into the extraction engine
//!
//! The engine only depends on this contract. Element lookup, text and
//! attribute access are served from the page source through `PageDocument`,
//! so a backend only has to load pages and hand back their markup.

use std::time::Duration;

use async_trait::async_trait;

use crate::infrastructure::harvest_error::NavigationError;

pub type NavResult<T> = Result<T, NavigationError>;

/// Script run before reading detail pages to trigger lazy-loaded sections
pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[async_trait]
pub trait Navigator: Send {
    /// Load `url` as the current page
    async fn navigate(&mut self, url: &str) -> NavResult<()>;

    /// Wait up to `timeout` for `selector` to match at least one element.
    /// `Ok(false)` means the wait ran out, which is not an error.
    async fn wait_until_present(&mut self, selector: &str, timeout: Duration) -> NavResult<bool>;

    /// Markup of the current page
    async fn page_source(&mut self) -> NavResult<String>;

    /// Run a script in the page; backends without a JS engine return `Unsupported`
    async fn execute_script(&mut self, script: &str) -> NavResult<serde_json::Value>;

    /// Release the underlying resource. Calling it twice must be harmless.
    async fn close(&mut self) -> NavResult<()>;

    /// URL of the current page, if any
    fn current_url(&self) -> Option<&str>;
}
