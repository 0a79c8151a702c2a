//! In-memory navigator serving canned pages
//!
//! Used by tests and for replaying saved pages offline. Every navigation is
//! recorded with the tokio clock instant it happened at, so pacing can be
//! checked under a paused runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::infrastructure::document::{compile_selector, PageDocument};
use crate::infrastructure::harvest_error::NavigationError;
use crate::infrastructure::navigator::{NavResult, Navigator};

/// What the fixture answers for one URL
#[derive(Debug, Clone)]
pub enum FixturePage {
    Html(String),
    /// Never answers; the caller's timeout decides
    Hang,
    Status(u16),
    /// The backend dies, e.g. a crashed browser
    Fatal(String),
}

#[derive(Debug, Clone)]
pub struct Visit {
    pub url: String,
    pub at: Instant,
}

/// Shared view on what a fixture navigator did, usable after the navigator
/// has been moved into an engine
#[derive(Debug, Clone, Default)]
pub struct FixtureLog {
    visits: Arc<Mutex<Vec<Visit>>>,
    scripts: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

impl FixtureLog {
    pub fn visits(&self) -> Vec<Visit> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn visited_urls(&self) -> Vec<String> {
        self.visits().into_iter().map(|visit| visit.url).collect()
    }

    pub fn scripts_run(&self) -> usize {
        self.scripts.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn record(&self, url: &str) {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(Visit {
                url: url.to_string(),
                at: Instant::now(),
            });
        }
    }
}

#[derive(Debug, Default)]
pub struct FixtureNavigator {
    pages: HashMap<String, FixturePage>,
    current: Option<(String, String)>,
    scripts_supported: bool,
    closed: bool,
    log: FixtureLog,
}

impl FixtureNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), FixturePage::Html(html.into()));
        self
    }

    pub fn with_response(mut self, url: impl Into<String>, page: FixturePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Accept scripts (as a browser would) instead of reporting them unsupported
    pub fn with_scripts(mut self) -> Self {
        self.scripts_supported = true;
        self
    }

    pub fn log(&self) -> FixtureLog {
        self.log.clone()
    }

    fn current_source(&self) -> NavResult<&str> {
        if self.closed {
            return Err(NavigationError::Closed);
        }
        self.current
            .as_ref()
            .map(|(_, source)| source.as_str())
            .ok_or(NavigationError::NoPage)
    }
}

#[async_trait]
impl Navigator for FixtureNavigator {
    async fn navigate(&mut self, url: &str) -> NavResult<()> {
        if self.closed {
            return Err(NavigationError::Closed);
        }
        self.log.record(url);
        self.current = None;

        match self.pages.get(url).cloned() {
            Some(FixturePage::Html(html)) => {
                self.current = Some((url.to_string(), html));
                Ok(())
            }
            Some(FixturePage::Hang) => {
                std::future::pending::<()>().await;
                Err(NavigationError::Timeout)
            }
            Some(FixturePage::Status(status)) => Err(NavigationError::Http { status }),
            Some(FixturePage::Fatal(message)) => Err(NavigationError::Fatal(message)),
            None => Err(NavigationError::Http { status: 404 }),
        }
    }

    async fn wait_until_present(&mut self, selector: &str, timeout: Duration) -> NavResult<bool> {
        let found = {
            let source = self.current_source()?;
            compile_selector(selector).is_some_and(|compiled| PageDocument::parse(source).has_match(&compiled))
        };
        if !found {
            tokio::time::sleep(timeout).await;
        }
        Ok(found)
    }

    async fn page_source(&mut self) -> NavResult<String> {
        self.current_source().map(str::to_string)
    }

    async fn execute_script(&mut self, _script: &str) -> NavResult<serde_json::Value> {
        self.current_source()?;
        if !self.scripts_supported {
            return Err(NavigationError::Unsupported("script execution"));
        }
        self.log.scripts.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::Value::Null)
    }

    async fn close(&mut self) -> NavResult<()> {
        self.log.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.current = None;
        Ok(())
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|(url, _)| url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_serves_pages_and_records_visits() {
        let mut nav = FixtureNavigator::new()
            .with_page("https://shop.example/a", "<div class='item'>A</div>")
            .with_response("https://shop.example/b", FixturePage::Status(429));
        let log = nav.log();

        nav.navigate("https://shop.example/a").await.unwrap();
        assert_eq!(nav.current_url(), Some("https://shop.example/a"));
        assert_eq!(nav.wait_until_present(".item", Duration::from_secs(5)).await, Ok(true));

        let before = Instant::now();
        assert_eq!(nav.wait_until_present(".missing", Duration::from_secs(5)).await, Ok(false));
        assert!(Instant::now() - before >= Duration::from_secs(5));

        assert_eq!(
            nav.navigate("https://shop.example/b").await,
            Err(NavigationError::Http { status: 429 })
        );
        assert_eq!(log.visited_urls(), vec!["https://shop.example/a", "https://shop.example/b"]);
    }

    #[tokio::test]
    async fn test_closed_navigator_refuses_work() {
        let mut nav = FixtureNavigator::new().with_page("https://shop.example/a", "<p>a</p>");
        let log = nav.log();
        nav.close().await.unwrap();
        assert_eq!(nav.navigate("https://shop.example/a").await, Err(NavigationError::Closed));
        assert_eq!(log.close_calls(), 1);
    }
}
