//! Config-driven extraction engine
//!
//! One engine serves one site job. It exclusively owns its navigator and is
//! strictly sequential: list scan, then detail pages one after another, with a
//! politeness pause after every scan and around every detail navigation.
//!
//! Only `Config` and `ResourceFatal` errors leave the engine. Timeouts, blocks
//! and navigation failures of a single URL become a `Failed` outcome for that
//! URL and the engine stays usable.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::domain::{DetailOutcome, DetailState, FailureReason, SiteConfig, SkipReason};
use crate::infrastructure::config::EngineSettings;
use crate::infrastructure::detail_extractor::{DetailExtraction, DetailExtractor};
use crate::infrastructure::document::PageDocument;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult, NavigationError};
use crate::infrastructure::listing_extractor::ListingExtractor;
use crate::infrastructure::navigator::{Navigator, SCROLL_TO_BOTTOM_SCRIPT};
use crate::infrastructure::pacing::{DelayPolicy, RandomDelay};

/// Slack added on top of a navigator-side wait before the engine gives up on it
const WAIT_GRACE: Duration = Duration::from_secs(1);

/// Tracks one detail URL through its forward-only lifecycle
struct DetailProgress<'a> {
    url: &'a str,
    state: DetailState,
}

impl<'a> DetailProgress<'a> {
    fn new(url: &'a str) -> Self {
        Self {
            url,
            state: DetailState::Queued,
        }
    }

    fn advance(&mut self, next: DetailState) {
        if self.state.can_transition_to(next) {
            debug!("{}: {:?} -> {:?}", self.url, self.state, next);
            self.state = next;
        } else {
            warn!("{}: ignoring transition {:?} -> {:?}", self.url, self.state, next);
        }
    }
}

pub struct ExtractionEngine {
    navigator: Option<Box<dyn Navigator>>,
    delay: Box<dyn DelayPolicy>,
    settings: EngineSettings,
    seen: HashSet<String>,
}

impl ExtractionEngine {
    pub fn new(navigator: Box<dyn Navigator>, delay: Box<dyn DelayPolicy>, settings: EngineSettings) -> Self {
        Self {
            navigator: Some(navigator),
            delay,
            settings,
            seen: HashSet::new(),
        }
    }

    /// Engine pacing with a `RandomDelay` drawn from the configured bounds
    pub fn with_random_delay(navigator: Box<dyn Navigator>, settings: EngineSettings, seed: u64) -> Self {
        let delay = RandomDelay::from_millis(settings.min_delay_ms, settings.max_delay_ms, seed);
        Self::new(navigator, Box::new(delay), settings)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.navigator.is_none()
    }

    /// Scan the site's listing page for candidate detail URLs.
    ///
    /// A container that never shows up, or a listing page that cannot be
    /// loaded, yields an empty list. A blocked listing page is reported as
    /// `BlockedSite` so the caller can record it.
    pub async fn discover_listings(&mut self, config: &SiteConfig) -> HarvestResult<Vec<Url>> {
        let extractor = ListingExtractor::new(config)?;
        let list_url = config.url();
        info!("Scanning listing page {}", list_url);

        let scanned = self.scan_listing(&extractor, config).await;
        self.pause("listing scan").await;

        let candidates = match scanned {
            Ok(candidates) => candidates,
            Err(e @ HarvestError::BlockedSite { .. }) => {
                warn!("Listing page {} is blocked: {}", list_url, e);
                return Err(e);
            }
            Err(e) if e.is_recoverable() => {
                warn!("Listing scan of {} failed, no candidates: {}", list_url, e);
                return Ok(Vec::new());
            }
            Err(e) => {
                error!("Listing scan of {} aborted: {}", list_url, e);
                return Err(e);
            }
        };

        let found = candidates.len();
        let mut urls = Vec::new();
        for url in candidates {
            if urls.len() >= self.settings.max_listings {
                break;
            }
            if self.seen.insert(url.to_string()) {
                urls.push(url);
            } else {
                debug!("Skipping duplicate listing {}", url);
            }
        }

        info!(
            "Listing scan of {} found {} links, keeping {} (cap {})",
            list_url,
            found,
            urls.len(),
            self.settings.max_listings
        );
        Ok(urls)
    }

    /// Visit one detail page and pull out its raw fields
    pub async fn extract_detail(&mut self, url: &str, config: &SiteConfig) -> HarvestResult<DetailOutcome> {
        let extractor = DetailExtractor::new(config);
        let mut progress = DetailProgress::new(url);

        self.pause("before detail").await;
        let result = self.visit_detail(url, &extractor, &mut progress).await;
        self.pause("after detail").await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                progress.advance(DetailState::Failed);
                self.absorb(url, e)
            }
        }
    }

    /// Release the navigator. Safe to call any number of times.
    pub async fn close(&mut self) {
        let Some(mut navigator) = self.navigator.take() else {
            debug!("Engine already closed");
            return;
        };
        match navigator.close().await {
            Ok(()) => info!("Extraction engine closed"),
            Err(e) => warn!("Navigator did not close cleanly: {}", e),
        }
    }

    async fn scan_listing(&mut self, extractor: &ListingExtractor, config: &SiteConfig) -> HarvestResult<Vec<Url>> {
        let list_url = config.url();
        self.navigate(list_url).await?;
        let present = self.wait_for(list_url, config.product_container()).await?;
        let source = self.page_source(list_url).await?;

        if let Some(marker) = self.find_block_marker(&source) {
            return Err(HarvestError::BlockedSite {
                url: list_url.to_string(),
                marker,
            });
        }
        if !present {
            warn!(
                "Product container '{}' not found within {}ms on {}",
                config.product_container(),
                self.settings.wait_timeout_ms,
                list_url
            );
            return Ok(Vec::new());
        }

        Ok(extractor.extract(&source))
    }

    async fn visit_detail(
        &mut self,
        url: &str,
        extractor: &DetailExtractor,
        progress: &mut DetailProgress<'_>,
    ) -> HarvestResult<DetailOutcome> {
        self.navigate(url).await?;
        progress.advance(DetailState::Navigated);

        if self.settings.scroll_for_lazy_content {
            self.scroll_to_bottom(url).await?;
        }
        let source = self.page_source(url).await?;
        progress.advance(DetailState::ExtractingFields);

        let page_url = self
            .navigator
            .as_ref()
            .and_then(|nav| nav.current_url())
            .and_then(|current| Url::parse(current).ok())
            .or_else(|| Url::parse(url).ok())
            .ok_or_else(|| HarvestError::Parse {
                input: url.to_string(),
                reason: "not an absolute URL".to_string(),
            })?;

        let extraction = {
            let doc = PageDocument::parse(&source);
            match doc.block_marker(&self.settings.block_markers) {
                Some(marker) => Err(HarvestError::BlockedSite {
                    url: url.to_string(),
                    marker: marker.to_string(),
                }),
                None => Ok(extractor.extract_from(&doc, &source, &page_url)),
            }
        }?;

        match extraction {
            DetailExtraction::Fields { fields, spec_strategy } => {
                progress.advance(DetailState::Built);
                match spec_strategy {
                    Some(strategy) => debug!("{}: {} spec pairs via {}", url, fields.specifications.len(), strategy),
                    None => debug!("{}: no specifications found", url),
                }
                Ok(DetailOutcome::Extracted(fields))
            }
            DetailExtraction::MissingName => {
                progress.advance(DetailState::Skipped);
                info!("Skipping {}: name not found", url);
                Ok(DetailOutcome::Skipped(SkipReason::MissingName))
            }
        }
    }

    /// Per-URL failures become outcomes; only fatal errors propagate
    fn absorb(&self, url: &str, err: HarvestError) -> HarvestResult<DetailOutcome> {
        let reason = match err {
            HarvestError::BlockedSite { marker, .. } => {
                warn!("Blocked at {} (marker: {}), not retrying", url, marker);
                FailureReason::Blocked { marker }
            }
            HarvestError::FetchTimeout { timeout_ms, .. } => {
                warn!("Timed out after {}ms: {}", timeout_ms, url);
                FailureReason::Timeout
            }
            HarvestError::Config { .. } | HarvestError::ResourceFatal { .. } => {
                error!("Fatal error while extracting {}: {}", url, err);
                return Err(err);
            }
            other => {
                warn!("Failed to extract {}: {}", url, other);
                FailureReason::Navigation {
                    message: other.to_string(),
                }
            }
        };
        Ok(DetailOutcome::Failed(reason))
    }

    fn navigator_mut(&mut self) -> HarvestResult<&mut Box<dyn Navigator>> {
        self.navigator
            .as_mut()
            .ok_or_else(|| HarvestError::resource_fatal("extraction engine is closed"))
    }

    async fn navigate(&mut self, url: &str) -> HarvestResult<()> {
        let limit = self.settings.navigation_timeout();
        let timeout_ms = self.settings.navigation_timeout_ms;
        let navigator = self.navigator_mut()?;

        match timeout(limit, navigator.navigate(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into_harvest_error(url, timeout_ms)),
            Err(_) => Err(HarvestError::FetchTimeout {
                url: url.to_string(),
                timeout_ms,
            }),
        }
    }

    async fn page_source(&mut self, url: &str) -> HarvestResult<String> {
        let limit = self.settings.navigation_timeout();
        let timeout_ms = self.settings.navigation_timeout_ms;
        let navigator = self.navigator_mut()?;

        match timeout(limit, navigator.page_source()).await {
            Ok(result) => result.map_err(|e| e.into_harvest_error(url, timeout_ms)),
            Err(_) => Err(HarvestError::FetchTimeout {
                url: url.to_string(),
                timeout_ms,
            }),
        }
    }

    /// Bounded wait for `selector`; running out of time is `Ok(false)`
    async fn wait_for(&mut self, url: &str, selector: &str) -> HarvestResult<bool> {
        let wait = self.settings.wait_timeout();
        let timeout_ms = self.settings.wait_timeout_ms;
        let navigator = self.navigator_mut()?;

        match timeout(wait + WAIT_GRACE, navigator.wait_until_present(selector, wait)).await {
            Ok(Ok(present)) => Ok(present),
            Ok(Err(e)) if e.is_fatal() => Err(e.into_harvest_error(url, timeout_ms)),
            Ok(Err(e)) => {
                debug!("Waiting for '{}' on {} failed: {}", selector, url, e);
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    /// Trigger lazy-loaded sections; navigators without scripting are skipped
    async fn scroll_to_bottom(&mut self, url: &str) -> HarvestResult<()> {
        let wait = self.settings.wait_timeout();
        let timeout_ms = self.settings.wait_timeout_ms;
        let navigator = self.navigator_mut()?;

        match timeout(wait, navigator.execute_script(SCROLL_TO_BOTTOM_SCRIPT)).await {
            Ok(Ok(_)) => debug!("Scrolled {} for lazy content", url),
            Ok(Err(NavigationError::Unsupported(_))) => {}
            Ok(Err(e)) if e.is_fatal() => return Err(e.into_harvest_error(url, timeout_ms)),
            Ok(Err(e)) => debug!("Scroll on {} failed: {}", url, e),
            Err(_) => debug!("Scroll on {} timed out", url),
        }
        Ok(())
    }

    fn find_block_marker(&self, source: &str) -> Option<String> {
        PageDocument::parse(source)
            .block_marker(&self.settings.block_markers)
            .map(str::to_string)
    }

    async fn pause(&mut self, reason: &str) {
        let delay = self.delay.next_delay();
        if delay > Duration::ZERO {
            debug!("Pausing {:?} ({})", delay, reason);
            tokio::time::sleep(delay).await;
        }
    }
}

impl Drop for ExtractionEngine {
    fn drop(&mut self) {
        if self.navigator.is_some() {
            warn!("Extraction engine dropped without close(); navigator released implicitly");
        }
    }
}
