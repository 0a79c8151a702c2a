//! Listing-page link discovery
//!
//! Each product container contributes at most one detail URL: the configured
//! `detailUrl` anchor, the container itself when it is an anchor, or its first
//! `a[href]`. Relative links are resolved against the site origin.

use scraper::{ElementRef, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::domain::SiteConfig;
use crate::infrastructure::document::{compile_selector, PageDocument};
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

const ANY_LINK: &str = "a[href]";

pub struct ListingExtractor {
    container: Selector,
    detail_link: Option<Selector>,
    any_link: Selector,
    base: Url,
}

impl ListingExtractor {
    /// Compile the listing selectors of a validated site config
    pub fn new(config: &SiteConfig) -> HarvestResult<Self> {
        let container = Selector::parse(config.product_container()).map_err(|e| {
            HarvestError::config("productContainer", format!("invalid selector '{}': {e}", config.product_container()))
        })?;
        let any_link = Selector::parse(ANY_LINK).map_err(|e| HarvestError::config("detailUrl", e.to_string()))?;

        Ok(Self {
            container,
            detail_link: config.detail_url().and_then(compile_selector),
            any_link,
            base: config.base_origin()?,
        })
    }

    /// Absolute detail URLs in page order, one per container that has a usable link
    pub fn extract(&self, source: &str) -> Vec<Url> {
        let doc = PageDocument::parse(source);
        let mut urls = Vec::new();

        for (index, container) in doc.select(&self.container).enumerate() {
            let Some(href) = self.container_href(&container) else {
                debug!("Container #{} has no usable link", index);
                continue;
            };
            match self.base.join(&href) {
                Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
                    // Same page, different anchor
                    url.set_fragment(None);
                    urls.push(url);
                }
                Ok(url) => debug!("Ignoring non-http link {}", url),
                Err(e) => warn!("Could not resolve link '{}': {}", href, e),
            }
        }

        urls
    }

    fn container_href(&self, container: &ElementRef<'_>) -> Option<String> {
        let configured = self
            .detail_link
            .as_ref()
            .and_then(|selector| container.select(selector).find_map(|el| usable_href(&el)));
        if configured.is_some() {
            return configured;
        }

        if container.value().name() == "a" {
            if let Some(href) = usable_href(container) {
                return Some(href);
            }
        }

        container.select(&self.any_link).find_map(|el| usable_href(&el))
    }
}

fn usable_href(element: &ElementRef<'_>) -> Option<String> {
    let href = element.value().attr("href")?.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty() || href.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    Some(href.to_string())
}
