//! Ordered selector fallback chains for detail-page fields
//!
//! Each chain starts with the site-specific selector and continues with
//! increasingly generic alternates: a semantic tag or microdata attribute,
//! then "any element whose class contains a keyword". The first step that
//! yields a non-empty value wins; an exhausted chain yields nothing.

use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::infrastructure::document::{compile_selector, element_attr, element_text, PageDocument};

/// Attributes read for image-like fields, in priority order
pub const IMAGE_ATTRIBUTES: [&str; 5] = ["src", "data-src", "data-original", "data-lazy-src", "content"];

/// Where a chain step reads its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Visible text, falling back to a `content` attribute (meta tags)
    Text,
    /// First non-empty attribute among the list
    Attribute(&'static [&'static str]),
}

#[derive(Debug, Clone)]
struct ChainStep {
    raw: String,
    selector: Selector,
}

/// Compiled fallback chain for one field
#[derive(Debug, Clone)]
pub struct FallbackChain {
    field: &'static str,
    source: ValueSource,
    steps: Vec<ChainStep>,
}

impl FallbackChain {
    /// Chain of `primary` (when configured) followed by `alternates`.
    /// Selectors that fail to compile are dropped with a warning.
    pub fn new(field: &'static str, source: ValueSource, primary: Option<&str>, alternates: &[&str]) -> Self {
        let steps = primary
            .into_iter()
            .chain(alternates.iter().copied())
            .filter(|raw| !raw.trim().is_empty())
            .filter_map(|raw| {
                compile_selector(raw).map(|selector| ChainStep {
                    raw: raw.to_string(),
                    selector,
                })
            })
            .collect();

        Self { field, source, steps }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Value from the first step that yields one, searching the whole page
    pub fn resolve(&self, doc: &PageDocument) -> Option<String> {
        self.resolve_in(&doc.root())
    }

    /// Value from the first step that yields one, scoped to `scope`
    pub fn resolve_in(&self, scope: &ElementRef<'_>) -> Option<String> {
        for (index, step) in self.steps.iter().enumerate() {
            let found = scope.select(&step.selector).find_map(|el| self.read(&el));
            if let Some(value) = found {
                debug!("Extracted {} using selector #{} '{}'", self.field, index, step.raw);
                return Some(value);
            }
        }
        debug!("Failed to extract {} using {} selectors", self.field, self.steps.len());
        None
    }

    /// Like `resolve`, but an exhausted chain becomes the empty sentinel
    pub fn resolve_or_empty(&self, doc: &PageDocument) -> String {
        self.resolve(doc).unwrap_or_default()
    }

    fn read(&self, element: &ElementRef<'_>) -> Option<String> {
        match self.source {
            ValueSource::Text => {
                let text = element_text(element);
                if text.is_empty() {
                    element_attr(element, &["content"])
                } else {
                    Some(text)
                }
            }
            ValueSource::Attribute(names) => element_attr(element, names),
        }
    }
}

/// Generic alternates tried after each site selector
pub mod alternates {
    pub const NAME: &[&str] = &["h1", "[class*='product-name']", "[class*='product-title']", "[itemprop='name']"];
    pub const PRICE: &[&str] = &["[itemprop='price']", "[class*='price']", "[id*='price']"];
    pub const IMAGE: &[&str] = &[
        "meta[property='og:image']",
        "img[class*='product']",
        "[class*='gallery'] img",
        "img",
    ];
    pub const DESCRIPTION: &[&str] = &[
        "[itemprop='description']",
        "[class*='description']",
        "[class*='desc']",
        "meta[name='description']",
    ];
    pub const RATING: &[&str] = &["[itemprop='ratingValue']", "[class*='rating']", "[class*='star']"];
    pub const REVIEW_COUNT: &[&str] = &["[itemprop='reviewCount']", "[class*='review-count']", "[class*='review']"];
    pub const REVIEW_CONTAINER: &[&str] = &["[itemprop='review']", "[class*='review-item']", "[class*='comment-item']"];
    pub const REVIEW_AUTHOR: &[&str] = &["[itemprop='author']", "[class*='author']", "[class*='name']"];
    pub const REVIEW_TEXT: &[&str] = &["[itemprop='reviewBody']", "[class*='content']", "p"];
    pub const REVIEW_RATING: &[&str] = &["[itemprop='ratingValue']", "[class*='rating']", "[class*='star']"];
    pub const REVIEW_DATE: &[&str] = &["time", "[itemprop='datePublished']", "[class*='date']"];
}
