//! Detail-page field extraction
//!
//! Synchronous: takes page source, returns the raw field set. The name is the
//! only mandatory field; every other field falls back to an empty sentinel.

use scraper::Selector;
use tracing::debug;
use url::Url;

use crate::domain::{RawFieldSet, RawReview, SiteConfig};
use crate::infrastructure::document::{compile_selector, PageDocument};
use crate::infrastructure::fallback_chain::{alternates, FallbackChain, ValueSource, IMAGE_ATTRIBUTES};
use crate::infrastructure::specs_extractor::{SpecStrategy, SpecsExtractor};

/// What a parsed detail page produced
#[derive(Debug, Clone, PartialEq)]
pub enum DetailExtraction {
    Fields {
        fields: RawFieldSet,
        spec_strategy: Option<SpecStrategy>,
    },
    MissingName,
}

struct ReviewChains {
    containers: Vec<Selector>,
    author: FallbackChain,
    text: FallbackChain,
    rating: FallbackChain,
    date: FallbackChain,
}

/// Compiled field chains for one site
pub struct DetailExtractor {
    name: FallbackChain,
    price: FallbackChain,
    image: FallbackChain,
    description: FallbackChain,
    rating: FallbackChain,
    review_count: FallbackChain,
    specs: SpecsExtractor,
    reviews: Option<ReviewChains>,
}

impl DetailExtractor {
    pub fn new(config: &SiteConfig) -> Self {
        let reviews = config.has_review_selectors().then(|| ReviewChains {
            containers: match config.review_container().and_then(compile_selector) {
                Some(selector) => vec![selector],
                None => alternates::REVIEW_CONTAINER.iter().filter_map(|s| compile_selector(s)).collect(),
            },
            author: FallbackChain::new("review author", ValueSource::Text, config.review_author(), alternates::REVIEW_AUTHOR),
            text: FallbackChain::new("review text", ValueSource::Text, config.review_text(), alternates::REVIEW_TEXT),
            rating: FallbackChain::new("review rating", ValueSource::Text, config.review_rating(), alternates::REVIEW_RATING),
            date: FallbackChain::new("review date", ValueSource::Text, config.review_date(), alternates::REVIEW_DATE),
        });

        Self {
            name: FallbackChain::new("name", ValueSource::Text, Some(config.name()), alternates::NAME),
            price: FallbackChain::new("price", ValueSource::Text, config.price(), alternates::PRICE),
            image: FallbackChain::new("image", ValueSource::Attribute(&IMAGE_ATTRIBUTES), config.image(), alternates::IMAGE),
            description: FallbackChain::new("description", ValueSource::Text, config.description(), alternates::DESCRIPTION),
            rating: FallbackChain::new("rating", ValueSource::Text, config.rating(), alternates::RATING),
            review_count: FallbackChain::new("reviewCount", ValueSource::Text, config.review_count(), alternates::REVIEW_COUNT),
            specs: SpecsExtractor::new(config),
            reviews,
        }
    }

    /// Extract every configured field from `source`, fetched from `page_url`
    pub fn extract(&self, source: &str, page_url: &Url) -> DetailExtraction {
        self.extract_from(&PageDocument::parse(source), source, page_url)
    }

    /// Same as `extract` for a page that is already parsed
    pub fn extract_from(&self, doc: &PageDocument, source: &str, page_url: &Url) -> DetailExtraction {
        let Some(name) = self.name.resolve(doc) else {
            debug!("Name chain exhausted for {}", page_url);
            return DetailExtraction::MissingName;
        };

        let image_url = self
            .image
            .resolve(doc)
            .map(|src| resolve_against(page_url, &src))
            .unwrap_or_default();

        let specs = self.specs.extract(doc, source);

        let fields = RawFieldSet {
            name,
            price_text: self.price.resolve_or_empty(doc),
            image_url,
            description: self.description.resolve_or_empty(doc),
            specifications: specs.pairs,
            rating_text: self.rating.resolve_or_empty(doc),
            review_count_text: self.review_count.resolve_or_empty(doc),
            reviews: self.extract_reviews(doc),
        };

        DetailExtraction::Fields {
            fields,
            spec_strategy: specs.strategy,
        }
    }

    fn extract_reviews(&self, doc: &PageDocument) -> Vec<RawReview> {
        let Some(chains) = &self.reviews else {
            return Vec::new();
        };

        let Some(containers) = chains
            .containers
            .iter()
            .map(|selector| doc.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
        else {
            return Vec::new();
        };

        containers
            .iter()
            .map(|container| RawReview {
                author: chains.author.resolve_in(container).unwrap_or_default(),
                text: chains.text.resolve_in(container).unwrap_or_default(),
                rating_text: chains.rating.resolve_in(container).unwrap_or_default(),
                date: chains.date.resolve_in(container).unwrap_or_default(),
            })
            .filter(|review| !review.text.is_empty() || !review.author.is_empty())
            .collect()
    }
}

/// Absolute form of a possibly relative link; unresolvable input is kept as is
pub fn resolve_against(base: &Url, href: &str) -> String {
    base.join(href.trim()).map_or_else(|_| href.trim().to_string(), |url| url.to_string())
}
