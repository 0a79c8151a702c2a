//! Declarative description of one target site
//!
//! A `SiteConfig` is built from a flat key→string map (usually a per-site config
//! file) and never changes afterwards. Keys are matched loosely so that
//! `productContainer`, `product_container` and `product-container` all resolve
//! to the same selector.

use std::collections::HashMap;

use scraper::Selector;
use serde::Serialize;
use url::Url;

use crate::domain::product::ProductCategory;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// Immutable per-site selectors and target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    url: String,
    base_url: Option<String>,
    target_category: ProductCategory,
    product_container: String,
    name: String,
    price: Option<String>,
    image: Option<String>,
    detail_url: Option<String>,
    description: Option<String>,
    specs_table: Option<String>,
    specs_row: Option<String>,
    specs_label: Option<String>,
    specs_value: Option<String>,
    alt_specs_row: Option<String>,
    rating: Option<String>,
    review_count: Option<String>,
    review_container: Option<String>,
    review_author: Option<String>,
    review_text: Option<String>,
    review_rating: Option<String>,
    review_date: Option<String>,
}

/// `productContainer` / `product_container` / `product-container` → `productcontainer`
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl SiteConfig {
    /// Build from a flat key/value source without validating it
    pub fn from_map<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let map: HashMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (normalize_key(k.as_ref()), v.as_ref().trim().to_string()))
            .collect();

        let required = |key: &str| map.get(key).cloned().unwrap_or_default();
        let optional = |key: &str| map.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            url: required("url"),
            base_url: optional("baseurl"),
            target_category: optional("targetcategory")
                .map(|c| ProductCategory::from_label(&c))
                .unwrap_or_default(),
            product_container: required("productcontainer"),
            name: required("name"),
            price: optional("price"),
            image: optional("image"),
            detail_url: optional("detailurl"),
            description: optional("description"),
            specs_table: optional("specstable"),
            specs_row: optional("specsrow"),
            specs_label: optional("specslabel"),
            specs_value: optional("specsvalue"),
            alt_specs_row: optional("altspecsrow"),
            rating: optional("rating"),
            review_count: optional("reviewcount"),
            review_container: optional("reviewcontainer"),
            review_author: optional("reviewauthor"),
            review_text: optional("reviewtext"),
            review_rating: optional("reviewrating"),
            review_date: optional("reviewdate"),
        }
    }

    /// Build and validate in one step
    pub fn load<K, V, I>(entries: I) -> HarvestResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let config = Self::from_map(entries);
        config.validate()?;
        Ok(config)
    }

    /// Fails with a `Config` error when a required key is missing or unusable
    pub fn validate(&self) -> HarvestResult<()> {
        if self.url.is_empty() {
            return Err(HarvestError::config("url", "required key is missing or empty"));
        }
        self.parsed_url()?;

        for (field, selector) in [("productContainer", &self.product_container), ("name", &self.name)] {
            if selector.is_empty() {
                return Err(HarvestError::config(field, "required selector is missing or empty"));
            }
            Selector::parse(selector)
                .map_err(|e| HarvestError::config(field, format!("invalid selector '{selector}': {e}")))?;
        }

        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|e| HarvestError::config("baseUrl", e.to_string()))?;
        }
        Ok(())
    }

    pub fn parsed_url(&self) -> HarvestResult<Url> {
        let url = Url::parse(&self.url).map_err(|e| HarvestError::config("url", e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(HarvestError::config("url", format!("unsupported scheme '{other}'"))),
        }
    }

    /// Origin used to resolve relative listing links
    pub fn base_origin(&self) -> HarvestResult<Url> {
        if let Some(base) = &self.base_url {
            return Url::parse(base).map_err(|e| HarvestError::config("baseUrl", e.to_string()));
        }
        let url = self.parsed_url()?;
        let origin = url.origin().ascii_serialization();
        Url::parse(&origin).map_err(|e| HarvestError::config("url", e.to_string()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn target_category(&self) -> ProductCategory {
        self.target_category
    }

    pub fn product_container(&self) -> &str {
        &self.product_container
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Option<&str> {
        self.price.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn detail_url(&self) -> Option<&str> {
        self.detail_url.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn specs_table(&self) -> Option<&str> {
        self.specs_table.as_deref()
    }

    pub fn specs_row(&self) -> Option<&str> {
        self.specs_row.as_deref()
    }

    pub fn specs_label(&self) -> Option<&str> {
        self.specs_label.as_deref()
    }

    pub fn specs_value(&self) -> Option<&str> {
        self.specs_value.as_deref()
    }

    pub fn alt_specs_row(&self) -> Option<&str> {
        self.alt_specs_row.as_deref()
    }

    pub fn rating(&self) -> Option<&str> {
        self.rating.as_deref()
    }

    pub fn review_count(&self) -> Option<&str> {
        self.review_count.as_deref()
    }

    pub fn review_container(&self) -> Option<&str> {
        self.review_container.as_deref()
    }

    pub fn review_author(&self) -> Option<&str> {
        self.review_author.as_deref()
    }

    pub fn review_text(&self) -> Option<&str> {
        self.review_text.as_deref()
    }

    pub fn review_rating(&self) -> Option<&str> {
        self.review_rating.as_deref()
    }

    pub fn review_date(&self) -> Option<&str> {
        self.review_date.as_deref()
    }

    /// True when any per-review selector was configured
    pub fn has_review_selectors(&self) -> bool {
        self.review_container.is_some()
            || self.review_author.is_some()
            || self.review_text.is_some()
            || self.review_rating.is_some()
            || self.review_date.is_some()
    }
}
