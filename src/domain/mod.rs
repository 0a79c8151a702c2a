//! Domain module - harvested product records, site descriptions and outcomes
//!
//! Pure value types with no I/O of their own.

pub mod outcome;
pub mod product;
pub mod site_config;

// Re-export commonly used items
pub use outcome::{CrawlOutcome, DetailOutcome, DetailState, FailureReason, SkipReason};
pub use product::{CategoryData, CategoryValue, Product, ProductCategory, RawFieldSet, RawReview, Review};
pub use site_config::SiteConfig;
