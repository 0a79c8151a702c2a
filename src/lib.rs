//! Product Harvester - config-driven multi-site e-commerce product harvesting
//!
//! Listing pages are scanned for product links, detail pages are read through
//! per-field selector fallback chains, and the raw fields are normalized and
//! classified into uniform product records grouped by category.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{HarvestOrchestrator, HarvestReport, ProductClassifier, RunContext, SiteJob};
pub use domain::{CrawlOutcome, Product, ProductCategory, SiteConfig};
pub use infrastructure::{ExtractionEngine, HarvestError, HarvestSettings, Navigator};
