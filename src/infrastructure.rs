//! Infrastructure layer for navigation, page parsing, configuration and logging
//!
//! Everything that touches markup, the network or the process environment
//! lives here; the domain layer only holds plain values.

pub mod config; // Settings, site entries and their loading
pub mod detail_extractor;
pub mod document; // scraper helpers
pub mod extraction_engine; // Per-site list/detail engine
pub mod fallback_chain;
pub mod fixture_navigator; // Canned pages for tests and offline replay
pub mod harvest_error;
pub mod http_navigator;
pub mod listing_extractor;
pub mod logging; // Logging infrastructure
pub mod navigator;
pub mod normalize; // Price and number parsing
pub mod pacing;
pub mod specs_extractor;

// Re-export commonly used items
pub use config::{
    BlockPolicy, ConfigManager, EngineSettings, ExecutionMode, HarvestSettings, HttpSettings, LoggingConfig, SiteEntry,
};
pub use extraction_engine::ExtractionEngine;
pub use fixture_navigator::{FixtureLog, FixtureNavigator, FixturePage};
pub use harvest_error::{HarvestError, HarvestResult, NavigationError};
pub use http_navigator::HttpNavigator;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use navigator::{NavResult, Navigator};
pub use normalize::{parse_first_integer, parse_price, parse_rating};
pub use pacing::{DelayPolicy, FixedDelay, NoDelay, RandomDelay};
