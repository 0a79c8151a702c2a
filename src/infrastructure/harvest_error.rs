//! Error taxonomy for the harvesting pipeline
//!
//! `HarvestError` is what leaves an extraction step; `NavigationError` is what a
//! `Navigator` implementation reports. Only `Config` and `ResourceFatal` are
//! allowed to propagate past the engine, everything else is absorbed into a
//! per-product outcome or a documented default.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarvestError {
    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("Fetch timed out after {timeout_ms}ms: {url}")]
    FetchTimeout { url: String, timeout_ms: u64 },

    #[error("Field '{field}' not found after {attempted} selectors")]
    FieldNotFound { field: String, attempted: usize },

    #[error("Site blocked the request at {url} (marker: {marker})")]
    BlockedSite { url: String, marker: String },

    #[error("Could not parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation resource failed: {message}")]
    ResourceFatal { message: String },
}

impl HarvestError {
    pub fn config(field: &str, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn resource_fatal(message: impl Into<String>) -> Self {
        Self::ResourceFatal {
            message: message.into(),
        }
    }

    /// Whether the error can be absorbed into a per-URL or per-field outcome
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config { .. } | Self::ResourceFatal { .. } => false,
            Self::FetchTimeout { .. }
            | Self::FieldNotFound { .. }
            | Self::BlockedSite { .. }
            | Self::Parse { .. }
            | Self::Navigation { .. } => true,
        }
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;

/// Failures reported by a navigation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    #[error("navigation timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no page loaded")]
    NoPage,

    #[error("{0} is not supported by this navigator")]
    Unsupported(&'static str),

    #[error("navigator already closed")]
    Closed,

    #[error("navigator failed: {0}")]
    Fatal(String),
}

impl NavigationError {
    /// Backend failures that leave the navigator unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::Fatal(_))
    }

    /// Status codes that anti-bot layers answer with
    pub fn is_block_status(&self) -> bool {
        matches!(self, Self::Http { status: 403 | 429 })
    }

    /// Lift a backend failure into the harvest taxonomy for a given URL
    pub fn into_harvest_error(self, url: &str, timeout_ms: u64) -> HarvestError {
        match self {
            Self::Timeout => HarvestError::FetchTimeout {
                url: url.to_string(),
                timeout_ms,
            },
            Self::Http { status } if matches!(status, 403 | 429) => HarvestError::BlockedSite {
                url: url.to_string(),
                marker: format!("HTTP {status}"),
            },
            Self::Closed | Self::Fatal(_) => HarvestError::resource_fatal(self.to_string()),
            other => HarvestError::Navigation {
                url: url.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_and_resource_errors_are_fatal() {
        assert!(!HarvestError::config("url", "missing").is_recoverable());
        assert!(!HarvestError::resource_fatal("browser crashed").is_recoverable());
        assert!(
            HarvestError::FetchTimeout {
                url: "https://shop.example/p/1".into(),
                timeout_ms: 100
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_navigation_error_mapping() {
        let url = "https://shop.example/p/1";
        assert!(matches!(
            NavigationError::Timeout.into_harvest_error(url, 500),
            HarvestError::FetchTimeout { timeout_ms: 500, .. }
        ));
        assert!(matches!(
            NavigationError::Http { status: 429 }.into_harvest_error(url, 500),
            HarvestError::BlockedSite { .. }
        ));
        assert!(matches!(
            NavigationError::Http { status: 500 }.into_harvest_error(url, 500),
            HarvestError::Navigation { .. }
        ));
        assert!(matches!(
            NavigationError::Fatal("gone".into()).into_harvest_error(url, 500),
            HarvestError::ResourceFatal { .. }
        ));
    }
}
