//! Per-product harvest results and the detail-page state machine

use std::fmt;

use serde::Serialize;

use crate::domain::product::{Product, RawFieldSet};

/// Why a detail URL produced no product without being an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every selector of the name chain missed
    MissingName,
    /// An earlier block made the orchestrator give up on the site
    SiteAbandoned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => f.write_str("no-name"),
            Self::SiteAbandoned => f.write_str("site abandoned after block"),
        }
    }
}

/// Why a detail URL failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureReason {
    Blocked { marker: String },
    Timeout,
    Navigation { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked { .. } => f.write_str("blocked"),
            Self::Timeout => f.write_str("timeout"),
            Self::Navigation { message } => write!(f, "navigation: {message}"),
        }
    }
}

/// Result of extracting one detail page, before classification
#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Extracted(RawFieldSet),
    Skipped(SkipReason),
    Failed(FailureReason),
}

/// Result for one product URL of a harvest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrawlOutcome {
    Success(Product),
    Skipped { url: String, reason: SkipReason },
    Failed { url: String, reason: FailureReason },
}

impl CrawlOutcome {
    pub fn product(&self) -> Option<&Product> {
        match self {
            Self::Success(product) => Some(product),
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Success(product) => &product.product_url,
            Self::Skipped { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Failed { reason: FailureReason::Blocked { .. }, .. })
    }
}

/// Lifecycle of one detail URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailState {
    Queued,
    Navigated,
    ExtractingFields,
    Built,
    Skipped,
    Failed,
}

impl DetailState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Built | Self::Skipped | Self::Failed)
    }

    /// Forward-only transitions; terminal states accept nothing
    pub fn can_transition_to(self, next: Self) -> bool {
        use DetailState::{Built, ExtractingFields, Failed, Navigated, Queued, Skipped};
        matches!(
            (self, next),
            (Queued, Navigated | Failed)
                | (Navigated, ExtractingFields | Failed)
                | (ExtractingFields, Built | Skipped | Failed)
        )
    }
}
