//! Error types for crawling, extraction and catalog persistence
//!
//! Only two conditions abort a run: a lost browser session and a failed
//! catalog write. Everything else is recorded as a [`CrawlError`], logged,
//! and the crawl moves on to the next URL or area.

use std::path::PathBuf;

/// Errors reported by a [`crate::Browser`] implementation
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// Page load failed
    #[error("Failed to navigate to '{url}': {message}")]
    Navigation { url: String, message: String },

    /// Page did not finish loading in time
    #[error("Timed out loading '{url}'")]
    Timeout { url: String },

    /// A scroll/click/script action against the page failed
    #[error("Page action '{action}' failed: {message}")]
    Action { action: String, message: String },

    /// The browser session is gone; nothing more can be crawled
    #[error("Browser session unavailable: {0}")]
    SessionUnavailable(String),
}

impl BrowserError {
    /// Whether this error should abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionUnavailable(_))
    }
}

/// Errors raised while loading or committing the catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Reading, writing or renaming the catalog file failed
    #[error("Catalog I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file could not be (de)serialized
    #[error("Catalog format error on '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur during harvester configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Scroll iteration cap must be greater than 0
    #[error("Scroll iteration cap must be greater than 0, got {0}")]
    InvalidScrollCap(usize),

    /// Stability threshold must be greater than 0 and not above the scroll cap
    #[error("Stable-after threshold must be in 1..={cap}, got {value}")]
    InvalidStableAfter { value: usize, cap: usize },

    /// Pages per area must be greater than 0
    #[error("Page cap must be greater than 0, got {0}")]
    InvalidPageCap(usize),

    /// Ancestor search window must be at least one level deep
    #[error("Ancestor depth must be greater than 0, got {0}")]
    InvalidAncestorDepth(usize),

    /// A pacing range has its lower bound above its upper bound
    #[error("Pacing range for {kind} is inverted: {min_ms}ms > {max_ms}ms")]
    InvertedPacing {
        kind: &'static str,
        min_ms: u64,
        max_ms: u64,
    },

    /// Target city needs at least one spelling variant
    #[error("Target city '{0}' has no spelling variants")]
    EmptyCityVariants(String),

    /// The TOML document could not be parsed
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Fatal errors that stop a harvest run
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The run was cancelled between two pacing waits; nothing was committed
    #[error("Harvest cancelled")]
    Cancelled,
}

/// Non-fatal failure recorded during a crawl, with enough context to act on
#[derive(Debug, Clone)]
pub struct CrawlError {
    /// The URL being processed when the error occurred
    pub url: String,
    /// The area being crawled, if any
    pub area: Option<String>,
    /// The operation that failed
    pub operation: String,
    /// The error message
    pub error: String,
}

impl CrawlError {
    /// Create a new CrawlError with context
    pub fn new(url: impl Into<String>, operation: &str, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            area: None,
            operation: operation.to_string(),
            error: error.to_string(),
        }
    }

    /// Attach the area name this error happened in
    pub fn in_area(mut self, area: &str) -> Self {
        self.area = Some(area.to_string());
        self
    }
}

impl std::fmt::Display for CrawlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.area {
            Some(area) => write!(
                f,
                "[{}] {} failed for {}: {}",
                area, self.operation, self.url, self.error
            ),
            None => write!(f, "{} failed for {}: {}", self.operation, self.url, self.error),
        }
    }
}
