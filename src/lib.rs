//! Crawl business listings from map sources, extract contact fields from
//! rendered detail pages, and reconcile them with a catalog kept across runs.

// Core modules
mod browser;
mod canonical;
mod catalog;
mod config;
pub mod crawler;
mod dedup;
pub mod dom;
mod error;
pub mod extract;
mod geo;
mod harvest;
mod links;
mod pacing;
mod record;
mod source;

// Public exports
pub use browser::Browser;
#[cfg(feature = "webdriver")]
pub use browser::WebDriverBrowser;
pub use canonical::{Canonicalizer, HASH_IDENTITY_PREFIX, KNOWN_TABS};
pub use catalog::{CatalogEntry, CatalogStats, IncrementalCatalog};
pub use config::{HarvestConfig, HarvestConfigBuilder};
pub use crawler::{
    AreaCrawlDriver, AreaOutcome, CrawlObserver, DriverState, ObserverRegistry, RunContext,
    RunStats, StatsTracker,
};
pub use dedup::{DedupOutcome, Deduplicator, fallback_key, record_identity};
pub use dom::{AncestorWindow, DomNode};
pub use error::{BrowserError, CatalogError, ConfigError, CrawlError, HarvestError};
pub use extract::FieldExtractor;
pub use geo::{GeoFilter, TargetCity};
pub use harvest::{Harvester, RunReport};
pub use links::{CandidateUrlSet, LinkCollector};
pub use pacing::{DelayRange, JitterPacer, Pacer, PacingConfig, Pause};
pub use record::{MAX_HOURS_CHARS, MAX_PHONES, MAX_WEBSITES, RawFields, Record, Rejection};
pub use source::{MarkerGlyphs, SearchArea, Source, SourceProfile};
