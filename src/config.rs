//! Harvester configuration
//!
//! Settings come either from [`HarvestConfig::builder`] or from a TOML
//! document via [`HarvestConfig::from_toml_str`]. Both paths end in the same
//! validation.
//!
//! ```toml
//! catalog_path = "data/database.json"
//! sources = ["yandex", "2gis"]
//!
//! [crawl]
//! scroll_cap = 30
//! stable_after = 3
//! page_cap = 20
//!
//! [extraction]
//! ancestor_depth = 5
//! ancestor_nodes = 200
//!
//! [pacing]
//! after_navigation = { min_ms = 4000, max_ms = 6000 }
//!
//! [city]
//! name = "Ростов-на-Дону"
//! variants = ["ростов-на-дону", "г. ростов"]
//!
//! [[areas]]
//! source = "2gis"
//! name = "Центр"
//! url = "https://2gis.ru/rostov-on-don/search/пиротехника"
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    dom::AncestorWindow,
    error::ConfigError,
    geo::TargetCity,
    pacing::PacingConfig,
    source::{SearchArea, Source},
};

// Configuration constants
const DEFAULT_SCROLL_CAP: usize = 30;
const DEFAULT_STABLE_AFTER: usize = 3;
const DEFAULT_PAGE_CAP: usize = 20;
const DEFAULT_CATALOG_PATH: &str = "data/database.json";

/// Validated configuration for a harvest run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub(crate) scroll_cap: usize,
    pub(crate) stable_after: usize,
    pub(crate) page_cap: usize,
    pub(crate) window: AncestorWindow,
    pub(crate) pacing: PacingConfig,
    pub(crate) city: TargetCity,
    pub(crate) catalog_path: PathBuf,
    pub(crate) sources: Vec<Source>,
    pub(crate) areas: BTreeMap<Source, Vec<SearchArea>>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            scroll_cap: DEFAULT_SCROLL_CAP,
            stable_after: DEFAULT_STABLE_AFTER,
            page_cap: DEFAULT_PAGE_CAP,
            window: AncestorWindow::default(),
            pacing: PacingConfig::default(),
            city: TargetCity::default(),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            sources: Source::ALL.to_vec(),
            areas: BTreeMap::new(),
        }
    }
}

impl HarvestConfig {
    /// Create a builder starting from the defaults
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(document)?;
        file.into_builder().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scroll_cap == 0 {
            return Err(ConfigError::InvalidScrollCap(0));
        }
        if self.stable_after == 0 || self.stable_after > self.scroll_cap {
            return Err(ConfigError::InvalidStableAfter {
                value: self.stable_after,
                cap: self.scroll_cap,
            });
        }
        if self.page_cap == 0 {
            return Err(ConfigError::InvalidPageCap(0));
        }
        if self.window.max_depth == 0 {
            return Err(ConfigError::InvalidAncestorDepth(0));
        }
        if self.city.variants.is_empty() {
            return Err(ConfigError::EmptyCityVariants(self.city.name.clone()));
        }
        self.pacing.validate()
    }

    pub fn scroll_cap(&self) -> usize {
        self.scroll_cap
    }

    pub fn stable_after(&self) -> usize {
        self.stable_after
    }

    pub fn page_cap(&self) -> usize {
        self.page_cap
    }

    pub fn window(&self) -> AncestorWindow {
        self.window
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    pub fn city(&self) -> &TargetCity {
        &self.city
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Sources crawled by a run, in order
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Configured areas for `source`, or the profile defaults
    pub fn areas_for(&self, source: Source) -> Vec<SearchArea> {
        match self.areas.get(&source) {
            Some(areas) if !areas.is_empty() => areas.clone(),
            _ => source.profile().areas(),
        }
    }
}

/// Builder for configuring a harvest run
#[derive(Debug, Default)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    /// Set the maximum scroll iterations per page (default: 30)
    pub fn scroll_cap(mut self, cap: usize) -> Self {
        self.config.scroll_cap = cap;
        self
    }

    /// Set how many consecutive empty scrolls end a page (default: 3)
    pub fn stable_after(mut self, rounds: usize) -> Self {
        self.config.stable_after = rounds;
        self
    }

    /// Set the maximum pages visited per area (default: 20)
    pub fn page_cap(mut self, cap: usize) -> Self {
        self.config.page_cap = cap;
        self
    }

    /// Set the marker proximity search bounds (default: 5 levels, 200 nodes)
    pub fn ancestor_window(mut self, max_depth: usize, max_nodes: usize) -> Self {
        self.config.window = AncestorWindow::new(max_depth, max_nodes);
        self
    }

    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.config.pacing = pacing;
        self
    }

    pub fn target_city(mut self, city: TargetCity) -> Self {
        self.config.city = city;
        self
    }

    /// Set where the catalog is stored (default: `data/database.json`)
    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalog_path = path.into();
        self
    }

    /// Restrict the run to these sources
    pub fn sources(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.config.sources = sources.into_iter().collect();
        self
    }

    /// Add an area; once any area is added for a source, its defaults are not used
    pub fn area(mut self, area: SearchArea) -> Self {
        self.config.areas.entry(area.source).or_default().push(area);
        self
    }

    /// Build the configuration with the configured settings
    pub fn build(self) -> Result<HarvestConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    catalog_path: Option<PathBuf>,
    sources: Option<Vec<Source>>,
    crawl: CrawlSection,
    extraction: ExtractionSection,
    pacing: Option<PacingConfig>,
    city: Option<TargetCity>,
    areas: Vec<SearchArea>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrawlSection {
    scroll_cap: Option<usize>,
    stable_after: Option<usize>,
    page_cap: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractionSection {
    ancestor_depth: Option<usize>,
    ancestor_nodes: Option<usize>,
}

impl ConfigFile {
    fn into_builder(self) -> HarvestConfigBuilder {
        let mut builder = HarvestConfig::builder();
        if let Some(path) = self.catalog_path {
            builder = builder.catalog_path(path);
        }
        if let Some(sources) = self.sources {
            builder = builder.sources(sources);
        }
        if let Some(cap) = self.crawl.scroll_cap {
            builder = builder.scroll_cap(cap);
        }
        if let Some(rounds) = self.crawl.stable_after {
            builder = builder.stable_after(rounds);
        }
        if let Some(cap) = self.crawl.page_cap {
            builder = builder.page_cap(cap);
        }

        let defaults = AncestorWindow::default();
        builder = builder.ancestor_window(
            self.extraction.ancestor_depth.unwrap_or(defaults.max_depth),
            self.extraction.ancestor_nodes.unwrap_or(defaults.max_nodes),
        );

        if let Some(pacing) = self.pacing {
            builder = builder.pacing(pacing);
        }
        if let Some(city) = self.city {
            builder = builder.target_city(TargetCity::new(city.name, city.variants));
        }
        for area in self.areas {
            builder = builder.area(area);
        }
        builder
    }
}
