//! Run orchestration: crawl, extract, filter, dedupe, reconcile
//!
//! # Example
//!
//! ```ignore
//! use listing_harvester::{HarvestConfig, Harvester, IncrementalCatalog, Source};
//!
//! let config = HarvestConfig::builder()
//!     .sources([Source::TwoGis])
//!     .page_cap(5)
//!     .build()?;
//! let mut catalog = IncrementalCatalog::open(config.catalog_path())?;
//! let harvester = Harvester::new(config);
//!
//! let report = harvester.run(&mut browser, &mut catalog).await?;
//! println!("{} new, {} updated", report.new_count, report.updated_count);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    browser::Browser,
    catalog::{CatalogEntry, CatalogStats, IncrementalCatalog},
    config::HarvestConfig,
    crawler::{AreaCrawlDriver, CrawlObserver, ObserverRegistry, RunContext, RunStats, StatsTracker},
    dedup::Deduplicator,
    error::{CrawlError, HarvestError},
    extract::FieldExtractor,
    geo::GeoFilter,
    pacing::{JitterPacer, Pacer, Pause},
    record::{Record, Rejection},
    source::Source,
};

/// The three collections handed to report writers, plus run figures
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Entries first seen in the run that produced them
    pub new_entries: Vec<CatalogEntry>,
    /// Records accepted by this run, after deduplication
    pub this_run: Vec<Record>,
    /// Every catalog entry, most recently seen first
    pub all_entries: Vec<CatalogEntry>,
    pub new_count: usize,
    pub updated_count: usize,
    /// Crawl statistics; `None` for a report exported without crawling
    pub stats: Option<RunStats>,
    pub catalog: CatalogStats,
    /// Non-fatal failures encountered during the run
    pub errors: Vec<CrawlError>,
}

/// Runs harvests against a browser session and a catalog
pub struct Harvester {
    config: HarvestConfig,
    pacer: Option<Arc<dyn Pacer>>,
    observers: ObserverRegistry,
    /// Tracker of the current or upcoming run
    stats: Mutex<Arc<StatsTracker>>,
    cancel: CancellationToken,
}

impl Harvester {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            pacer: None,
            observers: ObserverRegistry::new(),
            stats: Mutex::new(Arc::new(StatsTracker::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the default [`JitterPacer`]
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// Register an observer to receive crawl events
    pub fn observe_with(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observers.register(observer);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the run at its next pause
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Get a snapshot of the current run's statistics
    ///
    /// Between runs this is the final snapshot of the last run.
    pub fn stats(&self) -> RunStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).snapshot()
    }

    /// Subscribe to real-time statistics updates
    ///
    /// The receiver follows the current run, or the next one when called
    /// between runs. It closes when that run ends.
    pub fn subscribe_stats(&self) -> watch::Receiver<RunStats> {
        self.run_stats().subscribe()
    }

    /// Tracker for the current run, armed afresh once the previous run closed
    fn run_stats(&self) -> Arc<StatsTracker> {
        let mut current = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_closed() {
            *current = Arc::new(StatsTracker::new());
        }
        current.clone()
    }

    /// Crawl the configured sources, reconcile the result with `catalog`
    /// and commit it
    ///
    /// The browser is stopped when the run ends, successfully or not. On
    /// cancellation or any other error nothing is committed.
    pub async fn run(
        &self,
        browser: &mut dyn Browser,
        catalog: &mut IncrementalCatalog,
    ) -> Result<RunReport, HarvestError> {
        let stats = self.run_stats();
        let result = self.run_inner(browser, catalog, &stats).await;

        if let Err(e) = browser.stop().await {
            warn!(error = %e, "Failed to stop browser");
        }
        stats.close();

        match &result {
            Ok(report) => info!(
                new = report.new_count,
                updated = report.updated_count,
                total = report.catalog.total,
                "Harvest complete"
            ),
            Err(HarvestError::Cancelled) => warn!("Harvest cancelled, catalog left unchanged"),
            Err(e) => error!(error = %e, "Harvest failed"),
        }
        result
    }

    async fn run_inner(
        &self,
        browser: &mut dyn Browser,
        catalog: &mut IncrementalCatalog,
        stats: &StatsTracker,
    ) -> Result<RunReport, HarvestError> {
        let pacer: Arc<dyn Pacer> = match &self.pacer {
            Some(pacer) => pacer.clone(),
            None => Arc::new(JitterPacer::new(
                self.config.pacing.clone(),
                self.cancel.clone(),
            )),
        };
        let geo = GeoFilter::new(self.config.city.clone());
        let mut ctx = RunContext::new();

        let sources = self.config.sources();
        info!(sources = ?sources, "Starting harvest");
        for &source in sources {
            self.crawl_source(browser, source, pacer.as_ref(), &geo, stats, &mut ctx)
                .await?;
        }

        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let outcome = Deduplicator::dedupe(std::mem::take(&mut ctx.records));
        stats.duplicates_dropped(outcome.dropped);
        info!(
            records = outcome.records.len(),
            dropped = outcome.dropped,
            "Deduplicated run records"
        );

        catalog.sweep_mark_unfound();
        let mut new_count = 0;
        let mut updated_count = 0;
        for record in &outcome.records {
            let (_, is_new) = catalog.upsert(record);
            if is_new {
                new_count += 1;
            } else {
                updated_count += 1;
            }
        }
        catalog.commit()?;

        let stats = stats.snapshot();
        self.observers.notify_run_complete(&stats).await;

        let mut report = Self::export(catalog);
        report.this_run = outcome.records;
        report.new_count = new_count;
        report.updated_count = updated_count;
        report.stats = Some(stats);
        report.errors = ctx.errors;
        Ok(report)
    }

    async fn crawl_source(
        &self,
        browser: &mut dyn Browser,
        source: Source,
        pacer: &dyn Pacer,
        geo: &GeoFilter,
        stats: &StatsTracker,
        ctx: &mut RunContext,
    ) -> Result<(), HarvestError> {
        let profile = source.profile();
        let areas = self.config.areas_for(source);
        info!(source = %source, areas = areas.len(), "Crawling source");

        let driver = AreaCrawlDriver::new(profile, &self.config, pacer, stats, &self.observers);
        for (index, area) in areas.iter().enumerate() {
            if index > 0 {
                pacer.pause(Pause::BetweenAreas).await?;
            }
            self.observers.notify_area_started(area).await;
            let outcome = driver.crawl(browser, area, ctx).await?;
            if outcome.failed {
                stats.area_failed();
            } else {
                stats.area_crawled();
            }
            self.observers
                .notify_area_finished(area, outcome.new_urls)
                .await;
        }

        let candidates = std::mem::take(&mut ctx.candidates).into_sorted();
        info!(source = %source, candidates = candidates.len(), "Visiting detail pages");

        let extractor = FieldExtractor::new(profile, self.config.city.clone(), self.config.window);
        for (index, url) in candidates.iter().enumerate() {
            if index > 0 {
                pacer.pause(Pause::BetweenDetails).await?;
            }
            self.visit_detail(browser, source, url, &extractor, geo, pacer, stats, ctx)
                .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn visit_detail(
        &self,
        browser: &mut dyn Browser,
        source: Source,
        url: &str,
        extractor: &FieldExtractor,
        geo: &GeoFilter,
        pacer: &dyn Pacer,
        stats: &StatsTracker,
        ctx: &mut RunContext,
    ) -> Result<(), HarvestError> {
        let first_render = match browser.open(url).await {
            Ok(markup) => markup,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                let failure = CrawlError::new(url, "open_detail", &e);
                stats.navigation_failed();
                self.observers.notify_navigation_failed(&failure).await;
                ctx.record_error(failure);
                return Ok(());
            }
        };
        stats.detail_visited();
        pacer.pause(Pause::AfterDetailOpen).await?;

        let markup = match browser.content().await {
            Ok(markup) => markup,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                debug!(url, error = %e, "Re-reading detail page failed, using first render");
                first_render
            }
        };

        let raw = extractor.extract(&markup);
        let record = match Record::assemble(source, url, raw, Utc::now()) {
            Ok(record) => record,
            Err(rejection) => {
                debug!(url, reason = %rejection, "Rejected detail page");
                stats.invalid_record();
                self.observers.notify_record_rejected(url, rejection).await;
                return Ok(());
            }
        };

        if !geo.is_target_city(&record.address) {
            debug!(url, address = %record.address, "Outside target city");
            stats.geo_rejected();
            self.observers
                .notify_record_rejected(url, Rejection::OutsideTargetCity)
                .await;
            return Ok(());
        }

        debug!(url, name = %record.name, "Accepted record");
        stats.record_accepted(&record);
        self.observers.notify_record_accepted(&record).await;
        ctx.records.push(record);
        Ok(())
    }

    /// Build a report from the catalog alone, without crawling
    pub fn export(catalog: &IncrementalCatalog) -> RunReport {
        let new_entries: Vec<CatalogEntry> = catalog.get_new().into_iter().cloned().collect();
        let found = catalog.get_found();
        let found_new = found.iter().filter(|entry| entry.is_new()).count();
        let this_run: Vec<Record> = found.iter().map(|entry| entry.record.clone()).collect();

        RunReport {
            new_count: found_new,
            updated_count: this_run.len() - found_new,
            new_entries,
            this_run,
            all_entries: catalog.by_last_seen().into_iter().cloned().collect(),
            stats: None,
            catalog: catalog.stats(),
            errors: Vec::new(),
        }
    }
}
