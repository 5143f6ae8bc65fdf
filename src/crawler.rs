//! Area traversal with progress tracking
//!
//! This module provides the per-area crawl driver along with:
//! - **Graceful cancellation**: every pacing wait is a cancellation point
//! - **Observability**: monitor crawl progress through the observer pattern
//! - **Real-time statistics**: counters broadcast over a watch channel
//!
//! # Driver states
//!
//! ```text
//! Start ──► Scrolling ──► Stable ──► Paginating ──► Scrolling ...
//!   │                        │            │
//!   └──────────► Done ◄──────┴────────────┘
//! ```
//!
//! `Scrolling` ends after `stable_after` consecutive iterations that add no
//! new URL, or after `scroll_cap` iterations. `Paginating` looks for a link to
//! the next page number and goes back to `Scrolling` on the new page.
//!
//! # Example
//!
//! ```ignore
//! use listing_harvester::{CrawlObserver, SearchArea};
//!
//! struct LoggingObserver;
//!
//! #[async_trait::async_trait]
//! impl CrawlObserver for LoggingObserver {
//!     async fn on_area_finished(&self, area: &SearchArea, new_urls: usize) {
//!         println!("{}: {new_urls} new links", area.name);
//!     }
//! }
//! ```

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use regex::Regex;
use scraper::Html;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    browser::Browser,
    config::HarvestConfig,
    dom::DomNode,
    error::{BrowserError, CrawlError, HarvestError},
    links::{CandidateUrlSet, LinkCollector},
    pacing::{Pacer, Pause},
    record::{Record, Rejection},
    source::{SearchArea, SourceProfile},
};

/// Observer trait for receiving crawl events
///
/// Every method has a no-op default, so implementors only override what they
/// care about.
#[async_trait::async_trait]
pub trait CrawlObserver: Send + Sync {
    /// Called before the first navigation of an area
    async fn on_area_started(&self, _area: &SearchArea) {}

    /// Called when an area is done, with the number of URLs it added
    async fn on_area_finished(&self, _area: &SearchArea, _new_urls: usize) {}

    /// Called when a record passes validation and the geo filter
    async fn on_record_accepted(&self, _record: &Record) {}

    /// Called when a detail page does not produce a usable record
    async fn on_record_rejected(&self, _url: &str, _reason: Rejection) {}

    /// Called when a page could not be loaded
    async fn on_navigation_failed(&self, _error: &CrawlError) {}

    /// Called once the catalog has been committed
    async fn on_run_complete(&self, _stats: &RunStats) {}
}

/// Registry for managing multiple crawl observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn CrawlObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer to receive crawl events
    pub fn register(&mut self, observer: Arc<dyn CrawlObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub async fn notify_area_started(&self, area: &SearchArea) {
        for observer in &self.observers {
            observer.on_area_started(area).await;
        }
    }

    pub async fn notify_area_finished(&self, area: &SearchArea, new_urls: usize) {
        for observer in &self.observers {
            observer.on_area_finished(area, new_urls).await;
        }
    }

    pub async fn notify_record_accepted(&self, record: &Record) {
        for observer in &self.observers {
            observer.on_record_accepted(record).await;
        }
    }

    pub async fn notify_record_rejected(&self, url: &str, reason: Rejection) {
        for observer in &self.observers {
            observer.on_record_rejected(url, reason).await;
        }
    }

    pub async fn notify_navigation_failed(&self, error: &CrawlError) {
        for observer in &self.observers {
            observer.on_navigation_failed(error).await;
        }
    }

    pub async fn notify_run_complete(&self, stats: &RunStats) {
        for observer in &self.observers {
            observer.on_run_complete(stats).await;
        }
    }
}

/// Statistics collected during a run with timestamps
#[derive(Debug, Clone)]
pub struct RunStats {
    pub areas_crawled: usize,
    pub areas_failed: usize,
    pub links_collected: usize,
    pub detail_pages_visited: usize,
    pub navigation_failures: usize,
    pub invalid_records: usize,
    pub geo_rejected: usize,
    pub duplicates_dropped: usize,
    pub records_accepted: usize,
    pub with_phone: usize,
    pub with_website: usize,
    pub with_hours: usize,
    /// When the run started
    pub start_time: Instant,
    /// When these stats were last updated
    pub last_update: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            areas_crawled: 0,
            areas_failed: 0,
            links_collected: 0,
            detail_pages_visited: 0,
            navigation_failures: 0,
            invalid_records: 0,
            geo_rejected: 0,
            duplicates_dropped: 0,
            records_accepted: 0,
            with_phone: 0,
            with_website: 0,
            with_hours: 0,
            start_time: now,
            last_update: now,
        }
    }

    /// Get elapsed time since the run started
    pub fn elapsed(&self) -> Duration {
        self.last_update.duration_since(self.start_time)
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe statistics tracker with real-time broadcasting
pub struct StatsTracker {
    areas_crawled: AtomicUsize,
    areas_failed: AtomicUsize,
    links_collected: AtomicUsize,
    detail_pages_visited: AtomicUsize,
    navigation_failures: AtomicUsize,
    invalid_records: AtomicUsize,
    geo_rejected: AtomicUsize,
    duplicates_dropped: AtomicUsize,
    records_accepted: AtomicUsize,
    with_phone: AtomicUsize,
    with_website: AtomicUsize,
    with_hours: AtomicUsize,
    start_time: Instant,
    tx: Arc<Mutex<Option<watch::Sender<RunStats>>>>,
    rx: watch::Receiver<RunStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(RunStats::new());
        Self {
            areas_crawled: AtomicUsize::new(0),
            areas_failed: AtomicUsize::new(0),
            links_collected: AtomicUsize::new(0),
            detail_pages_visited: AtomicUsize::new(0),
            navigation_failures: AtomicUsize::new(0),
            invalid_records: AtomicUsize::new(0),
            geo_rejected: AtomicUsize::new(0),
            duplicates_dropped: AtomicUsize::new(0),
            records_accepted: AtomicUsize::new(0),
            with_phone: AtomicUsize::new(0),
            with_website: AtomicUsize::new(0),
            with_hours: AtomicUsize::new(0),
            start_time: Instant::now(),
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Subscribe to statistics updates
    pub fn subscribe(&self) -> watch::Receiver<RunStats> {
        self.rx.clone()
    }

    // Relaxed ordering throughout: counters are informational only

    fn bump(&self, counter: &AtomicUsize, by: usize) {
        if by > 0 {
            counter.fetch_add(by, Ordering::Relaxed);
            self.broadcast();
        }
    }

    pub fn area_crawled(&self) {
        self.bump(&self.areas_crawled, 1);
    }

    pub fn area_failed(&self) {
        self.bump(&self.areas_failed, 1);
    }

    pub fn links_collected(&self, count: usize) {
        self.bump(&self.links_collected, count);
    }

    pub fn detail_visited(&self) {
        self.bump(&self.detail_pages_visited, 1);
    }

    pub fn navigation_failed(&self) {
        self.bump(&self.navigation_failures, 1);
    }

    pub fn invalid_record(&self) {
        self.bump(&self.invalid_records, 1);
    }

    pub fn geo_rejected(&self) {
        self.bump(&self.geo_rejected, 1);
    }

    pub fn duplicates_dropped(&self, count: usize) {
        self.bump(&self.duplicates_dropped, count);
    }

    /// Record an accepted record and which optional fields it carries
    pub fn record_accepted(&self, record: &Record) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
        if !record.phones.is_empty() {
            self.with_phone.fetch_add(1, Ordering::Relaxed);
        }
        if !record.websites.is_empty() {
            self.with_website.fetch_add(1, Ordering::Relaxed);
        }
        if !record.hours.is_empty() {
            self.with_hours.fetch_add(1, Ordering::Relaxed);
        }
        self.broadcast();
    }

    /// Broadcast current statistics to all subscribers
    fn broadcast(&self) {
        // Ignore send errors - if no one is listening, that's fine
        if let Ok(tx_guard) = self.tx.try_lock()
            && let Some(tx) = tx_guard.as_ref()
        {
            let _ = tx.send(self.snapshot());
        }
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> RunStats {
        RunStats {
            areas_crawled: self.areas_crawled.load(Ordering::Relaxed),
            areas_failed: self.areas_failed.load(Ordering::Relaxed),
            links_collected: self.links_collected.load(Ordering::Relaxed),
            detail_pages_visited: self.detail_pages_visited.load(Ordering::Relaxed),
            navigation_failures: self.navigation_failures.load(Ordering::Relaxed),
            invalid_records: self.invalid_records.load(Ordering::Relaxed),
            geo_rejected: self.geo_rejected.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            with_phone: self.with_phone.load(Ordering::Relaxed),
            with_website: self.with_website.load(Ordering::Relaxed),
            with_hours: self.with_hours.load(Ordering::Relaxed),
            start_time: self.start_time,
            last_update: Instant::now(),
        }
    }

    /// Close the statistics sender to signal completion to subscribers
    pub fn close(&self) {
        if let Ok(mut tx_guard) = self.tx.try_lock() {
            *tx_guard = None;
        }
    }

    /// Whether [`close`](Self::close) has ended this tracker's broadcasts
    pub fn is_closed(&self) -> bool {
        self.tx.try_lock().is_ok_and(|tx_guard| tx_guard.is_none())
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by one run and passed to every stage
///
/// Nothing here outlives the run, so two runs never share URLs or records.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Detail URLs of the source currently being crawled
    pub candidates: CandidateUrlSet,
    /// Records accepted so far, across sources
    pub records: Vec<Record>,
    /// Non-fatal failures, in the order they happened
    pub errors: Vec<CrawlError>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep a non-fatal failure
    pub fn record_error(&mut self, error: CrawlError) {
        warn!(
            url = %error.url,
            area = error.area.as_deref().unwrap_or("-"),
            operation = %error.operation,
            "{}",
            error.error
        );
        self.errors.push(error);
    }
}

/// States of [`AreaCrawlDriver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Start,
    Scrolling,
    Stable,
    Paginating,
    Done,
}

/// What one area contributed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaOutcome {
    /// URLs added to the candidate set by this area
    pub new_urls: usize,
    /// Listing pages visited, including the first
    pub pages: usize,
    /// Scroll iterations across all pages
    pub scroll_iterations: usize,
    /// The first navigation failed and nothing was collected
    pub failed: bool,
}

/// Walks one search area until its listing stops producing new links
pub struct AreaCrawlDriver<'a> {
    profile: &'static SourceProfile,
    collector: LinkCollector,
    config: &'a HarvestConfig,
    pacer: &'a dyn Pacer,
    stats: &'a StatsTracker,
    observers: &'a ObserverRegistry,
}

impl<'a> AreaCrawlDriver<'a> {
    pub fn new(
        profile: &'static SourceProfile,
        config: &'a HarvestConfig,
        pacer: &'a dyn Pacer,
        stats: &'a StatsTracker,
        observers: &'a ObserverRegistry,
    ) -> Self {
        Self {
            profile,
            collector: LinkCollector::new(profile),
            config,
            pacer,
            stats,
            observers,
        }
    }

    /// Crawl one area, merging its detail URLs into `ctx.candidates`
    ///
    /// Navigation and scroll failures end or shorten the area without
    /// failing it. Only cancellation and a lost browser session are returned
    /// as errors.
    pub async fn crawl(
        &self,
        browser: &mut dyn Browser,
        area: &SearchArea,
        ctx: &mut RunContext,
    ) -> Result<AreaOutcome, HarvestError> {
        let before = ctx.candidates.len();
        let mut outcome = AreaOutcome::default();
        let mut page = 1;
        let mut visited_pages = HashSet::from([page]);
        let mut state = DriverState::Start;

        info!(source = %area.source, area = %area.name, "Starting area");

        while state != DriverState::Done {
            debug!(area = %area.name, ?state, page, "Driver state");
            state = match state {
                DriverState::Start => {
                    let markup = match browser.open(&area.url).await {
                        Ok(markup) => markup,
                        Err(error) => {
                            self.navigation_failed(error, &area.url, area, ctx).await?;
                            outcome.failed = true;
                            break;
                        }
                    };
                    outcome.pages = 1;
                    self.pacer.pause(Pause::AfterNavigation).await?;
                    self.expand_results(browser, &markup).await?;
                    DriverState::Scrolling
                }
                DriverState::Scrolling => {
                    outcome.scroll_iterations += self.scroll_until_stable(browser, area, ctx).await?;
                    DriverState::Stable
                }
                DriverState::Stable if page < self.config.page_cap => DriverState::Paginating,
                DriverState::Stable => DriverState::Done,
                DriverState::Paginating => {
                    let next = page + 1;
                    let markup = match browser.content().await {
                        Ok(markup) => markup,
                        Err(error) => {
                            self.page_error(error, &area.url, "read_listing", area, ctx)?;
                            break;
                        }
                    };
                    match next_page_link(&markup, self.profile.origin, next) {
                        Some(href) if visited_pages.insert(next) => {
                            info!(area = %area.name, page = next, "Following pagination");
                            match browser.open(&href).await {
                                Ok(_) => {
                                    page = next;
                                    outcome.pages += 1;
                                    self.pacer.pause(Pause::AfterNavigation).await?;
                                    DriverState::Scrolling
                                }
                                Err(error) => {
                                    self.navigation_failed(error, &href, area, ctx).await?;
                                    DriverState::Done
                                }
                            }
                        }
                        _ => DriverState::Done,
                    }
                }
                DriverState::Done => DriverState::Done,
            };
        }

        outcome.new_urls = ctx.candidates.len() - before;
        info!(
            source = %area.source,
            area = %area.name,
            new_urls = outcome.new_urls,
            pages = outcome.pages,
            total = ctx.candidates.len(),
            "Finished area"
        );
        Ok(outcome)
    }

    /// Scroll, wait and collect until `stable_after` rounds add nothing
    ///
    /// Returns the number of scroll iterations performed.
    async fn scroll_until_stable(
        &self,
        browser: &mut dyn Browser,
        area: &SearchArea,
        ctx: &mut RunContext,
    ) -> Result<usize, HarvestError> {
        self.collect(browser, area, ctx).await?;

        let mut iterations = 0;
        let mut stable_rounds = 0;
        while iterations < self.config.scroll_cap && stable_rounds < self.config.stable_after {
            iterations += 1;

            for container in self.profile.scroll_containers {
                if let Err(error) = browser.scroll(container).await {
                    if error.is_fatal() {
                        return Err(error.into());
                    }
                    debug!(container, error = %error, "Scroll failed");
                }
            }
            self.pacer.pause(Pause::AfterScroll).await?;

            let added = self.collect(browser, area, ctx).await?;
            if added == 0 {
                stable_rounds += 1;
            } else {
                stable_rounds = 0;
            }
            debug!(
                area = %area.name,
                iteration = iterations,
                added,
                stable_rounds,
                total = ctx.candidates.len(),
                "Scroll iteration"
            );
        }

        Ok(iterations)
    }

    /// Collect links from the current markup; a failed read counts as no new URLs
    async fn collect(
        &self,
        browser: &mut dyn Browser,
        area: &SearchArea,
        ctx: &mut RunContext,
    ) -> Result<usize, HarvestError> {
        let markup = match browser.content().await {
            Ok(markup) => markup,
            Err(error) => {
                self.page_error(error, &area.url, "read_listing", area, ctx)?;
                return Ok(0);
            }
        };
        let added = ctx.candidates.merge(self.collector.collect_from_listing(&markup));
        self.stats.links_collected(added);
        Ok(added)
    }

    /// Click the first result-list expander present on the page
    async fn expand_results(&self, browser: &mut dyn Browser, markup: &str) -> Result<(), HarvestError> {
        let Some(selector) = first_present(markup, self.profile.expand_selectors) else {
            return Ok(());
        };
        match browser.click(selector).await {
            Ok(()) => self.pacer.pause(Pause::AfterClick).await,
            Err(error) if error.is_fatal() => Err(error.into()),
            Err(error) => {
                debug!(selector, error = %error, "Expand click failed");
                Ok(())
            }
        }
    }

    async fn navigation_failed(
        &self,
        error: BrowserError,
        url: &str,
        area: &SearchArea,
        ctx: &mut RunContext,
    ) -> Result<(), HarvestError> {
        if error.is_fatal() {
            return Err(error.into());
        }
        let failure = CrawlError::new(url, "navigate", &error).in_area(&area.name);
        self.stats.navigation_failed();
        self.observers.notify_navigation_failed(&failure).await;
        ctx.record_error(failure);
        Ok(())
    }

    fn page_error(
        &self,
        error: BrowserError,
        url: &str,
        operation: &str,
        area: &SearchArea,
        ctx: &mut RunContext,
    ) -> Result<(), HarvestError> {
        if error.is_fatal() {
            return Err(error.into());
        }
        ctx.record_error(CrawlError::new(url, operation, &error).in_area(&area.name));
        Ok(())
    }
}

/// First selector that matches something in `markup`
fn first_present(markup: &str, selectors: &[&'static str]) -> Option<&'static str> {
    if selectors.is_empty() {
        return None;
    }
    let document = Html::parse_document(markup);
    let root = document.root_element();
    selectors
        .iter()
        .copied()
        .find(|selector| root.select_one(selector).is_some())
}

/// Absolute URL of a link to page `next`, if the listing has one
pub fn next_page_link(markup: &str, origin: &str, next: usize) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?:/page/|[?&]page=){next}(?:\D|$)")).ok()?;
    let document = Html::parse_document(markup);
    let href = document
        .root_element()
        .select_all("a[href]")
        .into_iter()
        .filter_map(|anchor| anchor.attr("href"))
        .find(|href| pattern.is_match(href))?
        .to_string();

    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href)
    } else {
        Url::parse(origin).ok()?.join(&href).ok().map(String::from)
    }
}
