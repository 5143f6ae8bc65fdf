//! Scripted browser shared by the crawl tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use listing_harvester::{Browser, BrowserError};

/// Serves canned markup per URL
///
/// `open` returns the first snapshot of a page. Each `content` call returns
/// the next snapshot, repeating the last one once the script runs out, which
/// is how a lazily loading listing looks after enough scrolls.
#[derive(Debug, Default)]
pub struct ScriptedBrowser {
    pages: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    session_lost_at: Option<String>,
    current: Option<String>,
    reads: usize,
    pub opened: Vec<String>,
    pub scrolls: usize,
    pub clicks: Vec<String>,
    pub stopped: bool,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page<S: Into<String>>(mut self, url: &str, snapshots: impl IntoIterator<Item = S>) -> Self {
        self.pages
            .insert(url.to_string(), snapshots.into_iter().map(Into::into).collect());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn losing_session_at(mut self, url: &str) -> Self {
        self.session_lost_at = Some(url.to_string());
        self
    }

    fn snapshot(&self) -> String {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .and_then(|snapshots| snapshots.get(self.reads.min(snapshots.len().saturating_sub(1))))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Browser for ScriptedBrowser {
    async fn open(&mut self, url: &str) -> Result<String, BrowserError> {
        self.opened.push(url.to_string());
        if self.session_lost_at.as_deref() == Some(url) {
            return Err(BrowserError::SessionUnavailable("chrome not reachable".into()));
        }
        if self.failing.contains(url) || !self.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".into(),
            });
        }
        self.current = Some(url.to_string());
        self.reads = 0;
        Ok(self.snapshot())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        let markup = self.snapshot();
        self.reads += 1;
        Ok(markup)
    }

    async fn scroll(&mut self, _selector: &str) -> Result<(), BrowserError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.clicks.push(selector.to_string());
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), BrowserError> {
        self.stopped = true;
        Ok(())
    }
}

/// 2GIS listing markup holding links to the given firm ids
pub fn twogis_listing(firms: impl IntoIterator<Item = u32>, extra: &str) -> String {
    let links: String = firms
        .into_iter()
        .map(|id| format!(r#"<a href="/rostov-on-don/firm/{id}">Фирма {id}</a>"#))
        .collect();
    format!(r#"<html><body><div class="searchResults">{links}</div>{extra}</body></html>"#)
}

/// Yandex listing markup with one result item per href
pub fn yandex_listing(hrefs: &[&str]) -> String {
    let items: String = hrefs
        .iter()
        .map(|href| format!(r#"<li class="search-snippet-view"><a href="{href}">Организация</a></li>"#))
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

/// Yandex organization page
pub fn yandex_org(name: &str, address: &str) -> String {
    format!(
        r#"<html><body>
        <h1 class="orgpage-header-view__header">{name}</h1>
        <div class="business-contacts-view__address">{address}</div>
        <span class="orgpage-phones-view__phone-number">+7 (863) 111-22-33</span>
        </body></html>"#
    )
}

/// Route crate logs to the test output; set `RUST_LOG` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
