//! Detail-link collection from listing pages

use std::collections::BTreeSet;

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::{canonical::Canonicalizer, dom::DomNode, source::SourceProfile};

/// Extracts canonical detail-page URLs from one snapshot of a listing page
#[derive(Debug, Clone, Copy)]
pub struct LinkCollector {
    profile: &'static SourceProfile,
}

impl LinkCollector {
    pub fn new(profile: &'static SourceProfile) -> Self {
        Self { profile }
    }

    /// Canonical detail URLs visible in `markup`
    ///
    /// Only the current snapshot is considered; merging across scrolls and
    /// pages happens in [`CandidateUrlSet`].
    pub fn collect_from_listing(&self, markup: &str) -> BTreeSet<String> {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        let mut urls = BTreeSet::new();
        let items = self
            .profile
            .listing_item
            .map(|selector| root.select_all(selector))
            .unwrap_or_default();

        if items.is_empty() {
            for anchor in root.select_all("a[href]") {
                if let Some(url) = anchor.attr("href").and_then(|href| self.accept(href)) {
                    urls.insert(url);
                }
            }
        } else {
            // One detail link per result item; the snippet body is searched first
            for item in items {
                if let Some(url) = self.first_in_item(item) {
                    urls.insert(url);
                }
            }
        }

        debug!(source = %self.profile.source, count = urls.len(), "Collected detail links");
        urls
    }

    fn first_in_item(&self, item: ElementRef<'_>) -> Option<String> {
        let preferred = self
            .profile
            .listing_preferred
            .and_then(|selector| item.select_one(selector));

        preferred
            .into_iter()
            .chain(std::iter::once(item))
            .find_map(|container| {
                container
                    .select_all("a[href]")
                    .into_iter()
                    .find_map(|anchor| anchor.attr("href").and_then(|href| self.accept(href)))
            })
    }

    /// Canonicalize a raw href if it points at a detail page
    ///
    /// The href must carry a detail marker and canonicalize. The canonical
    /// form must still carry a marker once the query is gone, so a bare
    /// `?businessId=` on a map page does not pass, and it must not contain
    /// any exclusion substring.
    pub fn accept(&self, href: &str) -> Option<String> {
        if !self.profile.is_detail_href(href) {
            return None;
        }
        let canonical = Canonicalizer::canonicalize(href, self.profile.origin)?;
        if !self.profile.is_detail_href(&canonical) {
            return None;
        }
        if self
            .profile
            .exclusions
            .iter()
            .any(|exclusion| canonical.contains(exclusion))
        {
            return None;
        }
        Some(canonical)
    }
}

/// Canonical detail URLs accumulated while crawling one source
#[derive(Debug, Clone, Default)]
pub struct CandidateUrlSet {
    urls: BTreeSet<String>,
}

impl CandidateUrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a snapshot and return how many URLs were not seen before
    pub fn merge(&mut self, urls: impl IntoIterator<Item = String>) -> usize {
        let before = self.urls.len();
        self.urls.extend(urls);
        self.urls.len() - before
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// URLs in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.urls.iter()
    }

    /// Consume the set into a sorted list
    pub fn into_sorted(self) -> Vec<String> {
        self.urls.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;

    #[test]
    fn test_merge_counts_only_new() {
        let mut set = CandidateUrlSet::new();
        assert_eq!(set.merge(["a".to_string(), "b".to_string()]), 2);
        assert_eq!(set.merge(["b".to_string(), "c".to_string()]), 1);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_yandex_takes_one_link_per_snippet() {
        let html = r#"
            <ul>
              <li class="search-snippet-view">
                <span data-nosnippet><a href="/maps/org/salut/111/">Салют</a></span>
                <a href="/maps/org/salut/111/reviews/">Отзывы</a>
              </li>
              <li class="search-snippet-view">
                <a href="/maps/org/fejerverk/222/">Фейерверк</a>
              </li>
            </ul>"#;
        let urls = LinkCollector::new(Source::Yandex.profile()).collect_from_listing(html);
        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec![
                "https://yandex.ru/maps/org/fejerverk/222",
                "https://yandex.ru/maps/org/salut/111",
            ]
        );
    }
}
