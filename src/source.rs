//! Listing sources and their static extraction profiles
//!
//! Each [`Source`] selects exactly one [`SourceProfile`]. A profile bundles
//! everything that differs between sources: which links are detail pages,
//! how identities are read from URLs, which containers scroll, and which
//! selectors and icon glyphs locate the contact fields on a detail page.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A map/listing source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "yandex")]
    Yandex,
    #[serde(rename = "2gis")]
    TwoGis,
}

impl Source {
    /// Every source, in identity-matching order
    pub const ALL: [Source; 2] = [Source::Yandex, Source::TwoGis];

    /// Short tag used in identities and in the persisted catalog
    pub fn tag(self) -> &'static str {
        match self {
            Self::Yandex => "yandex",
            Self::TwoGis => "2gis",
        }
    }

    /// Parse a tag produced by [`Source::tag`]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|source| source.tag() == tag)
    }

    /// The static profile for this source
    pub fn profile(self) -> &'static SourceProfile {
        match self {
            Self::Yandex => &YANDEX,
            Self::TwoGis => &TWOGIS,
        }
    }

    /// Guess the source of a URL from its host
    pub fn detect(url: &str) -> Option<Self> {
        let host = url::Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|source| host_matches(&host, source.profile().own_domains))
    }

    /// Compiled identity patterns; the first capture group is the business id
    pub(crate) fn identity_patterns(self) -> &'static [Regex] {
        match self {
            Self::Yandex => &YANDEX_IDENTITY,
            Self::TwoGis => &TWOGIS_IDENTITY,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `d` attribute prefixes of the SVG icons that sit next to contact fields
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerGlyphs {
    pub address: Option<&'static str>,
    pub phone: Option<&'static str>,
    pub website: Option<&'static str>,
}

/// Everything source-specific the crawler and extractor need
#[derive(Debug)]
pub struct SourceProfile {
    pub source: Source,
    /// Scheme and host used to expand relative hrefs
    pub origin: &'static str,
    /// Substrings that mark an href as a detail page
    pub detail_markers: &'static [&'static str],
    /// Substrings that disqualify a canonical URL
    pub exclusions: &'static [&'static str],
    /// Containers that lazily load more results when scrolled
    pub scroll_containers: &'static [&'static str],
    /// Result item wrapper; when set, only the first detail link per item counts
    pub listing_item: Option<&'static str>,
    /// Sub-container of a listing item searched before the item itself
    pub listing_preferred: Option<&'static str>,
    /// Clicked once after the area page loads to expand the result list
    pub expand_selectors: &'static [&'static str],
    pub name_selectors: &'static [&'static str],
    pub address_selectors: &'static [&'static str],
    pub phone_selectors: &'static [&'static str],
    pub website_selectors: &'static [&'static str],
    pub glyphs: MarkerGlyphs,
    /// The source's own domains, never reported as a business website
    pub own_domains: &'static [&'static str],
    /// (name, url) pairs crawled when no areas are configured
    pub default_areas: &'static [(&'static str, &'static str)],
}

impl SourceProfile {
    /// Whether a raw href carries one of this source's detail markers
    pub fn is_detail_href(&self, href: &str) -> bool {
        self.detail_markers.iter().any(|marker| href.contains(marker))
    }

    /// Whether a URL points at one of this source's own domains
    pub fn is_own_domain(&self, url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| host_matches(&host, self.own_domains))
    }

    /// Default search areas as owned values
    pub fn areas(&self) -> Vec<SearchArea> {
        self.default_areas
            .iter()
            .map(|(name, url)| SearchArea::new(self.source, *name, *url))
            .collect()
    }
}

/// A named starting point for crawling one source's listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArea {
    pub source: Source,
    pub name: String,
    pub url: String,
}

impl SearchArea {
    pub fn new(source: Source, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            url: url.into(),
        }
    }
}

static YANDEX_IDENTITY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"/org/[^/]+/(\d+)", r"businessId=(\d+)", r"/(\d+)/details"])
});

static TWOGIS_IDENTITY: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"/firm/(\d+)"]));

fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("hardcoded identity pattern is valid"))
        .collect()
}

static YANDEX: SourceProfile = SourceProfile {
    source: Source::Yandex,
    origin: "https://yandex.ru",
    detail_markers: &["/org/", "/firm/", "businessId="],
    exclusions: &["/search/", "/page/", "page="],
    scroll_containers: &[
        ".scroll__container",
        ".scroll__container_width_narrow",
        ".search-list-view__list-container",
        ".sidebar-view__panel",
        ".scrollable-container",
    ],
    listing_item: Some("li.search-snippet-view"),
    listing_preferred: Some("span[data-nosnippet]"),
    expand_selectors: &[],
    name_selectors: &[
        "h1.orgpage-header-view__header",
        "h1.business-title-view__title",
        "h1.card-title-view__title",
        "h1[itemprop=\"name\"]",
        ".orgpage-header-view__header",
        ".business-title-view__title",
        ".card-title-view__title",
    ],
    address_selectors: &[
        "[itemprop=\"address\"]",
        ".business-contacts-view__address",
        ".card-address-view__address",
        ".orgpage-address-view__address-text",
        ".business-address-view__address",
        "address",
        ".location__description",
    ],
    phone_selectors: &[".orgpage-phones-view__phone-number"],
    website_selectors: &[
        ".business-urls-view__text",
        ".business-urls-view__link",
        ".card-website-view__link",
        ".orgpage-url-view__url",
        ".website-link",
    ],
    glyphs: MarkerGlyphs {
        address: None,
        phone: None,
        website: None,
    },
    own_domains: &["yandex.ru", "yandex.com", "ya.ru", "yandex.net"],
    default_areas: &[
        (
            "Весь город (общий поиск)",
            concat!(
                "https://yandex.ru/maps/39/rostov-na-donu/search/пиротехника/",
                "?ll=39.720451%2C47.232724&sll=39.720451%2C47.232724&sspn=0.672226%2C0.318267&z=11"
            ),
        ),
        (
            "Центр города детально",
            concat!(
                "https://yandex.ru/maps/39/rostov-na-donu/search/пиротехника/",
                "?ll=39.720451%2C47.232724&sll=39.720451%2C47.232724&sspn=0.336113%2C0.159133&z=12"
            ),
        ),
        (
            "Северные районы",
            concat!(
                "https://yandex.ru/maps/39/rostov-na-donu/search/пиротехника/",
                "?ll=39.720451%2C47.282724&sll=39.720451%2C47.282724&sspn=0.336113%2C0.159133&z=12"
            ),
        ),
        (
            "Южные районы",
            concat!(
                "https://yandex.ru/maps/39/rostov-na-donu/search/пиротехника/",
                "?ll=39.720451%2C47.182724&sll=39.720451%2C47.182724&sspn=0.336113%2C0.159133&z=12"
            ),
        ),
        (
            "Западные районы",
            concat!(
                "https://yandex.ru/maps/39/rostov-na-donu/search/пиротехника/",
                "?ll=39.620451%2C47.232724&sll=39.620451%2C47.232724&sspn=0.336113%2C0.159133&z=12"
            ),
        ),
        (
            "Восточные районы",
            concat!(
                "https://yandex.ru/maps/39/rostov-na-donu/search/пиротехника/",
                "?ll=39.820451%2C47.232724&sll=39.820451%2C47.232724&sspn=0.336113%2C0.159133&z=12"
            ),
        ),
    ],
};

static TWOGIS: SourceProfile = SourceProfile {
    source: Source::TwoGis,
    origin: "https://2gis.ru",
    detail_markers: &["/firm/"],
    exclusions: &["/search/", "tab=", "#", "reviewTab", "photoTab", "/page/", "page="],
    scroll_containers: &[
        ".searchResults__list",
        ".listContainer",
        ".searchResults__container",
        ".scroll__container",
        "[data-scroll]",
    ],
    listing_item: None,
    listing_preferred: None,
    expand_selectors: &[
        ".searchResults",
        ".listContainer",
        ".searchResults__list",
        ".searchResults__container",
        "[data-qa=\"search-results\"]",
        ".searchTab__content",
    ],
    name_selectors: &[],
    address_selectors: &[],
    phone_selectors: &[],
    website_selectors: &[],
    glyphs: MarkerGlyphs {
        address: Some(
            "M5 11v2a6.82 6.82 0 0 1 4.17 1.41C10.75 15.62 11.53 18 11.5 22h1c0-4 .75-6.38 2.33-7.59A6.82 6.82 0 0 1 19 13v-2a7 7 0 0 0-7-7 7 7 0 0 0-7 7z",
        ),
        phone: Some(
            "M14 14l-1.08 1.45a13.61 13.61 0 0 1-4.37-4.37L10 10a18.47 18.47 0 0 0-.95-5.85L9 4H5.06a1 1 0 0 0-1 1.09 16 16 0 0 0 14.85 14.85 1 1 0 0 0 1.09-1V15h-.15A18.47 18.47 0 0 0 14 14z",
        ),
        website: Some("M12 4a8 8 0 1 0 8 8 8 8 0 0 0-8-8zm5 9h-6l1-7h1v5.25l4 .75z"),
    },
    own_domains: &["2gis.ru", "2gis.com"],
    default_areas: &[(
        "Весь город (общий поиск)",
        "https://2gis.ru/rostov-on-don/search/пиротехника",
    )],
};
