//! URL canonicalization and identity derivation
//!
//! Every detail-page URL goes through [`Canonicalizer::canonicalize`] before it
//! is stored anywhere, so that the in-run candidate set, the run's dedup pass
//! and the persisted catalog all compare the same form.

use url::Url;
use xxhash_rust::xxh32::xxh32;

use crate::source::Source;

/// Path segments of non-detail tabs; a URL is cut at the first one
pub const KNOWN_TABS: &[&str] = &["reviews", "photos", "gallery", "menu", "contacts"];

/// Prefix of identities that come from the hash fallback
pub const HASH_IDENTITY_PREFIX: &str = "hash_";

/// Utility for normalizing detail URLs and deriving identities from them
pub struct Canonicalizer;

impl Canonicalizer {
    /// Normalize a raw href into a comparable absolute URL
    ///
    /// Scheme-relative (`//host/...`) and root-relative (`/...`) hrefs are
    /// expanded against `base_origin`. Anything else must already be an
    /// absolute http(s) URL, otherwise `None` is returned.
    ///
    /// The query string and fragment are dropped, the path is cut at the first
    /// known tab segment (`/reviews`, `/photos`, ...) and trailing slashes are
    /// removed. The result is a fixed point: canonicalizing it again returns
    /// the same string.
    pub fn canonicalize(raw_href: &str, base_origin: &str) -> Option<String> {
        let href = raw_href.trim();
        if href.is_empty() {
            return None;
        }

        let url = if href.starts_with('/') {
            Url::parse(base_origin).ok()?.join(href).ok()?
        } else if has_http_scheme(href) {
            Url::parse(href).ok()?
        } else {
            return None;
        };

        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;

        let segments: Vec<&str> = url.path().split('/').collect();
        let keep = segments
            .iter()
            .position(|segment| KNOWN_TABS.contains(segment))
            .unwrap_or(segments.len());
        let path = segments[..keep].join("/");

        let mut canonical = format!("{}://{}", url.scheme(), host);
        if let Some(port) = url.port() {
            canonical.push_str(&format!(":{port}"));
        }
        canonical.push_str(path.trim_end_matches('/'));
        Some(canonical)
    }

    /// Derive a stable identity key from a URL
    ///
    /// The profile of the source the URL belongs to is tried first, then every
    /// other source in declared order. The first pattern that matches yields
    /// `"<source>_<digits>"`; when none does, the identity is
    /// `"hash_<8 hex digits>"` of a fixed 32-bit xxHash of the URL.
    pub fn derive_identity(url: &str) -> String {
        let detected = Source::detect(url);
        let order = detected
            .into_iter()
            .chain(Source::ALL.into_iter().filter(|source| Some(*source) != detected));

        for source in order {
            for pattern in source.identity_patterns() {
                if let Some(captures) = pattern.captures(url)
                    && let Some(id) = captures.get(1)
                {
                    return format!("{}_{}", source.tag(), id.as_str());
                }
            }
        }

        Self::hash_identity(url)
    }

    /// Identity of a detail URL after canonicalizing it
    ///
    /// Two URLs with the same canonical form always share an identity.
    pub fn identity_of(url: &str) -> String {
        let origin = Source::detect(url)
            .map(|source| source.profile().origin)
            .unwrap_or_default();
        match Self::canonicalize(url, origin) {
            Some(canonical) => Self::derive_identity(&canonical),
            None => Self::derive_identity(url.trim()),
        }
    }

    /// Hash fallback identity
    pub fn hash_identity(url: &str) -> String {
        format!("{HASH_IDENTITY_PREFIX}{:08x}", xxh32(url.as_bytes(), 0))
    }

    /// Whether an identity came from the hash fallback rather than a pattern
    pub fn is_hash_identity(identity: &str) -> bool {
        identity.starts_with(HASH_IDENTITY_PREFIX)
    }
}

fn has_http_scheme(href: &str) -> bool {
    let lower = href.get(..8).unwrap_or(href).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
