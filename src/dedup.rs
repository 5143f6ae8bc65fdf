//! Collapsing a run's records to one per business

use std::collections::HashSet;

use tracing::debug;

use crate::{canonical::Canonicalizer, record::Record};

/// Identity of a record as stored in the catalog
///
/// Derived from the detail URL; a record without one is keyed by a hash of
/// its name and address.
pub fn record_identity(record: &Record) -> String {
    let url = record.detail_url.trim();
    if url.is_empty() {
        let key = fallback_key(record).unwrap_or_default();
        return Canonicalizer::hash_identity(&key);
    }
    Canonicalizer::identity_of(url)
}

/// `lower(name)|lower(address)`, else name alone, else address alone
pub fn fallback_key(record: &Record) -> Option<String> {
    let name = record.name.trim().to_lowercase();
    let address = record.address.trim().to_lowercase();
    match (name.is_empty(), address.is_empty()) {
        (false, false) => Some(format!("{name}|{address}")),
        (false, true) => Some(name),
        (true, false) => Some(address),
        (true, true) => None,
    }
}

/// Records kept after deduplication and how many were dropped
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub records: Vec<Record>,
    pub dropped: usize,
}

pub struct Deduplicator;

impl Deduplicator {
    /// Keep the first record per identity
    ///
    /// When the identity only comes from the hash fallback, the name/address
    /// key is checked as well, so two URLs for the same business without a
    /// recognizable id still collapse.
    pub fn dedupe(records: Vec<Record>) -> DedupOutcome {
        let mut identities = HashSet::new();
        let mut fallbacks = HashSet::new();
        let mut outcome = DedupOutcome::default();

        for record in records {
            let identity = record_identity(&record);
            let fallback = fallback_key(&record);

            let duplicate = identities.contains(&identity)
                || (Canonicalizer::is_hash_identity(&identity)
                    && fallback.as_ref().is_some_and(|key| fallbacks.contains(key)));
            if duplicate {
                debug!(url = %record.detail_url, identity = %identity, "Dropping duplicate record");
                outcome.dropped += 1;
                continue;
            }

            identities.insert(identity);
            if let Some(key) = fallback {
                fallbacks.insert(key);
            }
            outcome.records.push(record);
        }

        outcome
    }
}
