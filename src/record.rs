//! Business listing records and their validation

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::source::Source;

/// Most phone numbers kept per record
pub const MAX_PHONES: usize = 3;
/// Most websites kept per record
pub const MAX_WEBSITES: usize = 2;
/// Longest opening-hours text kept, in characters
pub const MAX_HOURS_CHARS: usize = 150;

/// Fields pulled from one detail page, before validation
///
/// Every field is independent: an empty value only means that no strategy
/// found anything for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub name: String,
    pub address: String,
    pub phones: Vec<String>,
    pub websites: Vec<String>,
    pub hours: String,
}

/// One business listing collected during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "sourceTag")]
    pub source: Source,
    pub name: String,
    pub address: String,
    #[serde(rename = "phone")]
    pub phones: Vec<String>,
    #[serde(rename = "website")]
    pub websites: Vec<String>,
    #[serde(default)]
    pub hours: String,
    pub detail_url: String,
    pub collected_at: DateTime<Utc>,
}

/// Why a candidate record did not make it into the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Neither a name nor an address was found
    InvalidRecord,
    /// The address is outside the target city (or missing)
    OutsideTargetCity,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord => f.write_str("no name and no address"),
            Self::OutsideTargetCity => f.write_str("outside target city"),
        }
    }
}

impl Record {
    /// Build a record from extracted fields
    ///
    /// A missing name falls back to the first comma-separated segment of the
    /// address. A record with neither is rejected.
    pub fn assemble(
        source: Source,
        detail_url: impl Into<String>,
        raw: RawFields,
        collected_at: DateTime<Utc>,
    ) -> Result<Self, Rejection> {
        let address = raw.address.trim().to_string();
        let mut name = raw.name.trim().to_string();
        if name.is_empty() {
            name = address
                .split(',')
                .next()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
        }

        if name.is_empty() && address.is_empty() {
            return Err(Rejection::InvalidRecord);
        }

        let mut phones = raw.phones;
        phones.truncate(MAX_PHONES);
        let mut websites = raw.websites;
        websites.truncate(MAX_WEBSITES);

        Ok(Self {
            source,
            name,
            address,
            phones,
            websites,
            hours: raw.hours.trim().chars().take(MAX_HOURS_CHARS).collect(),
            detail_url: detail_url.into(),
            collected_at: collected_at.trunc_subsecs(0),
        })
    }

    /// Whether the record carries a name or an address
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() || !self.address.trim().is_empty()
    }
}
