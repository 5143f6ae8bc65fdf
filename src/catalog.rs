//! Persistent catalog reconciled across runs
//!
//! Each run follows the same three steps:
//!
//! 1. [`IncrementalCatalog::sweep_mark_unfound`] marks every entry as not seen
//!    and fixes the run timestamp
//! 2. [`IncrementalCatalog::upsert`] is called once per accepted record
//! 3. [`IncrementalCatalog::commit`] writes the whole catalog atomically
//!
//! Entries are never removed. An entry missing from a run simply keeps
//! `seenInLastRun == false` until it is found again.

use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{dedup::record_identity, error::CatalogError, record::Record, source::Source};

/// A persisted record with freshness metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    #[serde(flatten)]
    pub record: Record,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_in_last_run: bool,
}

impl CatalogEntry {
    /// First seen in the most recent run that touched it
    pub fn is_new(&self) -> bool {
        self.first_seen_at == self.last_seen_at
    }

    fn merge(&mut self, record: &Record) {
        let current = &mut self.record;
        current.source = record.source;
        merge_text(&mut current.name, &record.name);
        merge_text(&mut current.address, &record.address);
        merge_text(&mut current.hours, &record.hours);
        merge_text(&mut current.detail_url, &record.detail_url);
        if !record.phones.is_empty() {
            current.phones = record.phones.clone();
        }
        if !record.websites.is_empty() {
            current.websites = record.websites.clone();
        }
        current.collected_at = record.collected_at;
    }
}

fn merge_text(current: &mut String, incoming: &str) {
    if !incoming.trim().is_empty() {
        *current = incoming.to_string();
    }
}

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    last_update: Option<DateTime<Utc>>,
    total_count: usize,
    entries: Vec<CatalogEntry>,
}

/// Read-only summary of the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub total: usize,
    pub by_source: BTreeMap<Source, usize>,
    /// Entries seen in the last run
    pub found: usize,
    /// Entries not seen in the last run
    pub missing: usize,
    pub new_entries: usize,
    pub last_update: Option<DateTime<Utc>>,
}

/// Catalog of every business ever collected
#[derive(Debug, Default)]
pub struct IncrementalCatalog {
    path: Option<PathBuf>,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    last_update: Option<DateTime<Utc>>,
    run_at: Option<DateTime<Utc>>,
}

impl IncrementalCatalog {
    /// Load the catalog stored at `path`
    ///
    /// A missing file gives an empty catalog. A file that exists but cannot
    /// be parsed is an error, so a damaged catalog is never overwritten.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let mut catalog = Self {
            path: Some(path.clone()),
            ..Self::default()
        };

        if !path.exists() {
            info!(path = %path.display(), "No catalog file yet, starting empty");
            return Ok(catalog);
        }

        let contents = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        let file: CatalogFile =
            serde_json::from_str(&contents).map_err(|source| CatalogError::Format {
                path: path.clone(),
                source,
            })?;

        catalog.last_update = file.last_update;
        for entry in file.entries {
            catalog.insert(entry);
        }
        info!(path = %path.display(), entries = catalog.entries.len(), "Loaded catalog");
        Ok(catalog)
    }

    /// A catalog that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn insert(&mut self, entry: CatalogEntry) {
        match self.index.get(&entry.id) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.index.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Start a run now
    pub fn sweep_mark_unfound(&mut self) {
        self.sweep_mark_unfound_at(Utc::now());
    }

    /// Start a run at `run_at`: every entry becomes not-seen
    ///
    /// The timestamp (truncated to whole seconds) is used for every upsert
    /// until the next sweep. It always lands after every timestamp already in
    /// the catalog, so an entry re-seen by a run within the same second as
    /// the previous one is not mistaken for new.
    pub fn sweep_mark_unfound_at(&mut self, run_at: DateTime<Utc>) {
        for entry in &mut self.entries {
            entry.seen_in_last_run = false;
        }

        let requested = run_at.trunc_subsecs(0);
        let run_at = match self.latest_timestamp() {
            Some(latest) if latest >= requested => {
                let bumped = latest.trunc_subsecs(0) + TimeDelta::seconds(1);
                debug!(%requested, %bumped, "Run timestamp moved past the catalog's latest");
                bumped
            }
            _ => requested,
        };
        self.run_at = Some(run_at);
        debug!(entries = self.entries.len(), "Marked all catalog entries unfound");
    }

    fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .map(|entry| entry.last_seen_at)
            .chain(self.last_update)
            .max()
    }

    /// Timestamp of the current run, if a sweep happened
    pub fn run_at(&self) -> Option<DateTime<Utc>> {
        self.run_at
    }

    /// Insert or refresh the entry for a record
    ///
    /// Returns the entry and whether it was created by this call.
    pub fn upsert(&mut self, record: &Record) -> (&CatalogEntry, bool) {
        let now = self.run_at.unwrap_or_else(|| Utc::now().trunc_subsecs(0));
        let id = record_identity(record);

        match self.index.get(&id) {
            Some(&position) => {
                let entry = &mut self.entries[position];
                entry.merge(record);
                entry.last_seen_at = now;
                entry.seen_in_last_run = true;
                (&self.entries[position], false)
            }
            None => {
                let position = self.entries.len();
                self.index.insert(id.clone(), position);
                self.entries.push(CatalogEntry {
                    id,
                    record: record.clone(),
                    first_seen_at: now,
                    last_seen_at: now,
                    seen_in_last_run: true,
                });
                (&self.entries[position], true)
            }
        }
    }

    /// Persist every entry and the update time
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed over it, so a failed write leaves the previous file intact.
    pub fn commit(&mut self) -> Result<(), CatalogError> {
        // Without a run in between, the stored update time is kept
        let last_update = self
            .run_at
            .or(self.last_update)
            .unwrap_or_else(|| Utc::now().trunc_subsecs(0));

        let Some(path) = self.path.clone() else {
            self.last_update = Some(last_update);
            return Ok(());
        };

        let document = CatalogFile {
            last_update: Some(last_update),
            total_count: self.entries.len(),
            entries: self.entries.clone(),
        };
        let encoded = serde_json::to_string_pretty(&document).map_err(|source| {
            CatalogError::Format {
                path: path.clone(),
                source,
            }
        })?;

        let io_error = |source: std::io::Error| CatalogError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let temp_path = temp_path_for(&path);
        if let Err(source) = write_then_rename(&temp_path, &path, encoded.as_bytes()) {
            if temp_path.exists()
                && let Err(cleanup) = fs::remove_file(&temp_path)
            {
                warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Could not remove temporary catalog file"
                );
            }
            return Err(io_error(source));
        }

        self.last_update = Some(last_update);
        info!(path = %path.display(), entries = self.entries.len(), "Committed catalog");
        Ok(())
    }

    // ========== QUERIES ==========

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Entries whose first and last sighting coincide
    pub fn get_new(&self) -> Vec<&CatalogEntry> {
        self.entries.iter().filter(|entry| entry.is_new()).collect()
    }

    /// Entries not seen in the last run
    pub fn get_missing(&self) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.seen_in_last_run)
            .collect()
    }

    /// Entries seen in the last run
    pub fn get_found(&self) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.seen_in_last_run)
            .collect()
    }

    /// Every entry, most recently seen first
    pub fn by_last_seen(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<&CatalogEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        entries
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total: self.entries.len(),
            last_update: self.last_update,
            ..CatalogStats::default()
        };
        for entry in &self.entries {
            *stats.by_source.entry(entry.record.source).or_default() += 1;
            if entry.seen_in_last_run {
                stats.found += 1;
            } else {
                stats.missing += 1;
            }
            if entry.is_new() {
                stats.new_entries += 1;
            }
        }
        stats
    }
}

fn write_then_rename(temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, name: &str) -> Record {
        Record {
            source: Source::TwoGis,
            name: name.into(),
            address: "г. Ростов-на-Дону, ул. Ленина, д. 5".into(),
            phones: vec!["+78631234567".into()],
            websites: vec![],
            hours: String::new(),
            detail_url: url.into(),
            collected_at: Utc::now().trunc_subsecs(0),
        }
    }

    #[test]
    fn test_empty_incoming_fields_keep_existing_values() {
        let mut catalog = IncrementalCatalog::in_memory();
        catalog.sweep_mark_unfound();
        catalog.upsert(&record("https://2gis.ru/firm/1", "Салют"));

        let mut update = record("https://2gis.ru/firm/1", "");
        update.phones.clear();
        update.hours = "Ежедневно 9:00-21:00".into();
        let (entry, is_new) = catalog.upsert(&update);

        assert!(!is_new);
        assert_eq!(entry.record.name, "Салют");
        assert_eq!(entry.record.phones, vec!["+78631234567"]);
        assert_eq!(entry.record.hours, "Ежедневно 9:00-21:00");
    }

    #[test]
    fn test_temp_path_sits_next_to_target() {
        let temp = temp_path_for(Path::new("data/database.json"));
        assert_eq!(temp, PathBuf::from("data/database.json.tmp"));
    }
}
