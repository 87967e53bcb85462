use crate::Snapshot;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One-to-one association between OneDrive and Google Photos album names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumPairing {
    forward: BTreeMap<String, String>,
    claimed: BTreeSet<String>,
}

impl AlbumPairing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair. Returns `false` and leaves the pairing untouched if
    /// either name is already part of a pair.
    pub fn insert(&mut self, onedrive_name: impl Into<String>, google_name: impl Into<String>) -> bool {
        let onedrive_name = onedrive_name.into();
        let google_name = google_name.into();
        if self.forward.contains_key(&onedrive_name) || self.claimed.contains(&google_name) {
            return false;
        }
        self.claimed.insert(google_name.clone());
        self.forward.insert(onedrive_name, google_name);
        true
    }

    /// Google Photos name paired with the given OneDrive name
    pub fn get(&self, onedrive_name: &str) -> Option<&str> {
        self.forward.get(onedrive_name).map(String::as_str)
    }

    pub fn contains_onedrive(&self, name: &str) -> bool {
        self.forward.contains_key(name)
    }

    pub fn contains_google(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    /// Pairs as `(onedrive_name, google_name)`, ordered by OneDrive name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Result of reconciling a OneDrive snapshot against a Google Photos snapshot.
///
/// Built once by the comparator and read-only afterwards. An album that is
/// missing from Google Photos is by construction an orphan in OneDrive, so the
/// `orphan_in_*` accessors expose the same lists as `missing_in_*`.
#[derive(Debug, Clone)]
pub struct LibraryComparison {
    onedrive_albums: Arc<Snapshot>,
    google_albums: Arc<Snapshot>,
    pairing: AlbumPairing,
    missing_in_google: Vec<String>,
    missing_in_onedrive: Vec<String>,
    count_mismatches: BTreeMap<String, (u64, u64)>,
    comparison_timestamp: DateTime<Local>,
}

impl LibraryComparison {
    pub fn new(
        onedrive_albums: Arc<Snapshot>,
        google_albums: Arc<Snapshot>,
        pairing: AlbumPairing,
        missing_in_google: Vec<String>,
        missing_in_onedrive: Vec<String>,
        count_mismatches: BTreeMap<String, (u64, u64)>,
    ) -> Self {
        Self {
            onedrive_albums,
            google_albums,
            pairing,
            missing_in_google,
            missing_in_onedrive,
            count_mismatches,
            comparison_timestamp: Local::now(),
        }
    }

    pub fn onedrive_albums(&self) -> &Snapshot {
        &self.onedrive_albums
    }

    pub fn google_albums(&self) -> &Snapshot {
        &self.google_albums
    }

    pub fn pairing(&self) -> &AlbumPairing {
        &self.pairing
    }

    /// OneDrive albums with no Google Photos counterpart, sorted
    pub fn missing_in_google(&self) -> &[String] {
        &self.missing_in_google
    }

    /// Google Photos albums with no OneDrive counterpart, sorted
    pub fn missing_in_onedrive(&self) -> &[String] {
        &self.missing_in_onedrive
    }

    pub fn orphan_in_onedrive(&self) -> &[String] {
        &self.missing_in_google
    }

    pub fn orphan_in_google(&self) -> &[String] {
        &self.missing_in_onedrive
    }

    /// Matched albums whose item counts differ, keyed by OneDrive name.
    /// Values are `(onedrive_count, google_count)`.
    pub fn count_mismatches(&self) -> &BTreeMap<String, (u64, u64)> {
        &self.count_mismatches
    }

    pub fn comparison_timestamp(&self) -> DateTime<Local> {
        self.comparison_timestamp
    }

    pub fn is_in_sync(&self) -> bool {
        self.missing_in_google.is_empty()
            && self.missing_in_onedrive.is_empty()
            && self.count_mismatches.is_empty()
    }

    pub fn summary(&self) -> ComparisonSummary {
        ComparisonSummary {
            onedrive_album_count: self.onedrive_albums.len(),
            google_album_count: self.google_albums.len(),
            matched_albums: self.pairing.len(),
            missing_in_onedrive: self.missing_in_onedrive.len(),
            missing_in_google: self.missing_in_google.len(),
            orphan_in_onedrive: self.orphan_in_onedrive().len(),
            orphan_in_google: self.orphan_in_google().len(),
            count_mismatches: self.count_mismatches.len(),
            comparison_timestamp: self.comparison_timestamp.to_rfc3339(),
        }
    }
}

/// Counts derived from a [`LibraryComparison`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub onedrive_album_count: usize,
    pub google_album_count: usize,
    pub matched_albums: usize,
    pub missing_in_onedrive: usize,
    pub missing_in_google: usize,
    pub orphan_in_onedrive: usize,
    pub orphan_in_google: usize,
    pub count_mismatches: usize,
    pub comparison_timestamp: String,
}
