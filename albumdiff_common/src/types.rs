use crate::AlbumDiffError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Default similarity threshold for matching album names
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Which library an album or photo came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlbumSource {
    /// Folder tree synced to disk by OneDrive
    #[serde(rename = "onedrive")]
    OneDrive,
    /// Google Photos cloud library
    #[serde(rename = "google_photos")]
    GooglePhotos,
}

impl AlbumSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumSource::OneDrive => "onedrive",
            AlbumSource::GooglePhotos => "google_photos",
        }
    }

    /// Human readable name used in console output
    pub fn display_name(&self) -> &'static str {
        match self {
            AlbumSource::OneDrive => "OneDrive",
            AlbumSource::GooglePhotos => "Google Photos",
        }
    }
}

impl fmt::Display for AlbumSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single photo or video inside an album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoItem {
    pub id: String,
    pub name: String,
    pub source: AlbumSource,
    pub album_id: String,
    pub album_name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// An album (or top-level folder) in one of the photo libraries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Source-namespaced identifier, e.g. `onedrive-Vacation` or `google-AF1Qip...`
    pub id: String,
    /// Display name, used as the matching key
    pub name: String,
    pub source: AlbumSource,
    #[serde(default)]
    pub item_count: u64,
    /// Individual items, when the source enumerated them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PhotoItem>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Album {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: AlbumSource,
        item_count: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            item_count,
            items: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Point-in-time view of one library, keyed by album name.
///
/// Names are unique: inserting an album whose name is already present
/// replaces the earlier record. Iteration is in ascending name order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    source: AlbumSource,
    albums: BTreeMap<String, Album>,
}

impl Snapshot {
    pub fn new(source: AlbumSource) -> Self {
        Self {
            source,
            albums: BTreeMap::new(),
        }
    }

    pub fn from_albums<I>(source: AlbumSource, albums: I) -> Self
    where
        I: IntoIterator<Item = Album>,
    {
        let mut snapshot = Self::new(source);
        for album in albums {
            snapshot.insert(album);
        }
        snapshot
    }

    /// Insert an album, returning the record it replaced (if any)
    pub fn insert(&mut self, album: Album) -> Option<Album> {
        self.albums.insert(album.name.clone(), album)
    }

    pub fn source(&self) -> AlbumSource {
        self.source
    }

    pub fn get(&self, name: &str) -> Option<&Album> {
        self.albums.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.albums.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.albums.keys().map(String::as_str)
    }

    pub fn albums(&self) -> impl Iterator<Item = &Album> {
        self.albums.values()
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Sum of item counts across all albums
    pub fn total_items(&self) -> u64 {
        self.albums.values().map(|a| a.item_count).sum()
    }

    pub fn into_albums(self) -> Vec<Album> {
        self.albums.into_values().collect()
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Minimum (exclusive) name similarity for two albums to match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Default OneDrive photos folder
    #[serde(default)]
    pub onedrive_path: Option<PathBuf>,

    /// Path to the Google OAuth client_secret.json
    #[serde(default)]
    pub google_client_secret: Option<PathBuf>,

    /// Where cached credentials are stored
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,

    /// Extensions counted as media in addition to the built-in set (e.g. "raw")
    #[serde(default)]
    pub extra_media_extensions: Vec<String>,

    /// Gitignore-style patterns for album folders to skip (e.g. ".thumbnails/")
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

impl AppConfig {
    /// Reject thresholds outside `[0, 1]` (NaN included)
    pub fn check_similarity_threshold(threshold: f64) -> Result<f64, AlbumDiffError> {
        if (0.0..=1.0).contains(&threshold) {
            Ok(threshold)
        } else {
            Err(AlbumDiffError::Config(format!(
                "Similarity threshold must be between 0 and 1, got {}",
                threshold
            )))
        }
    }

    pub fn validate(&self) -> Result<(), AlbumDiffError> {
        Self::check_similarity_threshold(self.similarity_threshold)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            onedrive_path: None,
            google_client_secret: None,
            credentials_dir: None,
            extra_media_extensions: Vec::new(),
            ignore_patterns: Vec::new(),
            portable_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_later_duplicate_overwrites() {
        let snapshot = Snapshot::from_albums(
            AlbumSource::GooglePhotos,
            vec![
                Album::new("google-1", "Trip", AlbumSource::GooglePhotos, 3),
                Album::new("google-2", "Trip", AlbumSource::GooglePhotos, 7),
            ],
        );

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("Trip").unwrap().id, "google-2");
        assert_eq!(snapshot.get("Trip").unwrap().item_count, 7);
    }

    #[test]
    fn test_snapshot_names_sorted() {
        let snapshot = Snapshot::from_albums(
            AlbumSource::OneDrive,
            vec![
                Album::new("onedrive-b", "b", AlbumSource::OneDrive, 1),
                Album::new("onedrive-B", "B", AlbumSource::OneDrive, 2),
                Album::new("onedrive-a", "a", AlbumSource::OneDrive, 3),
            ],
        );

        let names: Vec<&str> = snapshot.names().collect();
        assert_eq!(names, vec!["B", "a", "b"]);
        assert_eq!(snapshot.total_items(), 6);
    }

    #[test]
    fn test_check_similarity_threshold() {
        assert_eq!(AppConfig::check_similarity_threshold(0.0).unwrap(), 0.0);
        assert_eq!(AppConfig::check_similarity_threshold(1.0).unwrap(), 1.0);
        assert!(AppConfig::check_similarity_threshold(-0.1).is_err());
        assert!(AppConfig::check_similarity_threshold(1.01).is_err());
        assert!(matches!(
            AppConfig::check_similarity_threshold(f64::NAN),
            Err(AlbumDiffError::Config(_))
        ));
    }

    #[test]
    fn test_validate_config() {
        assert!(AppConfig::default().validate().is_ok());

        let config = AppConfig {
            similarity_threshold: 2.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_album_source_serde_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            source: AlbumSource,
        }

        let text = toml::to_string(&Wrapper {
            source: AlbumSource::GooglePhotos,
        })
        .unwrap();
        assert_eq!(text.trim(), "source = \"google_photos\"");

        let parsed: Wrapper = toml::from_str("source = \"onedrive\"").unwrap();
        assert_eq!(parsed.source, AlbumSource::OneDrive);
        assert!(toml::from_str::<Wrapper>("source = \"dropbox\"").is_err());
    }

    #[test]
    fn test_app_config_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert!(config.ignore_patterns.is_empty());
        assert!(config.onedrive_path.is_none());
    }
}
