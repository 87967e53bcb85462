use albumdiff_common::{AlbumDiffError, Album, AlbumSource, AppConfig, PhotoItem, Snapshot};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions (lowercase, without the dot) counted as photos or videos
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "heic", "mp4", "mov", "mkv",
];

/// Builds a snapshot from a OneDrive photos folder.
///
/// Every immediate subdirectory of the base path is an album; its items are
/// the media files found anywhere below it. Symlinked album folders and
/// media files are followed unless disabled with
/// [`with_follow_symlinks`](Self::with_follow_symlinks).
pub struct OneDriveScanner {
    base_path: PathBuf,
    extensions: HashSet<String>,
    ignore: Option<Gitignore>,
    follow_symlinks: bool,
}

impl OneDriveScanner {
    pub fn new(base_path: impl Into<PathBuf>, config: &AppConfig) -> Result<Self, AlbumDiffError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            return Err(AlbumDiffError::Path(format!(
                "OneDrive path does not exist: {}",
                base_path.display()
            )));
        }

        let extensions = MEDIA_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .chain(
                config
                    .extra_media_extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_lowercase()),
            )
            .collect();

        Ok(Self {
            ignore: Self::build_ignore(&config.ignore_patterns),
            base_path,
            extensions,
            follow_symlinks: true,
        })
    }

    pub fn with_follow_symlinks(mut self, enabled: bool) -> Self {
        self.follow_symlinks = enabled;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn build_ignore(patterns: &[String]) -> Option<Gitignore> {
        if patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                debug!("Failed to add ignore pattern '{}': {}", pattern, err);
            }
        }

        match builder.build() {
            Ok(ignore) => Some(ignore),
            Err(e) => {
                debug!("Failed to build album ignore list: {}", e);
                None
            }
        }
    }

    /// Whether a file name has a recognised media extension (case-insensitive)
    pub fn is_media_file(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }

    fn is_ignored(&self, album_name: &str) -> bool {
        self.ignore
            .as_ref()
            .map_or(false, |ignore| ignore.matched(album_name, true).is_ignore())
    }

    /// Scan the folder tree into a snapshot
    pub fn scan(&self) -> Result<Snapshot, AlbumDiffError> {
        let mut snapshot = Snapshot::new(AlbumSource::OneDrive);

        if !self.base_path.is_dir() {
            return Ok(snapshot);
        }

        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            AlbumDiffError::Scan(format!("Cannot read {}: {}", self.base_path.display(), e))
        })?;

        for entry in entries {
            let entry = entry?;
            let is_dir = if self.follow_symlinks {
                entry.path().is_dir()
            } else {
                entry.file_type()?.is_dir()
            };
            if !is_dir {
                continue;
            }

            let album_name = entry.file_name().to_string_lossy().into_owned();
            if self.is_ignored(&album_name) {
                debug!("Skipping ignored album folder '{}'", album_name);
                continue;
            }

            let album = self.scan_album(&entry.path(), album_name)?;
            debug!("Album '{}' has {} items", album.name, album.item_count);
            snapshot.insert(album);
        }

        debug!("Scanned {} albums from {:?}", snapshot.len(), self.base_path);
        Ok(snapshot)
    }

    fn scan_album(&self, album_path: &Path, album_name: String) -> Result<Album, AlbumDiffError> {
        let album_id = format!("onedrive-{}", album_name);
        let mut items = Vec::new();

        let walker = WalkDir::new(album_path)
            .follow_links(self.follow_symlinks)
            .skip_hidden(false)
            .sort(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in '{}': {}", album_name, e);
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();
            let is_file = file_type.is_file()
                || (self.follow_symlinks && file_type.is_symlink() && path.is_file());
            if !is_file {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !self.is_media_file(&file_name) {
                continue;
            }

            // fs::metadata follows links, so symlinked media report the target size
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping {:?}: {}", path, e);
                    continue;
                }
            };

            items.push(PhotoItem {
                id: path.to_string_lossy().into_owned(),
                name: file_name,
                source: AlbumSource::OneDrive,
                album_id: album_id.clone(),
                album_name: album_name.clone(),
                created_at: None,
                size_bytes: Some(metadata.len()),
                mime_type: None,
            });
        }

        let mut album = Album::new(album_id, album_name, AlbumSource::OneDrive, items.len() as u64);
        album.items = items;
        Ok(album)
    }
}
