use albumdiff_common::AlbumDiffError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const GOOGLE_TOKEN_FILE: &str = "google_photos.json";
const ONEDRIVE_CREDENTIALS_FILE: &str = "onedrive.json";

/// Tokens are treated as expired this long before their actual expiry
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth token for the Google Photos Library API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl GoogleToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().map_or(false, |t| !t.is_empty())
    }
}

/// On-disk store for service credentials.
///
/// The store directory is chosen by the caller; nothing here reads global
/// state, so tests can point it at a temporary directory.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    base_path: PathBuf,
}

impl CredentialManager {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, AlbumDiffError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn google_token_path(&self) -> PathBuf {
        self.base_path.join(GOOGLE_TOKEN_FILE)
    }

    pub fn onedrive_credentials_path(&self) -> PathBuf {
        self.base_path.join(ONEDRIVE_CREDENTIALS_FILE)
    }

    pub fn save_google_token(&self, token: &GoogleToken) -> Result<(), AlbumDiffError> {
        write_json(&self.google_token_path(), token)
    }

    pub fn load_google_token(&self) -> Result<Option<GoogleToken>, AlbumDiffError> {
        read_json(&self.google_token_path())
    }

    pub fn save_onedrive_credentials(
        &self,
        credentials: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AlbumDiffError> {
        write_json(&self.onedrive_credentials_path(), credentials)
    }

    pub fn load_onedrive_credentials(
        &self,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>, AlbumDiffError> {
        read_json(&self.onedrive_credentials_path())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AlbumDiffError> {
    let data = serde_json::to_string_pretty(value)
        .map_err(|e| AlbumDiffError::Serialization(e.to_string()))?;

    // Atomic replace: write a sibling temp file, then rename over the target
    let temp_file = path.with_extension("json.tmp");
    fs::write(&temp_file, data)?;
    fs::rename(&temp_file, path)?;

    debug!("Saved credentials to {:?}", path);
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, AlbumDiffError> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data).map_err(|e| {
        AlbumDiffError::Serialization(format!("{}: {}", path.display(), e))
    })?;
    Ok(Some(value))
}
