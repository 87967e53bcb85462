use crate::{AlbumDiffError, AppConfig};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "albumdiff.toml";
const CREDENTIALS_DIR_NAME: &str = "credentials";
const PORTABLE_CREDENTIALS_DIR_NAME: &str = "albumdiff_credentials";

/// Where `albumdiff.toml` lives.
///
/// A portable config sits next to the executable and keeps credentials
/// beside it; a user config lives in the platform config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    User(PathBuf),
    Portable(PathBuf),
}

impl ConfigLocation {
    /// Pick the portable file when asked for or already present, else the user file
    pub fn resolve(prefer_portable: bool) -> Result<Self, AlbumDiffError> {
        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)));

        match beside_exe {
            Some(path) if prefer_portable || path.exists() => Ok(Self::Portable(path)),
            _ => Ok(Self::User(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::User(path) | Self::Portable(path) => path,
        }
    }

    pub fn is_portable(&self) -> bool {
        matches!(self, Self::Portable(_))
    }

    /// Credential store used when the config does not name one
    pub fn credentials_dir(&self) -> Result<PathBuf, AlbumDiffError> {
        match self {
            Self::Portable(path) => {
                let base = match path.parent() {
                    Some(dir) => dir.to_path_buf(),
                    None => std::env::current_dir()?,
                };
                Ok(base.join(PORTABLE_CREDENTIALS_DIR_NAME))
            }
            Self::User(_) => Ok(project_dirs()?.config_dir().join(CREDENTIALS_DIR_NAME)),
        }
    }

    /// Read and validate the config, falling back to defaults when the file is absent
    pub fn load(self) -> Result<LoadedConfig, AlbumDiffError> {
        let exists = self.path().exists();

        let mut config: AppConfig = if exists {
            let data = fs::read_to_string(self.path())?;
            toml::from_str(&data).map_err(|e| AlbumDiffError::Serialization(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.validate()?;
        config.portable_mode = self.is_portable();

        Ok(LoadedConfig {
            config,
            location: self,
            exists,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub location: ConfigLocation,
    /// Whether the file was on disk when loaded
    pub exists: bool,
}

impl LoadedConfig {
    pub fn path(&self) -> &Path {
        self.location.path()
    }

    pub fn is_portable(&self) -> bool {
        self.location.is_portable()
    }

    /// The configured credential store, or the default for this location
    pub fn credentials_dir(&self) -> Result<PathBuf, AlbumDiffError> {
        match &self.config.credentials_dir {
            Some(dir) => Ok(dir.clone()),
            None => self.location.credentials_dir(),
        }
    }

    pub fn save(&self) -> Result<(), AlbumDiffError> {
        save_config(self.path(), &self.config)
    }
}

pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig, AlbumDiffError> {
    ConfigLocation::resolve(prefer_portable)?.load()
}

/// Load the config, writing the defaults out on first use
pub fn ensure_config(prefer_portable: bool) -> Result<LoadedConfig, AlbumDiffError> {
    let loaded = load_config(prefer_portable)?;
    if !loaded.exists {
        loaded.save()?;
    }
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), AlbumDiffError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| AlbumDiffError::Serialization(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

fn project_dirs() -> Result<ProjectDirs, AlbumDiffError> {
    ProjectDirs::from("", "aecs4u", "albumdiff")
        .ok_or_else(|| AlbumDiffError::Config("Unable to determine config directory".to_string()))
}
