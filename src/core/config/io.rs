use crate::core::config::data::{path_display, McpConfig};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors that can occur when loading or saving the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`McpConfig`].
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The configuration could not be rendered as TOML.
    Serialize { source: toml::ser::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to access config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Serialize { source } => {
                write!(f, "Failed to serialize config: {source}")
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Serialize { source } => Some(source),
        }
    }
}

impl McpConfig {
    /// Loads the file at `config_path`, or the default configuration when
    /// it does not exist.
    pub fn load_from_path(config_path: &Path) -> Result<McpConfig, ConfigError> {
        if !config_path.exists() {
            return Ok(McpConfig::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        McpConfig::from_toml_str(&contents, config_path)
    }

    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<McpConfig, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Writes the configuration atomically, creating parent directories.
    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        let io_error = |source: std::io::Error| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        };
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(io_error)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(io_error)?;

        temp_file.write_all(contents.as_bytes()).map_err(io_error)?;
        temp_file.as_file_mut().sync_all().map_err(io_error)?;
        temp_file
            .persist(config_path)
            .map_err(|err| io_error(err.error))?;
        Ok(())
    }

    /// `<config dir>/switchboard/config.toml`, if the platform has one.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "switchboard", "switchboard")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
