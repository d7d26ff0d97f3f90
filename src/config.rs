//! Optional TOML configuration with per-field defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::directory::Backend;
use crate::error::{InspectError, Result};

/// Application configuration loaded from ~/.config/inspect-fds/config.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Where process names, parents and children come from.
    #[serde(default)]
    pub backend: Backend,
    /// Mount point of procfs.
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            proc_root: default_proc_root(),
        }
    }
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub color: ColorMode,
}

/// When to color pipe labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color only when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Applies this mode to owo-colors' global override.
    pub fn apply(self) {
        match self {
            Self::Auto => owo_colors::unset_override(),
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has one.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("inspect-fds").join("config.toml"))
    }

    /// Loads the config from [`Config::path`]. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_optional(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads `path`, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| InspectError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn load_optional(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(InspectError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| InspectError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
