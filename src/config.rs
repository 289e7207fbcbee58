// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for Arborist's optional user configuration file to
//! simplify the process of serialization and deserialization. The file lives
//! at `$XDG_CONFIG_HOME/arborist/config.toml`. A missing file is equivalent to
//! an empty one.
//!
//! # General Layout
//!
//! ```toml
//! [settings]
//! ask_threshold = 10485760
//! default_link_type = "symlink"
//! remove_copies = true
//!
//! [patterns]
//! link = ["*.secret"]
//! skip = ["*.bak"]
//! ```
//!
//! Extra patterns only ever extend the built-in rule lists of the
//! [`classify`](crate::classify) module. They never replace them.

use crate::{classify::ASK_THRESHOLD_BYTES, link::LinkType, path::config_dir};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Arborist configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArboristConfig {
    /// General settings.
    pub settings: Settings,

    /// Extra classification patterns.
    pub patterns: ExtraPatterns,
}

impl ArboristConfig {
    /// Default location of configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoConfigDir`] if configuration directory cannot
    ///   be determined.
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load configuration file at path.
    ///
    /// Falls back to defaults if file does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.into(),
            }),
        }
    }
}

impl FromStr for ArboristConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for ArboristConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// General settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Files above this many bytes are flagged as large.
    pub ask_threshold: u64,

    /// Link type given to paths the operator accepts.
    pub default_link_type: LinkType,

    /// Delete copied files on removal.
    pub remove_copies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ask_threshold: ASK_THRESHOLD_BYTES,
            default_link_type: LinkType::Symlink,
            remove_copies: true,
        }
    }
}

/// Extra classification patterns.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtraPatterns {
    /// Appended to built-in always-link list.
    pub link: Vec<String>,

    /// Appended to built-in always-skip list.
    pub skip: Vec<String>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration directory cannot be determined.
    #[error(transparent)]
    NoConfigDir(#[from] crate::path::NoConfigDir),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
