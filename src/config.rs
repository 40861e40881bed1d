//! Store configuration.
//!
//! The store never consults ambient state: every location it touches comes
//! from a [`StoreConfig`] handed to [`crate::store::RecordStore::open`].
//!
//! A config can be built in code, from the CLI (`--root` / `ANNOSTORE_ROOT`),
//! or loaded from YAML:
//!
//! ```yaml
//! root: /var/lib/annostore
//! assets_dir: /mnt/bulk/images   # optional, absolute or relative to root
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AnnostoreError;

/// Default subdirectory for binary image assets.
pub const ASSETS_DIR: &str = "storage";
/// Default subdirectory for image metadata records.
pub const METADATA_DIR: &str = "metadata";
/// Default subdirectory for annotation sets.
pub const ANNOTATIONS_DIR: &str = "annotations";

/// Storage roots for a [`crate::store::RecordStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base directory; the three record directories live below it unless
    /// overridden.
    pub root: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// A config with every directory under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assets_dir: None,
            metadata_dir: None,
            annotations_dir: None,
        }
    }

    /// Parses a YAML config document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Loads a YAML config file. Relative `root` values are resolved against
    /// the file's directory.
    pub fn from_yaml_file(path: &Path) -> Result<Self, AnnostoreError> {
        let text = fs::read_to_string(path).map_err(AnnostoreError::Io)?;
        let mut config = Self::from_yaml_str(&text).map_err(|source| AnnostoreError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        if config.root.is_relative() {
            if let Some(parent) = path.parent() {
                config.root = parent.join(&config.root);
            }
        }
        Ok(config)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.resolve(self.assets_dir.as_deref(), ASSETS_DIR)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.resolve(self.metadata_dir.as_deref(), METADATA_DIR)
    }

    pub fn annotations_dir(&self) -> PathBuf {
        self.resolve(self.annotations_dir.as_deref(), ANNOTATIONS_DIR)
    }

    // `join` keeps absolute overrides as-is.
    fn resolve(&self, custom: Option<&Path>, default: &str) -> PathBuf {
        match custom {
            Some(dir) => self.root.join(dir),
            None => self.root.join(default),
        }
    }
}
