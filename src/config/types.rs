use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stockroom_db::StorageMode;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub images: ImagesConfig,
}

/// Where the persisted image of the snapshot store is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Key/value SQLite file `<data_dir>/objects.sqlite`.
    #[default]
    Object,
    /// One file per key under `<data_dir>`.
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,

    /// Base directory for every relative path below
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub blob_backend: BlobBackend,

    #[serde(default = "default_blob_key")]
    pub blob_key: String,

    /// Comma-separated byte text written by earlier versions, migrated once
    #[serde(default = "default_legacy_text_blob")]
    pub legacy_text_blob: Option<PathBuf>,

    /// Database file for direct mode
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_blob_key() -> String {
    stockroom_db::blob::DEFAULT_BLOB_KEY.to_string()
}
fn default_legacy_text_blob() -> Option<PathBuf> {
    Some(PathBuf::from("inventory-database.txt"))
}
fn default_database_file() -> PathBuf {
    PathBuf::from("inventory.db")
}
fn default_pool_size() -> u32 {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            data_dir: default_data_dir(),
            blob_backend: BlobBackend::default(),
            blob_key: default_blob_key(),
            legacy_text_blob: default_legacy_text_blob(),
            database_file: default_database_file(),
            pool_size: default_pool_size(),
        }
    }
}

impl StorageConfig {
    /// `data_dir` with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).as_ref())
    }

    /// Resolve `path` against `data_dir` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
        if expanded.is_absolute() {
            expanded
        } else {
            self.data_dir().join(expanded)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database_file)
    }

    pub fn legacy_text_blob_path(&self) -> Option<PathBuf> {
        self.legacy_text_blob.as_deref().map(|p| self.resolve(p))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagesConfig {
    /// Longest side of the stored thumbnail, in pixels
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Prefix of the recorded `file_path`
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

fn default_max_dimension() -> u32 {
    300
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_path_prefix() -> String {
    "sale-data".to_string()
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            path_prefix: default_path_prefix(),
        }
    }
}
