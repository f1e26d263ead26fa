//! The inventory facade: one store plus the repositories that operate on it.

use chrono::Utc;
use stockroom_common::Result;
use stockroom_db::blob::{BlobStore, FileBlobStore, LegacyTextBlob, ObjectBlobStore};
use stockroom_db::migrations::SchemaReport;
use stockroom_db::{StorageMode, Store};

use crate::config::{BlobBackend, Config, ImagesConfig};
use crate::images::{ImageEncoder, ImageRepository, JpegThumbnailEncoder};
use crate::products::ProductRepository;
use crate::transfer::{self, ExportArtifact, ExportFormat, ImportSummary};

/// File name of the object store inside `data_dir`.
pub const OBJECT_STORE_FILE: &str = "objects.sqlite";

/// Owns the store for the lifetime of the process.
pub struct Inventory {
    store: Store,
    encoder: Box<dyn ImageEncoder>,
    images: ImagesConfig,
    schema_report: SchemaReport,
}

impl Inventory {
    /// Open the store described by `config` and bring its schema up to date.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = &config.storage;
        let data_dir = storage.data_dir();
        std::fs::create_dir_all(&data_dir)?;

        let (store, report) = match storage.mode {
            StorageMode::Snapshot => {
                let blobs: Box<dyn BlobStore> = match storage.blob_backend {
                    BlobBackend::Object => {
                        Box::new(ObjectBlobStore::open(data_dir.join(OBJECT_STORE_FILE))?)
                    }
                    BlobBackend::File => Box::new(FileBlobStore::new(data_dir.clone())),
                };
                let legacy = storage.legacy_text_blob_path().map(LegacyTextBlob::new);
                Store::open_snapshot(blobs, &storage.blob_key, legacy.as_ref())?
            }
            StorageMode::Direct => {
                Store::open_direct(&storage.database_path(), storage.pool_size)?
            }
        };

        tracing::info!(
            "Opened {} store in {} ({} migrations applied)",
            store.mode(),
            data_dir.display(),
            report.migrations_applied
        );

        Ok(Self {
            store,
            encoder: Box::new(JpegThumbnailEncoder::from_config(&config.images)),
            images: config.images.clone(),
            schema_report: report,
        })
    }

    /// Wrap an already opened store.
    pub fn new(store: Store, encoder: Box<dyn ImageEncoder>, images: ImagesConfig) -> Self {
        Self {
            store,
            encoder,
            images,
            schema_report: SchemaReport::default(),
        }
    }

    /// Throwaway inventory in process memory with default settings.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(
            Store::open_memory()?,
            Box::new(JpegThumbnailEncoder::default()),
            ImagesConfig::default(),
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Schema work done when the store was opened.
    pub fn schema_report(&self) -> &SchemaReport {
        &self.schema_report
    }

    pub fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.store)
    }

    pub fn images(&self) -> ImageRepository<'_> {
        ImageRepository::new(&self.store, self.encoder.as_ref(), &self.images)
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportArtifact> {
        transfer::export(&self.store, format, Utc::now())
    }

    pub fn import(&mut self, data: &[u8]) -> Result<ImportSummary> {
        transfer::import(&mut self.store, data)
    }
}
