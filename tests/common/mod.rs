//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which opens an [`Inventory`] either in memory or
//! on a temporary data directory, plus fixtures for product input and image
//! bytes.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;

use stockroom::config::{BlobBackend, Config};
use stockroom::Inventory;
use stockroom_db::models::{DynamicFieldInput, ProductInput};
use stockroom_db::StorageMode;
use tempfile::TempDir;

/// Test harness wrapping an [`Inventory`] and the directory backing it.
pub struct TestHarness {
    pub inventory: Inventory,
    pub config: Config,
    dir: Option<TempDir>,
}

impl TestHarness {
    /// Inventory held entirely in memory.
    pub fn new() -> Self {
        Self {
            inventory: Inventory::in_memory().expect("failed to open in-memory inventory"),
            config: Config::default(),
            dir: None,
        }
    }

    /// Snapshot inventory persisted to an object store in a temp directory.
    pub fn on_disk() -> Self {
        Self::with_storage(StorageMode::Snapshot, BlobBackend::Object)
    }

    /// Inventory on a temp directory with the given backend.
    pub fn with_storage(mode: StorageMode, blob_backend: BlobBackend) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = config_for(dir.path(), mode, blob_backend);
        let inventory = Inventory::open(&config).expect("failed to open inventory");
        Self {
            inventory,
            config,
            dir: Some(dir),
        }
    }

    /// Drop the open inventory and open the same data directory again.
    pub fn reopen(self) -> Self {
        let Self { inventory, config, dir } = self;
        drop(inventory);
        let inventory = Inventory::open(&config).expect("failed to reopen inventory");
        Self {
            inventory,
            config,
            dir,
        }
    }

    /// Data directory, for on-disk harnesses.
    pub fn data_dir(&self) -> &Path {
        self.dir
            .as_ref()
            .map(|d| d.path())
            .expect("in-memory harness has no data directory")
    }
}

pub fn config_for(data_dir: &Path, mode: StorageMode, blob_backend: BlobBackend) -> Config {
    let mut config = Config::default();
    config.storage.mode = mode;
    config.storage.blob_backend = blob_backend;
    config.storage.data_dir = data_dir.to_path_buf();
    config
}

/// The example product: Widget by Acme.
pub fn widget() -> ProductInput {
    ProductInput {
        product_name: "Widget".to_string(),
        company_name: "Acme".to_string(),
        product_quality: "A".to_string(),
        quantity_bundle: 10,
        purchase_price: 5.0,
        wholesale_price: 7.0,
        retail_price: 9.99,
        image_id: None,
        dynamic_fields: vec![DynamicFieldInput::text("Colour", "Red")],
    }
}

pub fn product(name: &str, company: &str, retail: f64) -> ProductInput {
    ProductInput {
        product_name: name.to_string(),
        company_name: company.to_string(),
        product_quality: "B".to_string(),
        quantity_bundle: 1,
        purchase_price: retail / 2.0,
        wholesale_price: retail * 0.75,
        retail_price: retail,
        image_id: None,
        dynamic_fields: vec![],
    }
}

/// PNG bytes of a solid `width` x `height` image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut img = image::RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = image::Rgb([200, 30, 30]);
    }
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("failed to encode test PNG");
    buf.into_inner()
}
