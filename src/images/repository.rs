//! Image repository coordinating the encoder with database records.

use std::path::Path;

use stockroom_common::{Error, ImageId, ProductId, Result};
use stockroom_db::models::{Image, NewImage};
use stockroom_db::queries::{images, products};
use stockroom_db::Store;

use super::encoder::ImageEncoder;
use crate::config::ImagesConfig;
use crate::log_failure;

/// Extension used when the original file name has none.
const DEFAULT_EXTENSION: &str = "jpg";

/// Details of an upload that come from outside the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// File name on the uploading side.
    pub original_name: String,
    /// Declared media type of the upload.
    pub mime_type: String,
}

impl ImageUpload {
    pub fn new(original_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Lowercase extension of `name`, or `jpg` when it has none.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Stores and retrieves the single image of each product.
pub struct ImageRepository<'a> {
    store: &'a Store,
    encoder: &'a dyn ImageEncoder,
    config: &'a ImagesConfig,
}

impl<'a> ImageRepository<'a> {
    pub fn new(store: &'a Store, encoder: &'a dyn ImageEncoder, config: &'a ImagesConfig) -> Self {
        Self {
            store,
            encoder,
            config,
        }
    }

    /// Encode `data` and store it as the product's image, replacing any
    /// previous one.
    pub fn save_image(&self, data: &[u8], upload: &ImageUpload, product_id: ProductId) -> Result<Image> {
        log_failure("save image", self.save_inner(data, upload, product_id))
    }

    fn save_inner(&self, data: &[u8], upload: &ImageUpload, product_id: ProductId) -> Result<Image> {
        let conn = self.store.conn()?;
        if !products::exists(&conn, product_id)? {
            return Err(Error::not_found(format!("product {}", product_id)));
        }

        let image_id = ImageId::generate();
        let file_name = format!(
            "product_{}_{}.{}",
            product_id,
            image_id,
            file_extension(&upload.original_name)
        );
        let encoded = self.encoder.encode(data)?;

        let new_image = NewImage {
            image_id: image_id.clone(),
            product_id,
            file_path: format!("{}/{}", self.config.path_prefix, file_name),
            file_name,
            base64_data: encoded.data_url,
            original_name: upload.original_name.clone(),
            file_size: data.len() as i64,
            mime_type: upload.mime_type.clone(),
        };

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        let replaced = images::delete_for_product(&tx, product_id)?;
        images::insert_image(&tx, &new_image)?;
        products::set_image_ref(&tx, product_id, Some(&image_id))?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        let image = images::get_by_image_id(&conn, &image_id)?
            .ok_or_else(|| Error::internal(format!("image {} vanished after insert", image_id)))?;
        drop(conn);

        self.store.persist()?;
        tracing::info!(
            "Image saved for product {}: {} ({}x{}, payload length {}, replaced {})",
            product_id,
            image.file_name,
            encoded.width,
            encoded.height,
            image.base64_data.len(),
            replaced
        );
        Ok(image)
    }

    pub fn get_by_product_id(&self, product_id: ProductId) -> Result<Option<Image>> {
        log_failure(
            "load image",
            self.store
                .conn()
                .and_then(|conn| images::get_for_product(&conn, product_id)),
        )
    }

    pub fn get_by_image_id(&self, image_id: &ImageId) -> Result<Option<Image>> {
        log_failure(
            "load image",
            self.store
                .conn()
                .and_then(|conn| images::get_by_image_id(&conn, image_id)),
        )
    }

    /// Remove the product's image and clear its reference.
    ///
    /// Returns `false` when the product had no image.
    pub fn delete_image(&self, product_id: ProductId) -> Result<bool> {
        log_failure("delete image", self.delete_inner(product_id))
    }

    fn delete_inner(&self, product_id: ProductId) -> Result<bool> {
        let conn = self.store.conn()?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        let removed = images::delete_for_product(&tx, product_id)?;
        products::set_image_ref(&tx, product_id, None)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        drop(conn);

        self.store.persist()?;
        if removed > 0 {
            tracing::info!("Deleted image of product {}", product_id);
        }
        Ok(removed > 0)
    }
}
