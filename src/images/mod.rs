//! Product image storage.
//!
//! Uploads are downscaled and re-encoded by an [`ImageEncoder`] and stored
//! inline in the database through [`ImageRepository`], one image per product.

mod encoder;
mod repository;

pub use encoder::{EncodedImage, ImageEncoder, JpegThumbnailEncoder};
pub use repository::{file_extension, ImageRepository, ImageUpload};
