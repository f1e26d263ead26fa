//! Thumbnail encoding for product images.
//!
//! Uploaded images are stored inline as a downscaled JPEG carried in a
//! `data:` URL.

use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use stockroom_common::{Error, Result};

use crate::config::ImagesConfig;

/// Result of encoding an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Turns raw upload bytes into the stored representation.
pub trait ImageEncoder: Send {
    fn encode(&self, data: &[u8]) -> Result<EncodedImage>;
}

/// Scales the image so its longer side fits `max_dimension` and re-encodes
/// it as JPEG. Smaller images keep their size.
#[derive(Debug, Clone)]
pub struct JpegThumbnailEncoder {
    max_dimension: u32,
    quality: u8,
}

impl JpegThumbnailEncoder {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
        }
    }

    pub fn from_config(config: &ImagesConfig) -> Self {
        Self::new(config.max_dimension, config.jpeg_quality)
    }
}

impl Default for JpegThumbnailEncoder {
    fn default() -> Self {
        Self::from_config(&ImagesConfig::default())
    }
}

impl ImageEncoder for JpegThumbnailEncoder {
    fn encode(&self, data: &[u8]) -> Result<EncodedImage> {
        let img = image::load_from_memory(data)
            .map_err(|e| Error::image(format!("Failed to decode image data: {}", e)))?;

        let img = if img.width() > self.max_dimension || img.height() > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        // JPEG has no alpha channel.
        let rgb = img.to_rgb8();

        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&rgb)
            .map_err(|e| Error::image(format!("Failed to encode image as JPEG: {}", e)))?;

        let payload = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());

        Ok(EncodedImage {
            data_url: format!("data:image/jpeg;base64,{}", payload),
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([0, 128, 255, 200]);
        }
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn decode(encoded: &EncodedImage) -> image::DynamicImage {
        let payload = encoded
            .data_url
            .strip_prefix("data:image/jpeg;base64,")
            .unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn test_large_image_is_scaled_to_fit() {
        let encoded = JpegThumbnailEncoder::default().encode(&png(600, 400)).unwrap();
        assert_eq!((encoded.width, encoded.height), (300, 200));

        let decoded = decode(&encoded);
        assert_eq!((decoded.width(), decoded.height()), (300, 200));
    }

    #[test]
    fn test_portrait_image_limits_height() {
        let encoded = JpegThumbnailEncoder::new(100, 80).encode(&png(50, 400)).unwrap();
        assert_eq!(encoded.height, 100);
        assert!(encoded.width <= 13);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let encoded = JpegThumbnailEncoder::default().encode(&png(40, 20)).unwrap();
        assert_eq!((encoded.width, encoded.height), (40, 20));
    }

    #[test]
    fn test_garbage_is_an_image_error() {
        let err = JpegThumbnailEncoder::default()
            .encode(b"not an image")
            .unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }
}
