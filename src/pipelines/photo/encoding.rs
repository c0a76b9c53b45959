// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! This module handles encoding frames to still image formats:
//! - JPEG (with quality control)
//! - PNG (lossless)
//!
//! Encoding and the disk write run inline on the caller's thread.

use crate::backends::camera::Frame;
use crate::errors::PhotoError;
use image::ExtendedColorType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// Format implied by a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
            "png" => Some(EncodingFormat::Png),
            _ => None,
        }
    }
}

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone)]
pub struct PhotoEncoder {
    format: EncodingFormat,
    quality: EncodingQuality,
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoEncoder {
    /// Create a new encoder with JPEG format and high quality
    pub fn new() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            quality: EncodingQuality::High,
        }
    }

    /// Set encoding format
    pub fn set_format(&mut self, format: EncodingFormat) {
        self.format = format;
    }

    /// Set encoding quality (only affects JPEG)
    pub fn set_quality(&mut self, quality: EncodingQuality) {
        self.quality = quality;
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    /// Encode a frame in the configured format
    pub fn encode(&self, frame: &Frame) -> Result<EncodedImage, PhotoError> {
        debug!(
            width = frame.width(),
            height = frame.height(),
            format = ?self.format,
            "Encoding photo"
        );

        let data = match self.format {
            EncodingFormat::Jpeg => Self::encode_jpeg(frame, self.quality)?,
            EncodingFormat::Png => Self::encode_png(frame)?,
        };

        Ok(EncodedImage {
            data,
            format: self.format,
            width: frame.width(),
            height: frame.height(),
        })
    }

    /// Write encoded bytes to `path`
    pub fn save(&self, encoded: &EncodedImage, path: &Path) -> Result<PathBuf, PhotoError> {
        std::fs::write(path, &encoded.data)
            .map_err(|e| PhotoError::SaveFailed(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), bytes = encoded.data.len(), "Photo saved");
        Ok(path.to_path_buf())
    }

    /// Encode image as JPEG
    fn encode_jpeg(frame: &Frame, quality: EncodingQuality) -> Result<Vec<u8>, PhotoError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());

        encoder
            .encode(
                frame.as_raw(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }

    /// Encode image as PNG
    fn encode_png(frame: &Frame) -> Result<Vec<u8>, PhotoError> {
        let mut buffer = Vec::new();

        frame
            .as_image()
            .write_to(
                &mut std::io::Cursor::new(&mut buffer),
                image::ImageFormat::Png,
            )
            .map_err(|e| PhotoError::EncodingFailed(format!("PNG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_encoding_has_soi_marker() {
        let encoded = PhotoEncoder::new()
            .encode(&Frame::solid(16, 8, [200, 10, 10]))
            .unwrap();
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
        assert_eq!((encoded.width, encoded.height), (16, 8));
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let frame = Frame::solid(5, 3, [1, 2, 3]);
        let mut encoder = PhotoEncoder::new();
        encoder.set_format(EncodingFormat::Png);
        let encoded = encoder.encode(&frame).unwrap();
        let decoded = image::load_from_memory(&encoded.data).unwrap().to_rgb8();
        assert_eq!(&decoded, frame.as_image());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            EncodingFormat::from_path(Path::new("a/b.JPEG")),
            Some(EncodingFormat::Jpeg)
        );
        assert_eq!(EncodingFormat::from_path(Path::new("x.tiff")), None);
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let encoded = PhotoEncoder::new().encode(&Frame::solid(2, 2, [0; 3])).unwrap();
        let result = PhotoEncoder::new().save(&encoded, Path::new("/nonexistent/dir/p.jpg"));
        assert!(matches!(result, Err(PhotoError::SaveFailed(_))));
    }
}
