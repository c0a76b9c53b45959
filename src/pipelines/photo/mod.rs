// SPDX-License-Identifier: MPL-2.0

//! Photo capture pipeline
//!
//! ```text
//! CaptureSource → Capture (raw read) → Encoding → Disk I/O
//! ```
//!
//! Every stage runs inline on the caller's thread. A slow disk write stalls
//! the caller for its duration.

pub mod capture;
pub mod encoding;

pub use capture::PhotoCapture;
pub use encoding::{EncodingFormat, EncodingQuality, PhotoEncoder};

use crate::backends::camera::{CaptureSource, Frame};
use crate::errors::PhotoError;
use crate::storage;
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete photo capture pipeline
///
/// Orchestrates the capture → encode → save workflow.
#[derive(Debug, Clone)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
    output_dir: PathBuf,
}

impl PhotoPipeline {
    /// JPEG pipeline writing into `output_dir`
    pub fn new(output_dir: PathBuf, quality: EncodingQuality) -> Self {
        let mut encoder = PhotoEncoder::new();
        encoder.set_quality(quality);
        Self {
            encoder,
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Take an independent raw read from `source` and save it
    pub fn capture(&self, source: &mut dyn CaptureSource) -> Result<PathBuf, PhotoError> {
        let frame = PhotoCapture::capture_from_source(source)?;
        self.save_frame(&frame)
    }

    /// Save `frame` under a fresh timestamped name
    pub fn save_frame(&self, frame: &Frame) -> Result<PathBuf, PhotoError> {
        storage::ensure_dir(&self.output_dir)?;
        let path = storage::timestamped_path(
            &self.output_dir,
            storage::PHOTO_PREFIX,
            self.encoder.format().extension(),
            chrono::Local::now(),
        );
        self.save_frame_to(frame, &path)
    }

    /// Save `frame` at an explicit path; the format follows the extension
    pub fn save_frame_to(&self, frame: &Frame, path: &Path) -> Result<PathBuf, PhotoError> {
        let mut encoder = self.encoder.clone();
        if let Some(format) = EncodingFormat::from_path(path) {
            encoder.set_format(format);
        }
        let encoded = encoder.encode(frame)?;
        info!(
            width = encoded.width,
            height = encoded.height,
            path = %path.display(),
            "Saving photo"
        );
        encoder.save(&encoded, path)
    }
}
