// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for capture sources and the frame pipeline

use crate::errors::{PipelineError, PipelineResult};
use image::RgbImage;
use std::fmt;
use std::path::PathBuf;

/// One decoded RGB8 image from a capture source
///
/// Frames are value-like: every pipeline stage consumes one and returns a new
/// one. Rows are stored top-to-bottom, three bytes per pixel.
#[derive(Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an already decoded image
    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from packed RGB bytes
    ///
    /// Fails with `InvalidFrame` when the buffer length does not match the
    /// dimensions.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> PipelineResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        RgbImage::from_raw(width, height, data)
            .map(Self::from_image)
            .ok_or_else(|| PipelineError::InvalidFrame("buffer rejected".into()))
    }

    /// Frame filled with a single color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from_image(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Reject zero-sized frames
    pub fn ensure_valid(&self) -> PipelineResult<()> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                width, height
            )));
        }
        Ok(())
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB bytes, top row first
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}x{})", self.width(), self.height())
    }
}

/// Frame bytes in the display upload layout
///
/// RGB24 with rows stored bottom-to-top: the first row in `data` is the
/// bottom row of the image.
#[derive(Clone, PartialEq)]
pub struct DisplayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl DisplayFrame {
    /// Bytes per pixel of the display format
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Flip a frame vertically into the display layout
    pub fn from_frame(frame: &Frame) -> Self {
        let (width, height) = frame.dimensions();
        let stride = width as usize * Self::BYTES_PER_PIXEL;
        let mut data = Vec::with_capacity(stride * height as usize);
        for row in frame.as_raw().chunks_exact(stride.max(1)).rev() {
            data.extend_from_slice(row);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn stride(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    /// Pixel at (x, y) in image coordinates (y = 0 is the top row)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = (self.height - 1 - y) as usize;
        let offset = row * self.stride() + x as usize * Self::BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + Self::BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2]])
    }
}

impl fmt::Debug for DisplayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DisplayFrame({}x{}, {} bytes)",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

/// Pixel formats a capture device can be negotiated to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUV 4:2:2 packed (Y0 U Y1 V)
    Yuyv,
    /// Motion JPEG
    Mjpeg,
}

impl PixelFormat {
    /// V4L2 FourCC code
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::Yuyv => b"YUYV",
            PixelFormat::Mjpeg => b"MJPG",
        }
    }

    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"MJPG" => Some(PixelFormat::Mjpeg),
            _ => None,
        }
    }
}

/// Capture device discovered on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Device index (N in /dev/videoN)
    pub index: usize,
    /// Human-readable device name
    pub name: String,
    /// Device node path
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_rejects_short_buffer() {
        let result = Frame::from_rgb(4, 4, vec![0; 10]);
        assert!(matches!(result, Err(PipelineError::InvalidFrame(_))));
    }

    #[test]
    fn test_zero_sized_frame_is_invalid() {
        let frame = Frame::from_image(RgbImage::new(0, 8));
        assert!(frame.ensure_valid().is_err());
        assert!(Frame::solid(2, 2, [0, 0, 0]).ensure_valid().is_ok());
    }

    #[test]
    fn test_display_frame_is_bottom_to_top() {
        // Top row red, bottom row blue
        let mut image = RgbImage::new(2, 2);
        for x in 0..2 {
            image.put_pixel(x, 0, image::Rgb([255, 0, 0]));
            image.put_pixel(x, 1, image::Rgb([0, 0, 255]));
        }
        let display = DisplayFrame::from_frame(&Frame::from_image(image));

        assert_eq!(display.data.len(), 12);
        assert_eq!(&display.data[0..3], &[0, 0, 255], "first stored row is the bottom row");
        assert_eq!(display.pixel(0, 0), Some([255, 0, 0]));
        assert_eq!(display.pixel(1, 1), Some([0, 0, 255]));
        assert_eq!(display.pixel(2, 0), None);
    }

    #[test]
    fn test_fourcc_round_trip() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
    }
}
