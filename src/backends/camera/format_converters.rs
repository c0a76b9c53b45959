// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for raw capture buffers
//!
//! Capture devices deliver YUYV or MJPG; the frame pipeline works on packed
//! RGB8. These helpers bridge the two.

use crate::errors::{PipelineError, PipelineResult};

use super::types::Frame;

/// Convert YUYV (YUV 4:2:2) to packed RGB
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    // YUYV: Y0 U0 Y1 V0 - processes 2 pixels at a time
    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            if rgb.len() >= pixel_count * 3 {
                break;
            }
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    rgb
}

/// Decode a YUYV buffer into a frame
pub fn yuyv_to_frame(data: &[u8], width: u32, height: u32) -> PipelineResult<Frame> {
    let needed = width as usize * height as usize * 2;
    if data.len() < needed {
        return Err(PipelineError::InvalidFrame(format!(
            "YUYV buffer too small: {} < {}",
            data.len(),
            needed
        )));
    }
    Frame::from_rgb(width, height, yuyv_to_rgb(&data[..needed], width, height))
}

/// Decode an MJPG buffer into a frame
pub fn mjpeg_to_frame(data: &[u8]) -> PipelineResult<Frame> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| PipelineError::InvalidFrame(format!("MJPG decode failed: {}", e)))?;
    Ok(Frame::from_image(decoded.to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb() {
        // Pure white in YUV (Y=255, U=128, V=128)
        let yuyv = vec![255u8, 128, 255, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1);

        assert_eq!(rgb.len(), 6);
        assert!(rgb.iter().all(|&c| c > 250));
    }

    #[test]
    fn test_yuyv_to_frame_dimensions() {
        let yuyv = vec![16u8, 128, 16, 128].repeat(4 * 3 / 2);
        let frame = yuyv_to_frame(&yuyv, 4, 3).unwrap();
        assert_eq!(frame.dimensions(), (4, 3));
    }

    #[test]
    fn test_yuyv_short_buffer_is_invalid() {
        assert!(yuyv_to_frame(&[0u8; 6], 4, 4).is_err());
    }

    #[test]
    fn test_mjpeg_garbage_is_invalid() {
        assert!(matches!(
            mjpeg_to_frame(&[0xff, 0x00, 0x12]),
            Err(PipelineError::InvalidFrame(_))
        ));
    }
}
