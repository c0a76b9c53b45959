// SPDX-License-Identifier: GPL-3.0-only

//! Wide-angle emulation for sub-1.0 zoom
//!
//! A synthetic lens with barrel distortion proportional to the intensity is
//! "corrected" with a camera matrix refit to keep every source pixel. The
//! valid region of the result is cropped out and scaled back to the input
//! size, which pulls more of the scene into view.

use crate::backends::camera::Frame;
use crate::constants::lens::FREE_SCALING_ALPHA;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::lens::{self, CameraMatrix, DistortionCoefficients, Roi};
use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::warn;

/// Lens parameters derived for one frame size and intensity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensPlan {
    pub camera: CameraMatrix,
    pub distortion: DistortionCoefficients,
    pub new_camera: CameraMatrix,
    pub roi: Roi,
}

impl LensPlan {
    pub fn new(width: u32, height: u32, intensity: f32) -> Self {
        let camera = CameraMatrix::synthetic(width, height);
        let distortion = DistortionCoefficients::from_intensity(intensity as f64);
        let (new_camera, roi) = lens::optimal_new_camera_matrix(
            &camera,
            &distortion,
            (width, height),
            FREE_SCALING_ALPHA,
        );
        Self {
            camera,
            distortion,
            new_camera,
            roi,
        }
    }
}

/// Apply the wide-angle effect at `intensity` in (0, 1]
///
/// Output dimensions always match the input. If the valid region collapses
/// the input is returned unmodified.
pub fn apply(frame: Frame, intensity: f32) -> PipelineResult<Frame> {
    frame.ensure_valid()?;
    let plan = LensPlan::new(frame.width(), frame.height(), intensity);
    Ok(apply_plan(frame, &plan))
}

/// Render `frame` through a precomputed plan
pub fn apply_plan(frame: Frame, plan: &LensPlan) -> Frame {
    if plan.roi.is_empty() {
        warn!(error = %PipelineError::DegenerateRoi, "Skipping wide-angle transform");
        return frame;
    }

    let undistorted = lens::undistort(
        frame.as_image(),
        &plan.camera,
        &plan.distortion,
        &plan.new_camera,
    );
    match restore_from_roi(&undistorted, plan.roi, frame.width(), frame.height()) {
        Ok(image) => Frame::from_image(image),
        Err(e) => {
            warn!(error = %e, "Skipping wide-angle transform");
            frame
        }
    }
}

/// Crop `roi` out of `image` and scale it to `width`x`height`
fn restore_from_roi(image: &RgbImage, roi: Roi, width: u32, height: u32) -> PipelineResult<RgbImage> {
    let fits = roi.x as u64 + roi.width as u64 <= image.width() as u64
        && roi.y as u64 + roi.height as u64 <= image.height() as u64;
    if roi.is_empty() || !fits {
        return Err(PipelineError::DegenerateRoi);
    }
    let cropped = imageops::crop_imm(image, roi.x, roi.y, roi.width, roi.height).to_image();
    Ok(imageops::resize(&cropped, width, height, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        Frame::from_image(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        }))
    }

    #[test]
    fn test_plan_coefficients_follow_intensity() {
        let plan = LensPlan::new(640, 360, 0.6);
        assert!((plan.distortion.k1 + 0.12).abs() < 1e-6);
        assert!((plan.distortion.k2 - 0.06).abs() < 1e-6);
        assert_eq!(plan.camera.fx, 640.0);
        assert_eq!(plan.camera.cy, 180.0);
        assert!(!plan.roi.is_empty());
    }

    #[test]
    fn test_apply_preserves_dimensions() {
        let out = apply(gradient(160, 90), 1.0).unwrap();
        assert_eq!(out.dimensions(), (160, 90));
    }

    #[test]
    fn test_apply_changes_the_image() {
        let input = gradient(120, 80);
        let out = apply(input.clone(), 0.8).unwrap();
        assert_ne!(out, input);
    }

    #[test]
    fn test_output_has_no_border_pixels() {
        for (width, height, intensity) in [(320, 180, 1.0), (640, 480, 0.5), (200, 200, 0.3), (427, 240, 0.8)] {
            let white = Frame::solid(width, height, [255, 255, 255]);
            let out = apply(white, intensity).unwrap();
            let darkest = out.as_raw().iter().copied().min().unwrap();
            assert!(
                darkest >= 250,
                "{}x{} at {}: darkest channel {}",
                width,
                height,
                intensity,
                darkest
            );
        }
    }

    #[test]
    fn test_degenerate_roi_returns_input() {
        let input = gradient(32, 24);
        let mut plan = LensPlan::new(32, 24, 0.5);
        plan.roi = Roi::default();
        let out = apply_plan(input.clone(), &plan);
        assert_eq!(out, input);
    }

    #[test]
    fn test_restore_rejects_empty_or_out_of_bounds_roi() {
        let image = RgbImage::new(10, 10);
        assert_eq!(
            restore_from_roi(&image, Roi::default(), 10, 10),
            Err(PipelineError::DegenerateRoi)
        );
        let outside = Roi {
            x: 8,
            y: 0,
            width: 5,
            height: 5,
        };
        assert_eq!(
            restore_from_roi(&image, outside, 10, 10),
            Err(PipelineError::DegenerateRoi)
        );
    }

    #[test]
    fn test_zero_sized_frame_is_invalid() {
        let frame = Frame::from_image(RgbImage::new(0, 4));
        assert!(matches!(apply(frame, 0.5), Err(PipelineError::InvalidFrame(_))));
    }
}
