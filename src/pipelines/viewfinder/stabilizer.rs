// SPDX-License-Identifier: GPL-3.0-only

//! Translation stabilizer driven by dense optical flow
//!
//! The global motion between the previous output and the current frame is
//! the per-component mean of the flow field. That translation is then
//! applied to the current frame as-is: it is added, not subtracted, so
//! observed motion is amplified rather than cancelled. Because the previous
//! slot holds the stabilizer's own output, any offset keeps accumulating
//! from tick to tick.
//!
//! Motion is measured on a luminance copy no wider than
//! [`ANALYSIS_MAX_WIDTH`] and scaled back to frame pixels.

use crate::backends::camera::Frame;
use crate::constants::optical_flow::ANALYSIS_MAX_WIDTH;
use crate::media::optical_flow::{FlowParams, mean_flow};
use crate::media::resample;
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::debug;

/// Global 2-D translation in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Translation {
    pub dx: f64,
    pub dy: f64,
}

impl Translation {
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// Frame-to-frame stabilizer
#[derive(Debug, Clone, Default)]
pub struct Stabilizer {
    params: FlowParams,
}

impl Stabilizer {
    pub fn new(params: FlowParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FlowParams {
        &self.params
    }

    /// Mean flow from `previous` to `current`, in frame pixels
    pub fn estimate(&self, previous: &Frame, current: &Frame) -> Translation {
        let prev = luminance(previous);
        let next = luminance(current);
        let (dx, dy) = mean_flow(&prev, &next, &self.params);
        let scale_x = current.width() as f64 / next.width().max(1) as f64;
        let scale_y = current.height() as f64 / next.height().max(1) as f64;
        Translation {
            dx: dx * scale_x,
            dy: dy * scale_y,
        }
    }

    /// Stabilize `frame` against the previous output
    ///
    /// Without a previous frame, or when its size differs, the input is
    /// returned unchanged. The caller stores the returned frame as the next
    /// previous frame.
    pub fn apply(&self, frame: Frame, previous: Option<&Frame>) -> Frame {
        let Some(previous) = previous.filter(|p| p.dimensions() == frame.dimensions()) else {
            return frame;
        };

        let shift = self.estimate(previous, &frame);
        debug!(dx = shift.dx, dy = shift.dy, "Stabilizer shift");
        if shift.is_zero() {
            return frame;
        }
        Frame::from_image(resample::translate(frame.as_image(), shift.dx, shift.dy))
    }
}

/// Luminance of a frame at analysis resolution
fn luminance(frame: &Frame) -> GrayImage {
    let gray = imageops::grayscale(frame.as_image());
    if gray.width() <= ANALYSIS_MAX_WIDTH {
        return gray;
    }
    let height = ((gray.height() as u64 * ANALYSIS_MAX_WIDTH as u64) / gray.width() as u64).max(1) as u32;
    imageops::resize(&gray, ANALYSIS_MAX_WIDTH, height, FilterType::Triangle)
}
