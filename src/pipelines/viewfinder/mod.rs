// SPDX-License-Identifier: MPL-2.0

//! Per-tick frame transforms
//!
//! Each stage takes one frame and returns one frame with the input's
//! dimensions (rotation aside). Applied in this order by the controller:
//!
//! 1. [`orientation`]: rotate toward the current or session-locked orientation
//! 2. [`zoom`] path: identity, [`wide_angle`] emulation, or digital crop
//! 3. [`stabilizer`]: optional, video mode only

pub mod orientation;
pub mod stabilizer;
pub mod wide_angle;
pub mod zoom;

pub use orientation::{Orientation, classify, rotate};
pub use stabilizer::{Stabilizer, Translation};
pub use zoom::{CropRect, ZoomLevel, ZoomPath, crop_rect, digital_zoom};

use crate::backends::camera::Frame;
use crate::errors::PipelineResult;

/// Run the zoom path selected for this tick
pub fn apply_zoom(frame: Frame, path: ZoomPath) -> PipelineResult<Frame> {
    match path {
        ZoomPath::Identity => Ok(frame),
        ZoomPath::WideAngle { intensity } => wide_angle::apply(frame, intensity),
        ZoomPath::DigitalCrop { factor } => digital_zoom(frame, factor),
    }
}

/// Orientation correction followed by the zoom path
///
/// This is the still-image portion of the pipeline; stabilization needs
/// frame history and is driven by the controller.
pub fn correct_and_zoom(
    frame: Frame,
    target: Orientation,
    zoom: ZoomLevel,
) -> PipelineResult<Frame> {
    let rotated = rotate(frame, target)?;
    apply_zoom(rotated, zoom.path())
}
