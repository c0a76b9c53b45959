// SPDX-License-Identifier: GPL-3.0-only

//! Zoom control and the digital crop path

use crate::backends::camera::Frame;
use crate::constants::zoom as consts;
use crate::errors::PipelineResult;
use crate::media::{Roi, resample};
use image::imageops::{self, FilterType};

/// Zoom value clamped into the supported range
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ZoomLevel(f32);

impl ZoomLevel {
    /// Clamp `value` into range; NaN maps to neutral
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(consts::NEUTRAL);
        }
        Self(value.clamp(consts::MIN, consts::MAX))
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Transform path selected by this zoom level
    pub fn path(&self) -> ZoomPath {
        if self.0 < consts::NEUTRAL {
            ZoomPath::WideAngle {
                intensity: (consts::NEUTRAL - self.0) * consts::WIDE_ANGLE_GAIN,
            }
        } else if self.0 > consts::NEUTRAL {
            ZoomPath::DigitalCrop { factor: self.0 }
        } else {
            ZoomPath::Identity
        }
    }

    /// Step by `delta`, staying in range
    pub fn step(&self, delta: f32) -> Self {
        // Round to the step grid so repeated presses land on exactly 1.0
        Self::new(((self.0 + delta) * 100.0).round() / 100.0)
    }
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self(consts::NEUTRAL)
    }
}

/// The mutually exclusive zoom transforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomPath {
    /// No crop or resize
    Identity,
    /// Barrel-warp emulation, intensity in (0, 1]
    WideAngle { intensity: f32 },
    /// Centered crop magnified by `factor` > 1
    DigitalCrop { factor: f32 },
}

/// Source rectangle of a digital zoom, in sub-pixel frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether `other` lies inside this rectangle without touching any edge
    pub fn strictly_contains(&self, other: &CropRect) -> bool {
        other.x > self.x
            && other.y > self.y
            && other.x + other.width < self.x + self.width
            && other.y + other.height < self.y + self.height
    }

    /// The same rectangle in whole pixels, if it falls on pixel boundaries
    pub fn to_pixels(&self) -> Option<Roi> {
        let whole = |v: f64| v.fract() == 0.0 && v >= 0.0;
        if !(whole(self.x) && whole(self.y) && whole(self.width) && whole(self.height)) {
            return None;
        }
        let roi = Roi {
            x: self.x as u32,
            y: self.y as u32,
            width: self.width as u32,
            height: self.height as u32,
        };
        (!roi.is_empty()).then_some(roi)
    }
}

/// Centered source rectangle for a digital zoom of `factor`
///
/// Half extents are `size / (2 * factor)` around the frame center, clamped
/// to the frame. The rectangle shrinks continuously as `factor` grows.
pub fn crop_rect(width: u32, height: u32, factor: f32) -> CropRect {
    let (x, w) = centered_span(width, factor);
    let (y, h) = centered_span(height, factor);
    CropRect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn centered_span(len: u32, factor: f32) -> (f64, f64) {
    let len = len as f64;
    let center = len / 2.0;
    let radius = len / (2.0 * factor as f64);
    let start = (center - radius).max(0.0);
    let end = (center + radius).min(len);
    (start, end - start)
}

/// Crop the centered region for `factor` and scale it back to full size
pub fn digital_zoom(frame: Frame, factor: f32) -> PipelineResult<Frame> {
    frame.ensure_valid()?;
    let (width, height) = frame.dimensions();
    let rect = crop_rect(width, height, factor);

    if let Some(roi) = rect.to_pixels() {
        let cropped =
            imageops::crop_imm(frame.as_image(), roi.x, roi.y, roi.width, roi.height).to_image();
        return Ok(Frame::from_image(imageops::resize(
            &cropped,
            width,
            height,
            FilterType::Triangle,
        )));
    }

    // Pixel-center aligned bilinear sampling of the fractional rectangle
    let scale_x = rect.width / width as f64;
    let scale_y = rect.height / height as f64;
    let (max_x, max_y) = ((width - 1) as f64, (height - 1) as f64);
    Ok(Frame::from_image(resample::remap(frame.as_image(), width, height, |u, v| {
        let sx = rect.x + (u as f64 + 0.5) * scale_x - 0.5;
        let sy = rect.y + (v as f64 + 0.5) * scale_y - 0.5;
        (sx.clamp(0.0, max_x), sy.clamp(0.0, max_y))
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_clamps_to_range() {
        assert_eq!(ZoomLevel::new(0.1).value(), 0.5);
        assert_eq!(ZoomLevel::new(9.0).value(), 5.0);
        assert_eq!(ZoomLevel::new(f32::NAN).value(), 1.0);
    }

    #[test]
    fn test_path_selection() {
        assert_eq!(ZoomLevel::new(1.0).path(), ZoomPath::Identity);
        assert_eq!(
            ZoomLevel::new(2.5).path(),
            ZoomPath::DigitalCrop { factor: 2.5 }
        );
        match ZoomLevel::new(0.5).path() {
            ZoomPath::WideAngle { intensity } => assert!((intensity - 1.0).abs() < 1e-6),
            other => panic!("unexpected path {:?}", other),
        }
    }

    #[test]
    fn test_step_lands_on_neutral() {
        let mut zoom = ZoomLevel::new(0.7);
        for _ in 0..3 {
            zoom = zoom.step(consts::STEP);
        }
        assert_eq!(zoom.path(), ZoomPath::Identity);
    }

    #[test]
    fn test_crop_rect_full_hd_at_2x() {
        let rect = crop_rect(1920, 1080, 2.0);
        assert_eq!(
            rect.to_pixels(),
            Some(Roi {
                x: 480,
                y: 270,
                width: 960,
                height: 540
            })
        );
    }

    #[test]
    fn test_crop_rect_never_empty() {
        let rect = crop_rect(3, 1, 5.0);
        assert!(rect.width > 0.0 && rect.height > 0.0);
        assert!(rect.x + rect.width <= 3.0 && rect.y + rect.height <= 1.0);
    }

    #[test]
    fn test_close_zooms_give_distinct_rects() {
        let a = crop_rect(1920, 1080, 1.50);
        let b = crop_rect(1920, 1080, 1.51);
        assert!(a.strictly_contains(&b), "{:?} vs {:?}", a, b);
        assert_eq!(b.to_pixels(), None);
    }

    #[test]
    fn test_fractional_zoom_keeps_edges_inside_frame() {
        let frame = Frame::solid(64, 48, [200, 100, 50]);
        let zoomed = digital_zoom(frame.clone(), 1.0001).unwrap();
        assert_eq!(zoomed, frame);
    }

    #[test]
    fn test_digital_zoom_keeps_dimensions() {
        let frame = Frame::solid(64, 48, [20, 40, 60]);
        let zoomed = digital_zoom(frame, 3.0).unwrap();
        assert_eq!(zoomed.dimensions(), (64, 48));
        assert_eq!(zoomed.as_image().get_pixel(10, 10).0, [20, 40, 60]);
    }
}
