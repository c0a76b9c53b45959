// SPDX-License-Identifier: GPL-3.0-only

//! Frame orientation classification and correction

use crate::backends::camera::Frame;
use crate::errors::PipelineResult;
use image::imageops;

/// Aspect-derived frame orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Wider than tall
    Landscape,
    /// Taller than wide (square frames count as portrait)
    Portrait,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

/// Classify by comparing width and height only
pub fn classify(frame: &Frame) -> Orientation {
    if frame.width() > frame.height() {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

/// Orientation a frame should be corrected toward
///
/// With a session lock the locked value wins; otherwise the frame's own
/// classification is used.
pub fn target_for(frame: &Frame, lock: Option<Orientation>) -> Orientation {
    lock.unwrap_or_else(|| classify(frame))
}

/// Correct `frame` toward `target`
///
/// Landscape is the canonical orientation and passes through untouched; a
/// portrait target rotates the frame 90 degrees clockwise.
pub fn rotate(frame: Frame, target: Orientation) -> PipelineResult<Frame> {
    frame.ensure_valid()?;
    match target {
        Orientation::Landscape => Ok(frame),
        Orientation::Portrait => Ok(Frame::from_image(imageops::rotate90(frame.as_image()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;
    use image::RgbImage;

    #[test]
    fn test_classify_by_aspect() {
        assert_eq!(classify(&Frame::solid(640, 480, [0; 3])), Orientation::Landscape);
        assert_eq!(classify(&Frame::solid(480, 640, [0; 3])), Orientation::Portrait);
        assert_eq!(classify(&Frame::solid(5, 5, [0; 3])), Orientation::Portrait);
    }

    #[test]
    fn test_portrait_rotation_yields_landscape() {
        let frame = Frame::solid(480, 640, [9; 3]);
        let rotated = rotate(frame.clone(), classify(&frame)).unwrap();
        assert_eq!(rotated.dimensions(), (640, 480));
        assert_eq!(classify(&rotated), Orientation::Landscape);
    }

    #[test]
    fn test_rotation_is_clockwise() {
        // Top-left marker ends up top-right after a clockwise quarter turn
        let mut image = RgbImage::new(2, 3);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        let rotated = rotate(Frame::from_image(image), Orientation::Portrait).unwrap();
        assert_eq!(rotated.dimensions(), (3, 2));
        assert_eq!(rotated.as_image().get_pixel(2, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_landscape_target_is_passthrough() {
        let frame = Frame::solid(4, 2, [1, 2, 3]);
        assert_eq!(rotate(frame.clone(), Orientation::Landscape).unwrap(), frame);
    }

    #[test]
    fn test_zero_sized_frame_rejected() {
        let frame = Frame::from_image(RgbImage::new(0, 0));
        assert!(matches!(
            rotate(frame, Orientation::Landscape),
            Err(PipelineError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_lock_overrides_classification() {
        let portrait = Frame::solid(2, 4, [0; 3]);
        assert_eq!(target_for(&portrait, None), Orientation::Portrait);
        assert_eq!(
            target_for(&portrait, Some(Orientation::Landscape)),
            Orientation::Landscape
        );
    }
}
