// SPDX-License-Identifier: MPL-2.0

//! Photo capture from a capture source
//!
//! Photos are taken with their own synchronous read, independent of the
//! frame currently on screen, and are never run through the viewfinder
//! transforms.

use crate::backends::camera::{CaptureSource, Frame};
use crate::errors::{PhotoError, PipelineError};
use tracing::{debug, warn};

/// Photo capture handler
pub struct PhotoCapture;

impl PhotoCapture {
    /// Read one raw frame for a photo
    pub fn capture_from_source(source: &mut dyn CaptureSource) -> Result<Frame, PhotoError> {
        match source.read_frame() {
            Ok(frame) => {
                if let Err(e) = frame.ensure_valid() {
                    warn!(error = %e, "Photo frame rejected");
                    return Err(PhotoError::NoFrameAvailable);
                }
                debug!(
                    width = frame.width(),
                    height = frame.height(),
                    "Frame captured for photo"
                );
                Ok(frame)
            }
            Err(PipelineError::CaptureUnavailable(reason)) => {
                warn!(reason = %reason, "Photo read failed");
                Err(PhotoError::NoFrameAvailable)
            }
            Err(e) => {
                warn!(error = %e, "Photo read failed");
                Err(PhotoError::NoFrameAvailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::ScriptedSource;

    #[test]
    fn test_failed_read_maps_to_no_frame() {
        let mut source = ScriptedSource::new((4, 4));
        source.push_unavailable();
        assert_eq!(
            PhotoCapture::capture_from_source(&mut source),
            Err(PhotoError::NoFrameAvailable)
        );
    }

    #[test]
    fn test_capture_returns_raw_frame() {
        let mut source = ScriptedSource::new((4, 2));
        source.push_frame(Frame::solid(4, 2, [7, 8, 9]));
        let frame = PhotoCapture::capture_from_source(&mut source).unwrap();
        assert_eq!(frame, Frame::solid(4, 2, [7, 8, 9]));
    }
}
