// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture source
//!
//! Opens `/dev/videoN`, negotiates YUYV (preferred) or MJPG at the requested
//! size, and streams frames through memory-mapped buffers. Reads block until
//! the driver hands over the next buffer.

use super::CaptureSource;
use super::format_converters::{mjpeg_to_frame, yuyv_to_frame};
use super::types::{CameraDevice, Frame, PixelFormat};
use crate::errors::{PipelineError, PipelineResult};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Number of mmap buffers requested from the driver
const BUFFER_COUNT: u32 = 4;

/// Enumerate V4L2 capture nodes
pub fn enumerate_devices() -> Vec<CameraDevice> {
    let mut devices: Vec<CameraDevice> = v4l::context::enum_devices()
        .into_iter()
        .filter(|node| {
            // Metadata nodes share the card name but cannot capture video
            Device::new(node.index())
                .and_then(|dev| dev.query_caps())
                .map(|caps| {
                    caps.capabilities
                        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                })
                .unwrap_or(false)
        })
        .map(|node| CameraDevice {
            index: node.index(),
            name: node
                .name()
                .unwrap_or_else(|| format!("Video device {}", node.index())),
            path: node.path().to_path_buf(),
        })
        .collect();

    devices.sort_by_key(|d| d.index);
    debug!(count = devices.len(), "Enumerated V4L2 devices");
    devices
}

/// Live capture from a V4L2 device
pub struct V4l2Source {
    // Declared before `device` so the stream is torn down first
    stream: MmapStream<'static>,
    #[allow(dead_code)]
    device: Device,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
}

impl V4l2Source {
    /// Open device `index` and request `width`x`height`
    ///
    /// The driver may pick a different size; `native_resolution` reports what
    /// was actually negotiated.
    pub fn open(index: usize, width: u32, height: u32) -> PipelineResult<Self> {
        info!(index, width, height, "Opening V4L2 capture device");

        let device = Device::new(index).map_err(|e| {
            PipelineError::CaptureUnavailable(format!("Failed to open /dev/video{}: {}", index, e))
        })?;

        let pixel_format = negotiate_format(&device, width, height)?;
        let format = device.format().map_err(|e| {
            PipelineError::CaptureUnavailable(format!("Failed to query format: {}", e))
        })?;

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| {
                PipelineError::CaptureUnavailable(format!("Failed to create buffer stream: {}", e))
            })?;

        info!(
            width = format.width,
            height = format.height,
            format = ?pixel_format,
            "V4L2 capture stream started"
        );

        Ok(Self {
            stream,
            device,
            pixel_format,
            width: format.width,
            height: format.height,
        })
    }
}

/// Try YUYV first, then MJPG
fn negotiate_format(device: &Device, width: u32, height: u32) -> PipelineResult<PixelFormat> {
    for candidate in [PixelFormat::Yuyv, PixelFormat::Mjpeg] {
        let fourcc = v4l::FourCC::new(candidate.fourcc());
        let requested = v4l::Format::new(width, height, fourcc);
        match device.set_format(&requested) {
            Ok(actual) if actual.fourcc == fourcc => {
                if actual.width != width || actual.height != height {
                    warn!(
                        requested_width = width,
                        requested_height = height,
                        width = actual.width,
                        height = actual.height,
                        "Device adjusted capture size"
                    );
                }
                return Ok(candidate);
            }
            Ok(actual) => {
                debug!(wanted = ?fourcc, got = ?actual.fourcc, "Format not accepted");
            }
            Err(e) => {
                debug!(wanted = ?fourcc, error = %e, "Could not set format");
            }
        }
    }

    Err(PipelineError::CaptureUnavailable(
        "Device supports neither YUYV nor MJPG".into(),
    ))
}

impl CaptureSource for V4l2Source {
    fn read_frame(&mut self) -> PipelineResult<Frame> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| PipelineError::CaptureUnavailable(e.to_string()))?;

        // Drivers report the filled length; trailing bytes are stale
        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };

        match self.pixel_format {
            PixelFormat::Yuyv => yuyv_to_frame(data, self.width, self.height),
            PixelFormat::Mjpeg => mjpeg_to_frame(data),
        }
    }

    fn native_resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
