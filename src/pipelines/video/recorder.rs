// SPDX-License-Identifier: MPL-2.0

//! Video recording through GStreamer
//!
//! Frames produced by the viewfinder are pushed into an `appsrc` and
//! encoded to an MP4 file:
//!
//! ```text
//! appsrc (RGB) → videoconvert → H.264 encoder → h264parse → mp4mux → filesink
//! ```
//!
//! The stream is opened at a fixed size and frame rate. Timestamps are
//! derived from the frame index, so the file plays back at the nominal rate
//! regardless of how fast frames were produced.

use super::muxer::{create_muxer, link_muxer_to_sink, link_video_to_muxer};
use crate::backends::camera::Frame;
use crate::constants::BitratePreset;
use crate::constants::timing::{START_ERROR_CHECK_MS, STOP_TIMEOUT_SECS};
use crate::errors::RecordingError;
use crate::media::encoders::select_h264_encoder;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::imageops::{self, FilterType};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// An open output stream accepting frames of one fixed size
pub trait FrameWriter {
    /// Encode and append one frame
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    /// Flush and close the stream, returning the finished file
    fn finish(self: Box<Self>) -> Result<PathBuf, RecordingError>;

    fn path(&self) -> &Path;

    fn size(&self) -> (u32, u32);

    fn frames_written(&self) -> u64;
}

/// Factory for output streams
pub trait RecorderBackend {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>, RecordingError>;
}

/// Resize `frame` to `size` unless it already matches
pub fn fit_to_stream(frame: &Frame, size: (u32, u32)) -> Cow<'_, Frame> {
    if frame.dimensions() == size {
        return Cow::Borrowed(frame);
    }
    debug!(
        from = ?frame.dimensions(),
        to = ?size,
        "Resizing frame to stream size"
    );
    let resized = imageops::resize(frame.as_image(), size.0, size.1, FilterType::Triangle);
    Cow::Owned(Frame::from_image(resized))
}

/// Opens MP4 files through the best available H.264 encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct GstRecorderBackend {
    preset: BitratePreset,
}

impl GstRecorderBackend {
    pub fn new(preset: BitratePreset) -> Self {
        Self { preset }
    }
}

impl RecorderBackend for GstRecorderBackend {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>, RecordingError> {
        let writer = GstVideoWriter::new(path, width, height, fps, self.preset)?;
        writer.start()?;
        Ok(Box::new(writer))
    }
}

/// One MP4 file being written
#[derive(Debug)]
pub struct GstVideoWriter {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    info: gst_video::VideoInfo,
    file_path: PathBuf,
    fps: u32,
    frame_index: u64,
}

impl GstVideoWriter {
    /// Build the encoding pipeline; nothing is written until [`start`](Self::start)
    pub fn new(
        output_path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        preset: BitratePreset,
    ) -> Result<Self, RecordingError> {
        info!(
            width,
            height,
            fps,
            output = %output_path.display(),
            "Creating video writer"
        );

        if width == 0 || height == 0 || fps == 0 {
            return Err(RecordingError::StartFailed(format!(
                "invalid stream parameters {}x{}@{}",
                width, height, fps
            )));
        }

        gst::init()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to initialize GStreamer: {}", e)))?;

        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
            .fps(gst::Fraction::new(fps as i32, 1))
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Invalid video info: {}", e)))?;
        let caps = info
            .to_caps()
            .map_err(|e| RecordingError::StartFailed(format!("Invalid caps: {}", e)))?;

        let pipeline = gst::Pipeline::new();

        let appsrc = gst::ElementFactory::make("appsrc")
            .name("viewfinder-src")
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create appsrc: {}", e)))?
            .downcast::<gst_app::AppSrc>()
            .map_err(|_| RecordingError::StartFailed("Failed to cast to AppSrc".to_string()))?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);
        // Back-pressure the producer instead of queueing unbounded frames
        appsrc.set_property("block", true);

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create videoconvert: {}", e)))?;

        let selected = select_h264_encoder(preset, width, height)
            .map_err(RecordingError::EncoderNotAvailable)?;
        let muxer_config = create_muxer(output_path).map_err(RecordingError::StartFailed)?;

        pipeline
            .add_many([
                appsrc.upcast_ref::<gst::Element>(),
                &videoconvert,
                &selected.encoder,
                &selected.parser,
                &muxer_config.muxer,
                &muxer_config.filesink,
            ])
            .map_err(|e| RecordingError::StartFailed(format!("Failed to add elements: {}", e)))?;

        gst::Element::link_many([
            appsrc.upcast_ref::<gst::Element>(),
            &videoconvert,
            &selected.encoder,
            &selected.parser,
        ])
        .map_err(|e| {
            RecordingError::StartFailed(format!("Failed to link encoder chain: {}", e))
        })?;
        link_video_to_muxer(&selected.parser, &muxer_config.muxer)
            .map_err(RecordingError::StartFailed)?;
        link_muxer_to_sink(&muxer_config.muxer, &muxer_config.filesink)
            .map_err(RecordingError::StartFailed)?;

        debug!(
            encoder = selected.spec.element_name,
            "Recording pipeline assembled"
        );

        Ok(Self {
            pipeline,
            appsrc,
            info,
            file_path: muxer_config.output_path,
            fps,
            frame_index: 0,
        })
    }

    /// Set the pipeline playing and check it did not fail immediately
    pub fn start(&self) -> Result<(), RecordingError> {
        info!(path = %self.file_path.display(), "Starting recording");

        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to start pipeline: {:?}", e)))?;

        if let Some(bus) = self.pipeline.bus()
            && let Some(msg) = bus.timed_pop_filtered(
                gst::ClockTime::from_mseconds(START_ERROR_CHECK_MS),
                &[gst::MessageType::Error, gst::MessageType::Warning],
            )
        {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    error!(
                        error = %err.error(),
                        debug = ?err.debug(),
                        "Recording pipeline error on start"
                    );
                    let _ = self.pipeline.set_state(gst::State::Null);
                    return Err(RecordingError::StartFailed(err.error().to_string()));
                }
                gst::MessageView::Warning(warning) => {
                    warn!(
                        warning = %warning.error(),
                        debug = ?warning.debug(),
                        "Recording pipeline warning"
                    );
                }
                _ => {}
            }
        }

        info!("Recording started");
        Ok(())
    }

    fn frame_duration_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps)
    }
}

impl FrameWriter for GstVideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let size = self.size();
        let frame = fit_to_stream(frame, size);

        let stride = self.info.stride()[0] as usize;
        let row_bytes = size.0 as usize * 3;

        let mut buffer = gst::Buffer::with_size(self.info.size())
            .map_err(|e| RecordingError::WriteFailed(format!("Failed to allocate buffer: {}", e)))?;
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| RecordingError::WriteFailed("Buffer is not writable".to_string()))?;
            let pts = self.frame_index * self.frame_duration_ns();
            buffer_ref.set_pts(gst::ClockTime::from_nseconds(pts));
            buffer_ref.set_duration(gst::ClockTime::from_nseconds(self.frame_duration_ns()));

            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| RecordingError::WriteFailed(format!("Failed to map buffer: {}", e)))?;
            let data = map.as_mut_slice();
            for (y, row) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
                let start = y * stride;
                data[start..start + row_bytes].copy_from_slice(row);
            }
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RecordingError::WriteFailed(format!("Failed to push buffer: {:?}", e)))?;
        self.frame_index += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PathBuf, RecordingError> {
        info!(
            path = %self.file_path.display(),
            frames = self.frame_index,
            "Stopping recording"
        );

        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(error = ?e, "Failed to signal end of stream");
        }

        // The muxer writes its index on EOS; wait for it to reach the sink
        let outcome = match self.pipeline.bus() {
            Some(bus) => match bus.timed_pop_filtered(
                gst::ClockTime::from_seconds(STOP_TIMEOUT_SECS),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            ) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Error(err) => Err(RecordingError::StopFailed(format!(
                        "{} ({:?})",
                        err.error(),
                        err.debug()
                    ))),
                    _ => Ok(()),
                },
                None => Err(RecordingError::StopFailed(
                    "timed out waiting for end of stream".to_string(),
                )),
            },
            None => Err(RecordingError::StopFailed("pipeline has no bus".to_string())),
        };

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| RecordingError::StopFailed(format!("Failed to stop pipeline: {:?}", e)))?;

        outcome?;
        info!(path = %self.file_path.display(), "Recording saved");
        Ok(self.file_path.clone())
    }

    fn path(&self) -> &Path {
        &self.file_path
    }

    fn size(&self) -> (u32, u32) {
        (self.info.width(), self.info.height())
    }

    fn frames_written(&self) -> u64 {
        self.frame_index
    }
}

impl Drop for GstVideoWriter {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_to_stream_borrows_matching_frame() {
        let frame = Frame::solid(8, 6, [1, 2, 3]);
        assert!(matches!(fit_to_stream(&frame, (8, 6)), Cow::Borrowed(_)));
    }

    #[test]
    fn test_fit_to_stream_resizes_mismatch() {
        let frame = Frame::solid(6, 8, [40, 40, 40]);
        let fitted = fit_to_stream(&frame, (8, 6));
        assert_eq!(fitted.dimensions(), (8, 6));
        assert_eq!(fitted.as_image().get_pixel(4, 3).0, [40, 40, 40]);
    }
}
