// SPDX-License-Identifier: MPL-2.0

//! Pipeline controller
//!
//! Runs the viewfinder once per tick:
//!
//! ```text
//! read → orientation → zoom path → stabilizer → recording sink → display
//! ```
//!
//! The controller owns all cross-tick state ([`PipelineState`]): the mode,
//! the open recording session with its locked orientation, the previous
//! output frame used by the stabilizer, and the capture health counters.
//! Controls are read as a snapshot at the start of each tick. Every failure
//! is tick-local and reported through [`TickOutput::events`].

use crate::backends::camera::{CaptureSource, DisplayFrame, Frame};
use crate::config::Config;
use crate::constants::{recording, timing};
use crate::errors::{PhotoError, PipelineError, RecordingError};
use crate::pipelines::photo::PhotoPipeline;
use crate::pipelines::video::{FrameWriter, RecorderBackend};
use crate::pipelines::viewfinder::orientation::{self, Orientation};
use crate::pipelines::viewfinder::{Stabilizer, ZoomLevel, apply_zoom};
use crate::storage;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Control values read at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    /// Requested zoom, clamped into range by the controller
    pub zoom: f32,
    pub stabilization_enabled: bool,
    pub video_mode: bool,
    /// Edge-triggered capture / record toggle
    pub action_triggered: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            stabilization_enabled: false,
            video_mode: false,
            action_triggered: false,
        }
    }
}

impl Controls {
    /// Starting controls taken from the user's config
    pub fn from_config(config: &Config) -> Self {
        Self {
            zoom: config.initial_zoom,
            stabilization_enabled: config.stabilization_enabled,
            ..Self::default()
        }
    }
}

/// An open recording
pub struct RecordingSession {
    locked: Orientation,
    writer: Box<dyn FrameWriter>,
    started: Instant,
}

impl RecordingSession {
    /// Orientation fixed when the session started
    pub fn locked_orientation(&self) -> Orientation {
        self.locked
    }

    pub fn path(&self) -> &std::path::Path {
        self.writer.path()
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.frames_written()
    }

    fn finish(self) -> Result<PathBuf, RecordingError> {
        let elapsed = self.started.elapsed();
        let frames = self.writer.frames_written();
        let result = self.writer.finish();
        info!(
            frames,
            seconds = elapsed.as_secs_f32(),
            ok = result.is_ok(),
            "Recording session closed"
        );
        result
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("locked", &self.locked)
            .field("path", &self.writer.path())
            .field("frames", &self.writer.frames_written())
            .finish()
    }
}

/// Which branches of the pipeline are active
#[derive(Debug, Default)]
pub enum PipelineMode {
    #[default]
    Photo,
    VideoIdle,
    VideoRecording(RecordingSession),
}

impl PipelineMode {
    pub fn is_video(&self) -> bool {
        !matches!(self, PipelineMode::Photo)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, PipelineMode::VideoRecording(_))
    }

    /// Orientation lock in force, only while recording
    pub fn locked_orientation(&self) -> Option<Orientation> {
        match self {
            PipelineMode::VideoRecording(session) => Some(session.locked),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineMode::Photo => "photo",
            PipelineMode::VideoIdle => "video",
            PipelineMode::VideoRecording(_) => "recording",
        }
    }
}

/// Capture health, sticky across ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    #[default]
    Live,
    Unavailable { consecutive: u32 },
}

impl CaptureStatus {
    /// True once enough consecutive reads failed to call the device lost
    pub fn is_persistent(&self) -> bool {
        matches!(self, CaptureStatus::Unavailable { consecutive } if *consecutive >= timing::CAPTURE_LOST_TICKS)
    }
}

/// Side effects reported by a tick
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    PhotoSaved(PathBuf),
    /// The photo read failed; nothing was written
    PhotoSkipped,
    RecordingStarted(PathBuf),
    RecordingStopped(PathBuf),
    /// A photo or recording action could not be carried out
    ActionFailed(String),
    /// The tick's frame was rejected before reaching the sinks
    FrameDropped(PipelineError),
}

/// Result of one tick
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    /// Fully transformed frame, if this tick produced one
    pub frame: Option<Frame>,
    /// Buffer for the display, bottom-to-top rows
    pub display: Option<DisplayFrame>,
    pub status: CaptureStatus,
    pub events: Vec<PipelineEvent>,
}

/// Cross-tick state owned by the controller
#[derive(Debug, Default)]
pub struct PipelineState {
    pub mode: PipelineMode,
    pub stabilization_enabled: bool,
    pub zoom: ZoomLevel,
    /// Last output frame, input to the next stabilizer run
    pub previous: Option<Frame>,
    /// Last display buffer handed out, reused when a frame is dropped
    pub last_display: Option<DisplayFrame>,
    pub status: CaptureStatus,
    /// Action raised on a tick whose read failed
    pub pending_action: bool,
    pub ticks: u64,
}

pub struct PipelineController<S: CaptureSource, R: RecorderBackend> {
    source: S,
    recorder: R,
    photos: PhotoPipeline,
    videos_dir: PathBuf,
    framerate: u32,
    stabilizer: Stabilizer,
    state: PipelineState,
}

impl<S: CaptureSource, R: RecorderBackend> PipelineController<S, R> {
    pub fn new(source: S, recorder: R, config: &Config) -> Self {
        let framerate = if config.framerate == 0 {
            recording::FRAMERATE
        } else {
            config.framerate
        };
        Self {
            source,
            recorder,
            photos: PhotoPipeline::new(config.photos_dir.clone(), config.jpeg_quality),
            videos_dir: config.videos_dir.clone(),
            framerate,
            stabilizer: Stabilizer::default(),
            state: PipelineState {
                zoom: ZoomLevel::new(config.initial_zoom),
                stabilization_enabled: config.stabilization_enabled,
                ..PipelineState::default()
            },
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn is_recording(&self) -> bool {
        self.state.mode.is_recording()
    }

    /// Run one tick of the pipeline
    pub fn tick(&mut self, controls: &Controls) -> TickOutput {
        self.state.ticks += 1;
        let mut events = Vec::new();

        self.apply_controls(controls, &mut events);
        if controls.action_triggered {
            self.state.pending_action = true;
        }

        let raw = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.note_capture_failure(&e);
                return TickOutput {
                    frame: None,
                    display: None,
                    status: self.state.status,
                    events,
                };
            }
        };
        self.note_capture_success();

        if let Err(e) = raw.ensure_valid() {
            return self.drop_frame(e, events);
        }

        if std::mem::take(&mut self.state.pending_action) {
            self.handle_action(orientation::classify(&raw), &mut events);
        }

        let target = orientation::target_for(&raw, self.state.mode.locked_orientation());
        let frame = match orientation::rotate(raw, target)
            .and_then(|rotated| apply_zoom(rotated, self.state.zoom.path()))
        {
            Ok(frame) => frame,
            Err(e) => return self.drop_frame(e, events),
        };

        let frame = if self.state.mode.is_video() && self.state.stabilization_enabled {
            self.stabilizer.apply(frame, self.state.previous.as_ref())
        } else {
            frame
        };
        self.state.previous = Some(frame.clone());

        self.write_to_session(&frame, &mut events);

        let display = DisplayFrame::from_frame(&frame);
        self.state.last_display = Some(display.clone());

        if self.state.ticks % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                tick = self.state.ticks,
                width = frame.width(),
                height = frame.height(),
                mode = self.state.mode.name(),
                zoom = self.state.zoom.value(),
                orientation = target.as_str(),
                "Frame processed"
            );
        }

        TickOutput {
            frame: Some(frame),
            display: Some(display),
            status: self.state.status,
            events,
        }
    }

    /// Switch between photo and video mode
    ///
    /// Leaving video mode closes an open recording.
    pub fn set_video_mode(&mut self, enabled: bool) -> Result<Option<PathBuf>, RecordingError> {
        if enabled == self.state.mode.is_video() {
            return Ok(None);
        }
        if enabled {
            info!("Switched to video mode");
            self.state.mode = PipelineMode::VideoIdle;
            return Ok(None);
        }

        info!(recording = self.state.mode.is_recording(), "Switched to photo mode");
        let stopped = self.stop_recording();
        self.state.mode = PipelineMode::Photo;
        stopped
    }

    /// Open a recording locked to `locked`
    ///
    /// Returns `Ok(None)` without opening anything when already recording
    /// or not in video mode.
    pub fn start_recording(
        &mut self,
        locked: Orientation,
    ) -> Result<Option<PathBuf>, RecordingError> {
        if !matches!(self.state.mode, PipelineMode::VideoIdle) {
            debug!(mode = self.state.mode.name(), "Start recording ignored");
            return Ok(None);
        }

        storage::ensure_dir(&self.videos_dir).map_err(|e| {
            RecordingError::StartFailed(format!("{}: {}", self.videos_dir.display(), e))
        })?;
        let path = storage::timestamped_path(
            &self.videos_dir,
            storage::VIDEO_PREFIX,
            recording::CONTAINER_EXTENSION,
            chrono::Local::now(),
        );
        let (width, height) = self.source.native_resolution();
        let writer = self.recorder.open(&path, width, height, self.framerate)?;

        info!(
            path = %path.display(),
            width,
            height,
            fps = self.framerate,
            orientation = locked.as_str(),
            "Recording started"
        );
        self.state.mode = PipelineMode::VideoRecording(RecordingSession {
            locked,
            writer,
            started: Instant::now(),
        });
        Ok(Some(path))
    }

    /// Flush and close the open recording
    ///
    /// Returns `Ok(None)` when nothing is recording. The session is gone
    /// afterwards even if closing the stream failed.
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>, RecordingError> {
        if !self.state.mode.is_recording() {
            debug!("Stop recording ignored, not recording");
            return Ok(None);
        }
        match std::mem::replace(&mut self.state.mode, PipelineMode::VideoIdle) {
            PipelineMode::VideoRecording(session) => session.finish().map(Some),
            other => {
                self.state.mode = other;
                Ok(None)
            }
        }
    }

    /// Save a raw frame from an independent read
    pub fn capture_photo(&mut self) -> Result<PathBuf, PhotoError> {
        self.photos.capture(&mut self.source)
    }

    fn apply_controls(&mut self, controls: &Controls, events: &mut Vec<PipelineEvent>) {
        let zoom = ZoomLevel::new(controls.zoom);
        if zoom != self.state.zoom {
            info!(from = self.state.zoom.value(), to = zoom.value(), "Zoom level changed");
            self.state.zoom = zoom;
        }

        if controls.stabilization_enabled != self.state.stabilization_enabled {
            info!(enabled = controls.stabilization_enabled, "Stabilization toggled");
            self.state.stabilization_enabled = controls.stabilization_enabled;
        }

        match self.set_video_mode(controls.video_mode) {
            Ok(Some(path)) => events.push(PipelineEvent::RecordingStopped(path)),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Failed to close recording on mode switch");
                events.push(PipelineEvent::ActionFailed(e.to_string()));
            }
        }
    }

    fn handle_action(&mut self, current: Orientation, events: &mut Vec<PipelineEvent>) {
        match self.state.mode {
            PipelineMode::Photo => match self.capture_photo() {
                Ok(path) => events.push(PipelineEvent::PhotoSaved(path)),
                Err(PhotoError::NoFrameAvailable) => events.push(PipelineEvent::PhotoSkipped),
                Err(e) => {
                    error!(error = %e, "Photo capture failed");
                    events.push(PipelineEvent::ActionFailed(e.to_string()));
                }
            },
            PipelineMode::VideoIdle => match self.start_recording(current) {
                Ok(Some(path)) => events.push(PipelineEvent::RecordingStarted(path)),
                Ok(None) => {}
                Err(e) => {
                    let reason = match e.as_encoder_failure() {
                        Some(encoder) => encoder.to_string(),
                        None => e.to_string(),
                    };
                    error!(error = %reason, "Failed to start recording");
                    events.push(PipelineEvent::ActionFailed(reason));
                }
            },
            PipelineMode::VideoRecording(_) => match self.stop_recording() {
                Ok(Some(path)) => events.push(PipelineEvent::RecordingStopped(path)),
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Failed to stop recording");
                    events.push(PipelineEvent::ActionFailed(e.to_string()));
                }
            },
        }
    }

    fn write_to_session(&mut self, frame: &Frame, events: &mut Vec<PipelineEvent>) {
        let PipelineMode::VideoRecording(session) = &mut self.state.mode else {
            return;
        };
        let Err(e) = session.writer.write_frame(frame) else {
            return;
        };

        // A writer that rejected a frame is not trusted with more
        error!(error = %e, "Recording write failed, closing session");
        events.push(PipelineEvent::ActionFailed(e.to_string()));
        match self.stop_recording() {
            Ok(Some(path)) => events.push(PipelineEvent::RecordingStopped(path)),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Recording could not be finalized");
                events.push(PipelineEvent::ActionFailed(e.to_string()));
            }
        }
    }

    fn drop_frame(&mut self, error: PipelineError, mut events: Vec<PipelineEvent>) -> TickOutput {
        warn!(error = %error, "Frame dropped");
        events.push(PipelineEvent::FrameDropped(error));
        TickOutput {
            frame: None,
            display: self.state.last_display.clone(),
            status: self.state.status,
            events,
        }
    }

    fn note_capture_failure(&mut self, error: &PipelineError) {
        let consecutive = match self.state.status {
            CaptureStatus::Live => 1,
            CaptureStatus::Unavailable { consecutive } => consecutive.saturating_add(1),
        };
        self.state.status = CaptureStatus::Unavailable { consecutive };
        if consecutive == timing::CAPTURE_LOST_TICKS {
            warn!(consecutive, error = %error, "Capture device unavailable");
        } else {
            debug!(consecutive, error = %error, "Capture read failed, skipping tick");
        }
    }

    fn note_capture_success(&mut self) {
        if let CaptureStatus::Unavailable { consecutive } = self.state.status {
            info!(after = consecutive, "Capture recovered");
            self.state.status = CaptureStatus::Live;
        }
    }
}

impl<S: CaptureSource, R: RecorderBackend> Drop for PipelineController<S, R> {
    fn drop(&mut self) {
        // An unfinished stream has no container index
        match self.stop_recording() {
            Ok(Some(path)) => info!(path = %path.display(), "Recording finalized on shutdown"),
            Ok(None) => {}
            Err(e) => error!(error = %e, "Failed to finalize recording on shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::ScriptedSource;
    use crate::pipelines::video::MemoryRecorder;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            photos_dir: dir.join("photos"),
            videos_dir: dir.join("videos"),
            ..Config::default()
        }
    }

    fn video(action: bool) -> Controls {
        Controls {
            video_mode: true,
            action_triggered: action,
            ..Controls::default()
        }
    }

    #[test]
    fn test_failed_read_skips_tick() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedSource::new((8, 4));
        let mut controller = PipelineController::new(source, MemoryRecorder::new(), &test_config(dir.path()));

        let output = controller.tick(&Controls::default());
        assert!(output.frame.is_none());
        assert!(output.display.is_none());
        assert_eq!(output.status, CaptureStatus::Unavailable { consecutive: 1 });
    }

    #[test]
    fn test_status_becomes_persistent_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new((8, 4));
        for _ in 0..timing::CAPTURE_LOST_TICKS {
            source.push_unavailable();
        }
        source.push_frame(Frame::solid(8, 4, [1, 1, 1]));
        let mut controller = PipelineController::new(source, MemoryRecorder::new(), &test_config(dir.path()));

        let mut last = TickOutput::default();
        for _ in 0..timing::CAPTURE_LOST_TICKS {
            last = controller.tick(&Controls::default());
        }
        assert!(last.status.is_persistent());

        let recovered = controller.tick(&Controls::default());
        assert_eq!(recovered.status, CaptureStatus::Live);
        assert!(recovered.frame.is_some());
    }

    #[test]
    fn test_pending_action_survives_failed_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new((8, 4));
        source.push_unavailable();
        source.push_frame(Frame::solid(8, 4, [1, 1, 1]));
        let recorder = MemoryRecorder::new();
        let mut controller = PipelineController::new(source, recorder.clone(), &test_config(dir.path()));

        let first = controller.tick(&video(true));
        assert!(first.events.is_empty());
        assert!(!controller.is_recording());

        let second = controller.tick(&video(false));
        assert!(controller.is_recording());
        assert!(matches!(second.events.as_slice(), [PipelineEvent::RecordingStarted(_)]));
        assert_eq!(recorder.stats().frames_written, 1);
    }

    #[test]
    fn test_leaving_video_mode_stops_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new((8, 4));
        source.push_frame(Frame::solid(8, 4, [1, 1, 1]));
        let recorder = MemoryRecorder::new();
        let mut controller = PipelineController::new(source, recorder.clone(), &test_config(dir.path()));

        controller.tick(&video(true));
        assert!(controller.is_recording());

        // Script is exhausted: the stop must still happen before the read
        let output = controller.tick(&Controls::default());
        assert!(matches!(output.events.as_slice(), [PipelineEvent::RecordingStopped(_)]));
        assert!(matches!(controller.state().mode, PipelineMode::Photo));
        assert_eq!(recorder.stats().streams_closed, 1);
    }

    #[test]
    fn test_dropping_controller_finalizes_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new((8, 4));
        source.push_frame(Frame::solid(8, 4, [1, 1, 1]));
        let recorder = MemoryRecorder::new();
        let mut controller = PipelineController::new(source, recorder.clone(), &test_config(dir.path()));

        controller.tick(&video(true));
        assert!(controller.is_recording());
        assert_eq!(recorder.stats().streams_closed, 0);

        drop(controller);
        assert_eq!(recorder.stats().streams_closed, 1);
    }

    #[test]
    fn test_dropping_idle_controller_closes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = MemoryRecorder::new();
        let controller =
            PipelineController::new(ScriptedSource::new((8, 4)), recorder.clone(), &test_config(dir.path()));
        drop(controller);
        assert_eq!(recorder.stats().streams_opened, 0);
        assert_eq!(recorder.stats().streams_closed, 0);
    }

    #[test]
    fn test_start_failure_stays_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new((8, 4));
        source.push_frame(Frame::solid(8, 4, [1, 1, 1]));
        let mut controller =
            PipelineController::new(source, MemoryRecorder::failing(), &test_config(dir.path()));

        let output = controller.tick(&video(true));
        assert!(matches!(controller.state().mode, PipelineMode::VideoIdle));
        match output.events.as_slice() {
            [PipelineEvent::ActionFailed(reason)] => {
                assert!(reason.starts_with("Encoder initialization failed"), "{}", reason)
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert!(output.frame.is_some(), "the frame is still displayed");
    }

    #[test]
    fn test_stabilizer_only_runs_in_video_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new((8, 4));
        source.push_frame(Frame::solid(8, 4, [10, 10, 10]));
        source.push_frame(Frame::solid(8, 4, [20, 20, 20]));
        let mut controller = PipelineController::new(source, MemoryRecorder::new(), &test_config(dir.path()));
        let controls = Controls {
            stabilization_enabled: true,
            ..Controls::default()
        };

        controller.tick(&controls);
        let output = controller.tick(&controls);
        assert_eq!(output.frame.unwrap(), Frame::solid(8, 4, [20, 20, 20]));
    }
}
