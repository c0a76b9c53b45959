// SPDX-License-Identifier: MPL-2.0

//! Recorder backend that keeps everything in memory
//!
//! Used for dry runs and tests. Nothing touches the disk; the backend only
//! counts what it was asked to do.

use super::recorder::{FrameWriter, RecorderBackend};
use crate::backends::camera::Frame;
use crate::errors::RecordingError;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Counters shared between a [`MemoryRecorder`] and its writers
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecorderStats {
    pub streams_opened: usize,
    pub streams_closed: usize,
    pub frames_written: u64,
    /// Size of every frame written, after fitting to the stream
    pub frame_sizes: Vec<(u32, u32)>,
    /// Stream size and path of every open request that succeeded
    pub opened: Vec<((u32, u32), PathBuf)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    stats: Rc<RefCell<RecorderStats>>,
    fail_open: bool,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every open request fails
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats.borrow().clone()
    }
}

impl RecorderBackend for MemoryRecorder {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn FrameWriter>, RecordingError> {
        if self.fail_open {
            return Err(RecordingError::EncoderNotAvailable(
                "memory recorder configured to fail".to_string(),
            ));
        }
        debug!(width, height, fps, path = %path.display(), "Opening memory stream");
        let mut stats = self.stats.borrow_mut();
        stats.streams_opened += 1;
        stats.opened.push(((width, height), path.to_path_buf()));
        Ok(Box::new(MemoryWriter {
            stats: Rc::clone(&self.stats),
            path: path.to_path_buf(),
            size: (width, height),
            frames: 0,
        }))
    }
}

struct MemoryWriter {
    stats: Rc<RefCell<RecorderStats>>,
    path: PathBuf,
    size: (u32, u32),
    frames: u64,
}

impl FrameWriter for MemoryWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let frame = super::recorder::fit_to_stream(frame, self.size);
        let mut stats = self.stats.borrow_mut();
        stats.frames_written += 1;
        stats.frame_sizes.push(frame.dimensions());
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<PathBuf, RecordingError> {
        self.stats.borrow_mut().streams_closed += 1;
        Ok(self.path.clone())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}
