// SPDX-License-Identifier: GPL-3.0-only

//! File-backed and scripted capture sources
//!
//! `StillImageSource` repeats one decoded image forever, which is enough to
//! drive the pipeline offline. `ScriptedSource` replays a fixed sequence of
//! reads (frames or failures) for deterministic runs.

use super::CaptureSource;
use super::types::Frame;
use crate::errors::{PipelineError, PipelineResult};
use std::collections::VecDeque;
use std::path::Path;
use tracing::info;

/// Serves a single image file as a constant frame stream
#[derive(Debug, Clone)]
pub struct StillImageSource {
    frame: Frame,
}

impl StillImageSource {
    /// Decode `path` into an RGB frame
    pub fn open(path: &Path) -> PipelineResult<Self> {
        let image = image::open(path).map_err(|e| {
            PipelineError::CaptureUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let frame = Frame::from_image(image.to_rgb8());
        frame.ensure_valid()?;
        info!(path = %path.display(), width = frame.width(), height = frame.height(), "Opened still image source");
        Ok(Self { frame })
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame }
    }
}

impl CaptureSource for StillImageSource {
    fn read_frame(&mut self) -> PipelineResult<Frame> {
        Ok(self.frame.clone())
    }

    fn native_resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}

/// One scripted read result
#[derive(Debug, Clone)]
pub enum ScriptedRead {
    Frame(Frame),
    Unavailable,
}

/// Replays queued reads in order, then reports the device as gone
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    reads: VecDeque<ScriptedRead>,
    resolution: (u32, u32),
    reads_served: usize,
}

impl ScriptedSource {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self {
            reads: VecDeque::new(),
            resolution,
            reads_served: 0,
        }
    }

    /// Queue a successful read
    pub fn push_frame(&mut self, frame: Frame) -> &mut Self {
        self.reads.push_back(ScriptedRead::Frame(frame));
        self
    }

    /// Queue a failed read
    pub fn push_unavailable(&mut self) -> &mut Self {
        self.reads.push_back(ScriptedRead::Unavailable);
        self
    }

    /// Reads still queued
    pub fn remaining(&self) -> usize {
        self.reads.len()
    }

    /// Reads consumed so far, successful or not
    pub fn reads_served(&self) -> usize {
        self.reads_served
    }
}

impl CaptureSource for ScriptedSource {
    fn read_frame(&mut self) -> PipelineResult<Frame> {
        self.reads_served += 1;
        match self.reads.pop_front() {
            Some(ScriptedRead::Frame(frame)) => Ok(frame),
            Some(ScriptedRead::Unavailable) => {
                Err(PipelineError::CaptureUnavailable("scripted failure".into()))
            }
            None => Err(PipelineError::CaptureUnavailable("script exhausted".into())),
        }
    }

    fn native_resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_replays_in_order() {
        let mut source = ScriptedSource::new((4, 2));
        source
            .push_frame(Frame::solid(4, 2, [1, 2, 3]))
            .push_unavailable();

        assert!(source.read_frame().is_ok());
        assert!(matches!(
            source.read_frame(),
            Err(PipelineError::CaptureUnavailable(_))
        ));
        assert!(source.read_frame().is_err(), "exhausted script keeps failing");
        assert_eq!(source.reads_served(), 3);
    }

    #[test]
    fn test_still_image_source_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        Frame::solid(6, 4, [10, 20, 30]).as_image().save(&path).unwrap();

        let mut source = StillImageSource::open(&path).unwrap();
        assert_eq!(source.native_resolution(), (6, 4));
        let frame = source.read_frame().unwrap();
        assert_eq!(frame.as_image().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_still_image_source_missing_file() {
        let result = StillImageSource::open(Path::new("/nonexistent/viewfinder.png"));
        assert!(matches!(result, Err(PipelineError::CaptureUnavailable(_))));
    }
}
