// SPDX-License-Identifier: MPL-2.0

//! Video recording
//!
//! The controller talks to recorders through [`RecorderBackend`], which
//! opens one [`FrameWriter`] per recording session. [`GstRecorderBackend`]
//! writes MP4 files with the best available H.264 encoder;
//! [`MemoryRecorder`] only counts.

pub mod memory;
pub mod muxer;
pub mod recorder;

pub use memory::{MemoryRecorder, RecorderStats};
pub use recorder::{FrameWriter, GstRecorderBackend, GstVideoWriter, RecorderBackend, fit_to_stream};
