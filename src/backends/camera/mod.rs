// SPDX-License-Identifier: MPL-2.0

//! Capture collaborators
//!
//! The frame pipeline only needs two things from a camera: the next decoded
//! frame and the device's native resolution. Everything device-specific
//! (format negotiation, buffer management, decoding) lives behind
//! [`CaptureSource`].
//!
//! ```text
//! ┌─────────────────────┐
//! │ PipelineController  │
//! └──────────┬──────────┘
//!            │ read_frame()
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureSource Trait │
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴───────┬──────────────┐
//!     ▼              ▼              ▼
//! ┌────────┐  ┌────────────┐  ┌──────────┐
//! │  V4L2  │  │ StillImage │  │ Scripted │
//! └────────┘  └────────────┘  └──────────┘
//! ```

pub mod format_converters;
pub mod still;
pub mod types;
pub mod v4l2;

pub use still::{ScriptedSource, StillImageSource};
pub use types::*;
pub use v4l2::{V4l2Source, enumerate_devices};

use crate::errors::PipelineResult;

/// Source of decoded frames
///
/// Reads are synchronous; a failed read is reported as
/// `PipelineError::CaptureUnavailable` and the caller simply tries again on
/// the next tick.
pub trait CaptureSource {
    /// Read the next frame
    fn read_frame(&mut self) -> PipelineResult<Frame>;

    /// Resolution the device was opened at
    fn native_resolution(&self) -> (u32, u32);
}

impl<T: CaptureSource + ?Sized> CaptureSource for Box<T> {
    fn read_frame(&mut self) -> PipelineResult<Frame> {
        (**self).read_frame()
    }

    fn native_resolution(&self) -> (u32, u32) {
        (**self).native_resolution()
    }
}
