// SPDX-License-Identifier: MPL-2.0

//! Viewfinder - a live camera frame pipeline
//!
//! This library provides the per-frame transforms of a camera viewfinder
//! (orientation correction, wide-angle emulation, digital zoom and motion
//! stabilization) together with the controller that runs them once per
//! tick and feeds photo and video sinks.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture sources (V4L2, still images, scripted)
//! - [`media`]: Resampling, lens model, optical flow and video encoders
//! - [`pipelines`]: Viewfinder transforms, photo and video sinks, controller
//! - [`config`]: User configuration handling
//! - [`storage`]: Output directories and file naming
//! - [`terminal`]: Terminal host driving the controller
//!
//! # Example
//!
//! ```no_run
//! use viewfinder::backends::camera::V4l2Source;
//! use viewfinder::pipelines::video::GstRecorderBackend;
//! use viewfinder::pipelines::{Controls, PipelineController};
//! use viewfinder::Config;
//!
//! let config = Config::load_or_default();
//! let source = V4l2Source::open(0, 1280, 720)?;
//! let mut controller =
//!     PipelineController::new(source, GstRecorderBackend::default(), &config);
//! let _output = controller.tick(&Controls { zoom: 2.0, ..Controls::default() });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use backends::camera::{CaptureSource, DisplayFrame, Frame};
pub use config::Config;
pub use constants::BitratePreset;
pub use errors::{AppError, AppResult, PipelineError, PipelineResult};
pub use pipelines::{Controls, PipelineController, PipelineEvent, TickOutput};
