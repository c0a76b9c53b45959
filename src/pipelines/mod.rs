// SPDX-License-Identifier: MPL-2.0

//! Frame processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ CaptureSource│ ──▶ │    Viewfinder     │ ──▶ │   Display    │
//! │   (RGB)      │     │  - Orientation    │     │  (RGB24,     │
//! │              │     │  - Zoom path      │     │  bottom-up)  │
//! │              │     │  - Stabilizer     │     │              │
//! └──────────────┘     └─────────┬─────────┘     └──────────────┘
//!        │                       │
//!        │                       ▼
//!        │             ┌───────────────────┐     ┌──────────────┐
//!        │             │  Video Pipeline   │ ──▶ │   MP4 File   │
//!        │             │  - GStreamer      │     │              │
//!        │             │  - H.264 encoding │     │              │
//!        │             └───────────────────┘     └──────────────┘
//!        │
//!        ▼             ┌───────────────────┐     ┌──────────────┐
//!   independent read ▶ │  Photo Pipeline   │ ──▶ │  JPEG File   │
//!                      └───────────────────┘     └──────────────┘
//! ```
//!
//! Everything runs synchronously on the thread that calls
//! [`controller::PipelineController::tick`].
//!
//! # Modules
//!
//! - [`viewfinder`]: per-frame transforms
//! - [`photo`]: raw still capture and encoding
//! - [`video`]: recording backends
//! - [`controller`]: tick orchestration and session state

pub mod controller;
pub mod photo;
pub mod video;
pub mod viewfinder;

pub use controller::{
    CaptureStatus, Controls, PipelineController, PipelineEvent, PipelineMode, PipelineState,
    RecordingSession, TickOutput,
};
