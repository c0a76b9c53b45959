// SPDX-License-Identifier: MPL-2.0

//! Media encoder selection and configuration
//!
//! This module provides centralized H.264 encoder selection with:
//! - Hardware encoder priority (VA-API, NVENC, V4L2)
//! - Software fallbacks for maximum compatibility
//! - Bitrate presets scaled by resolution

pub mod video;

pub use video::{EncoderSpec, SelectedVideoEncoder, available_encoders, select_h264_encoder};
