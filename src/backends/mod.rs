// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: capture sources (V4L2 devices, still images, scripted sequences)

pub mod camera;
