// SPDX-License-Identifier: MPL-2.0

//! Low-level media processing used by the pipelines
//!
//! # Resampling
//!
//! [`resample`] holds the pixel-level building blocks: bilinear remapping of
//! RGB frames with a black border, translation, and blur/resize of
//! floating point luminance planes.
//!
//! # Lens model
//!
//! [`lens`] models a pinhole camera with radial/tangential distortion and
//! computes the refit camera matrix and valid-pixel region used by the
//! wide-angle emulation.
//!
//! # Optical flow
//!
//! [`optical_flow`] estimates a dense displacement field between two
//! luminance planes with a coarse-to-fine polynomial expansion method.
//!
//! # Video Encoding
//!
//! [`encoders`] selects and configures an H.264 encoder for recordings.
//!
//! # OpenCV
//!
//! With the `opencv` feature, `cv` provides OpenCV-backed flow, undistortion
//! and warping. The modules above call it first and keep their own code as
//! the fallback.

#[cfg(feature = "opencv")]
pub mod cv;
pub mod encoders;
pub mod lens;
pub mod optical_flow;
pub mod resample;

pub use lens::{CameraMatrix, DistortionCoefficients, Roi};
pub use optical_flow::{FlowField, FlowParams, dense_flow, mean_flow};
pub use resample::Plane;
