// SPDX-License-Identifier: GPL-3.0-only

//! Pinhole camera model with radial/tangential distortion
//!
//! Coordinates are normalized image coordinates unless stated otherwise:
//! `x = (u - cx) / fx`, `y = (v - cy) / fy`. The distortion model is the
//! usual Brown-Conrady form truncated to two radial and two tangential terms.
//! The `opencv` feature routes the refit and the remap through `calib3d`.

use crate::constants::lens as consts;
use crate::media::resample;
use image::RgbImage;

/// Intrinsic camera matrix (no skew)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraMatrix {
    /// Synthetic camera for a `width`x`height` image
    ///
    /// Focal lengths equal the image dimensions and the principal point sits
    /// at the image center.
    pub fn synthetic(width: u32, height: u32) -> Self {
        Self {
            fx: width as f64,
            fy: height as f64,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }

    #[inline]
    pub fn normalize(&self, u: f64, v: f64) -> (f64, f64) {
        ((u - self.cx) / self.fx, (v - self.cy) / self.fy)
    }

    #[inline]
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        (self.fx * x + self.cx, self.fy * y + self.cy)
    }
}

/// Distortion coefficients `(k1, k2, p1, p2)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistortionCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
}

impl DistortionCoefficients {
    /// Radial-only coefficients scaled linearly by `intensity`
    pub fn from_intensity(intensity: f64) -> Self {
        Self {
            k1: consts::K1_PER_INTENSITY * intensity,
            k2: consts::K2_PER_INTENSITY * intensity,
            p1: 0.0,
            p2: 0.0,
        }
    }

    /// Apply the forward distortion model to a normalized point
    #[inline]
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        (xd, yd)
    }

    /// Invert the distortion model by fixed-point iteration
    ///
    /// If the radial factor turns negative the model is not invertible at
    /// that radius and the distorted point is returned unchanged.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..consts::UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let icdist = 1.0 / (1.0 + self.k1 * r2 + self.k2 * r2 * r2);
            if icdist < 0.0 {
                return (xd, yd);
            }
            let delta_x = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let delta_y = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (xd - delta_x) * icdist;
            y = (yd - delta_y) * icdist;
        }
        (x, y)
    }
}

/// Integer pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Floating point rectangle (origin + size)
#[derive(Debug, Clone, Copy, PartialEq)]
struct RectF {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl RectF {
    /// Shrink to whole pixels inside the rectangle and intersect with
    /// `[0, width) x [0, height)`
    fn to_roi(self, width: u32, height: u32) -> Roi {
        // Absorbs round-off on edges that fall exactly on a pixel boundary
        const SNAP: f64 = 1e-6;
        let x0 = (self.x - SNAP).ceil() as i64;
        let y0 = (self.y - SNAP).ceil() as i64;
        let x1 = (self.x + self.width + SNAP).floor() as i64;
        let y1 = (self.y + self.height + SNAP).floor() as i64;

        let cx0 = x0.max(0);
        let cy0 = y0.max(0);
        let cx1 = x1.min(width as i64);
        let cy1 = y1.min(height as i64);
        if cx1 <= cx0 || cy1 <= cy0 {
            return Roi::default();
        }
        Roi {
            x: cx0 as u32,
            y: cy0 as u32,
            width: (cx1 - cx0) as u32,
            height: (cy1 - cy0) as u32,
        }
    }
}

/// Inscribed and circumscribed rectangles of the undistorted image border
///
/// A grid of points spanning the distorted image is undistorted and then
/// mapped through `project` (normalized coordinates when `None`). The inner
/// rectangle only contains valid pixels; the outer one contains all of them.
fn undistorted_rectangles(
    camera: &CameraMatrix,
    dist: &DistortionCoefficients,
    (width, height): (u32, u32),
    project: Option<&CameraMatrix>,
) -> (RectF, RectF) {
    let n = consts::RECT_SAMPLE_GRID;
    let step_x = (width as f64 - 1.0) / (n - 1) as f64;
    let step_y = (height as f64 - 1.0) / (n - 1) as f64;

    let (mut ix0, mut ix1, mut iy0, mut iy1) =
        (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) =
        (f64::MAX, f64::MIN, f64::MAX, f64::MIN);

    for gy in 0..n {
        for gx in 0..n {
            let (xd, yd) = camera.normalize(gx as f64 * step_x, gy as f64 * step_y);
            let (x, y) = dist.undistort(xd, yd);
            let (px, py) = match project {
                Some(p) => p.project(x, y),
                None => (x, y),
            };

            ox0 = ox0.min(px);
            ox1 = ox1.max(px);
            oy0 = oy0.min(py);
            oy1 = oy1.max(py);
            if gx == 0 {
                ix0 = ix0.max(px);
            }
            if gx == n - 1 {
                ix1 = ix1.min(px);
            }
            if gy == 0 {
                iy0 = iy0.max(py);
            }
            if gy == n - 1 {
                iy1 = iy1.min(py);
            }
        }
    }

    (
        RectF {
            x: ix0,
            y: iy0,
            width: ix1 - ix0,
            height: iy1 - iy0,
        },
        RectF {
            x: ox0,
            y: oy0,
            width: ox1 - ox0,
            height: oy1 - oy0,
        },
    )
}

/// Camera matrix that frames the undistorted image, plus its valid-pixel ROI
///
/// `alpha` blends between the inscribed view (0.0, no invalid pixels) and the
/// circumscribed view (1.0, every source pixel kept). The ROI is the inscribed
/// rectangle expressed in the new camera's pixel coordinates, clipped to the
/// image.
pub fn optimal_new_camera_matrix(
    camera: &CameraMatrix,
    dist: &DistortionCoefficients,
    size: (u32, u32),
    alpha: f64,
) -> (CameraMatrix, Roi) {
    #[cfg(feature = "opencv")]
    {
        match crate::media::cv::optimal_new_camera_matrix(camera, dist, size, alpha) {
            Ok(refit) => return refit,
            Err(e) => tracing::warn!(error = %e, "OpenCV camera refit failed, using built-in model"),
        }
    }

    let (inner, outer) = undistorted_rectangles(camera, dist, size, None);
    let (w, h) = (size.0 as f64, size.1 as f64);

    let fx0 = (w - 1.0) / inner.width;
    let fy0 = (h - 1.0) / inner.height;
    let cx0 = -fx0 * inner.x;
    let cy0 = -fy0 * inner.y;

    let fx1 = (w - 1.0) / outer.width;
    let fy1 = (h - 1.0) / outer.height;
    let cx1 = -fx1 * outer.x;
    let cy1 = -fy1 * outer.y;

    let new_camera = CameraMatrix {
        fx: fx0 * (1.0 - alpha) + fx1 * alpha,
        fy: fy0 * (1.0 - alpha) + fy1 * alpha,
        cx: cx0 * (1.0 - alpha) + cx1 * alpha,
        cy: cy0 * (1.0 - alpha) + cy1 * alpha,
    };

    let (valid, _) = undistorted_rectangles(camera, dist, size, Some(&new_camera));
    (new_camera, valid.to_roi(size.0, size.1))
}

/// Remove lens distortion, rendering through `new_camera`
///
/// Each output pixel is back-projected through `new_camera`, distorted, and
/// sampled from `src` through `camera`. Samples that land outside the source
/// are black.
pub fn undistort(
    src: &RgbImage,
    camera: &CameraMatrix,
    dist: &DistortionCoefficients,
    new_camera: &CameraMatrix,
) -> RgbImage {
    #[cfg(feature = "opencv")]
    {
        match crate::media::cv::undistort(src, camera, dist, new_camera) {
            Ok(image) => return image,
            Err(e) => tracing::warn!(error = %e, "OpenCV undistort failed, using built-in remap"),
        }
    }

    resample::remap(src, src.width(), src.height(), |u, v| {
        let (x, y) = new_camera.normalize(u as f64, v as f64);
        let (xd, yd) = dist.distort(x, y);
        camera.project(xd, yd)
    })
}
