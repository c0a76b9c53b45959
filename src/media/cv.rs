// SPDX-License-Identifier: GPL-3.0-only

//! OpenCV-backed versions of the image math
//!
//! Compiled with the `opencv` feature. Callers fall back to the built-in
//! implementations when a call here fails.

use crate::media::lens::{CameraMatrix, DistortionCoefficients, Roi};
use crate::media::optical_flow::FlowParams;
use image::{GrayImage, RgbImage};
use opencv::core::{self, Mat, Rect, Scalar, Size};
use opencv::prelude::*;
use opencv::{calib3d, imgproc, video};

fn mat_from_bytes(rows: u32, cols: u32, typ: i32, bytes: &[u8]) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(rows as i32, cols as i32, typ, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(bytes);
    Ok(mat)
}

fn rgb_to_mat(image: &RgbImage) -> opencv::Result<Mat> {
    mat_from_bytes(image.height(), image.width(), core::CV_8UC3, image.as_raw())
}

fn gray_to_mat(image: &GrayImage) -> opencv::Result<Mat> {
    mat_from_bytes(image.height(), image.width(), core::CV_8UC1, image.as_raw())
}

fn mat_to_rgb(mat: &Mat) -> opencv::Result<RgbImage> {
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    RgbImage::from_raw(width, height, mat.data_bytes()?.to_vec()).ok_or_else(|| {
        opencv::Error::new(
            core::StsUnmatchedSizes,
            format!("{}x{} RGB buffer does not match the matrix", width, height),
        )
    })
}

fn camera_to_mat(camera: &CameraMatrix) -> opencv::Result<Mat> {
    Mat::from_slice_2d(&[
        [camera.fx, 0.0, camera.cx],
        [0.0, camera.fy, camera.cy],
        [0.0, 0.0, 1.0],
    ])
}

fn distortion_to_mat(dist: &DistortionCoefficients) -> opencv::Result<Mat> {
    Mat::from_slice_2d(&[[dist.k1, dist.k2, dist.p1, dist.p2]])
}

/// Mean Farneback flow from `prev` to `next`
pub fn mean_flow(prev: &GrayImage, next: &GrayImage, params: &FlowParams) -> opencv::Result<(f64, f64)> {
    let prev = gray_to_mat(prev)?;
    let next = gray_to_mat(next)?;
    let mut flow = Mat::default();
    video::calc_optical_flow_farneback(
        &prev,
        &next,
        &mut flow,
        params.pyramid_scale,
        params.levels as i32,
        params.window_size as i32,
        params.iterations as i32,
        params.poly_n as i32,
        params.poly_sigma,
        0,
    )?;
    let mean = core::mean(&flow, &core::no_array())?;
    Ok((mean[0], mean[1]))
}

/// Refit camera matrix and valid-pixel ROI for `alpha`
pub fn optimal_new_camera_matrix(
    camera: &CameraMatrix,
    dist: &DistortionCoefficients,
    (width, height): (u32, u32),
    alpha: f64,
) -> opencv::Result<(CameraMatrix, Roi)> {
    let size = Size::new(width as i32, height as i32);
    let mut valid = Rect::default();
    let refit = calib3d::get_optimal_new_camera_matrix(
        &camera_to_mat(camera)?,
        &distortion_to_mat(dist)?,
        size,
        alpha,
        size,
        &mut valid,
        false,
    )?;
    let new_camera = CameraMatrix {
        fx: *refit.at_2d::<f64>(0, 0)?,
        fy: *refit.at_2d::<f64>(1, 1)?,
        cx: *refit.at_2d::<f64>(0, 2)?,
        cy: *refit.at_2d::<f64>(1, 2)?,
    };
    let roi = Roi {
        x: valid.x.max(0) as u32,
        y: valid.y.max(0) as u32,
        width: valid.width.max(0) as u32,
        height: valid.height.max(0) as u32,
    };
    Ok((new_camera, roi))
}

/// Remove lens distortion, rendering through `new_camera`
pub fn undistort(
    src: &RgbImage,
    camera: &CameraMatrix,
    dist: &DistortionCoefficients,
    new_camera: &CameraMatrix,
) -> opencv::Result<RgbImage> {
    let input = rgb_to_mat(src)?;
    let mut output = Mat::default();
    calib3d::undistort(
        &input,
        &mut output,
        &camera_to_mat(camera)?,
        &distortion_to_mat(dist)?,
        &camera_to_mat(new_camera)?,
    )?;
    mat_to_rgb(&output)
}

/// Affine shift by `(dx, dy)` with a black border
pub fn translate(src: &RgbImage, dx: f64, dy: f64) -> opencv::Result<RgbImage> {
    let input = rgb_to_mat(src)?;
    let transform = Mat::from_slice_2d(&[[1.0, 0.0, dx], [0.0, 1.0, dy]])?;
    let mut output = Mat::default();
    imgproc::warp_affine(
        &input,
        &mut output,
        &transform,
        input.size()?,
        imgproc::INTER_LINEAR,
        core::BORDER_CONSTANT,
        Scalar::default(),
    )?;
    mat_to_rgb(&output)
}
