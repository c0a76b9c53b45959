// SPDX-License-Identifier: GPL-3.0-only

//! Resampling primitives
//!
//! Two kinds of images flow through here: RGB8 frames (remap, translation)
//! and single-channel `f32` planes used by the optical flow estimator
//! (blur, resize). Plane filtering is done by `image::imageops` on
//! floating point buffers; RGB remapping fills out-of-bounds samples with
//! black and runs one output row per rayon task.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use rayon::prelude::*;

/// Floating point luminance buffer
pub type LumaF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Single-channel floating point image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    image: LumaF32,
}

impl Plane {
    /// Plane filled with zeros
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            image: ImageBuffer::new(width as u32, height as u32),
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        Self {
            image: ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
                Luma([f(x as usize, y as usize)])
            }),
        }
    }

    /// Promote an 8-bit luminance image to the unit range
    pub fn from_luma(image: &GrayImage) -> Self {
        Self {
            image: ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
                Luma([image.get_pixel(x, y).0[0] as f32 / 255.0])
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.image.width() as usize
    }

    pub fn height(&self) -> usize {
        self.image.height() as usize
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.image.as_raw()[y * self.width() + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        let width = self.width();
        let data: &mut [f32] = &mut self.image;
        data[y * width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[f32] {
        let width = self.width();
        &self.image.as_raw()[y * width..(y + 1) * width]
    }

    pub fn mean(&self) -> f64 {
        let data = self.image.as_raw();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64
    }

    pub fn scale_in_place(&mut self, factor: f32) {
        let data: &mut [f32] = &mut self.image;
        for v in data.iter_mut() {
            *v *= factor;
        }
    }

    /// Linear (triangle) resize of a unit-range plane
    ///
    /// `imageops` clamps floating point output to `[0, 1]`; signed fields
    /// go through [`Plane::resize_bilinear`] instead.
    pub fn resize(&self, width: usize, height: usize) -> Plane {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        Self {
            image: imageops::resize(&self.image, width as u32, height as u32, FilterType::Triangle),
        }
    }

    /// Gaussian blur of a unit-range plane
    pub fn gaussian_blur(&self, sigma: f32) -> Plane {
        Self {
            image: imageops::blur(&self.image, sigma),
        }
    }

    /// Unclamped bilinear resize with pixel-center alignment
    ///
    /// Destination pixel `d` samples source coordinate `(d + 0.5) * scale - 0.5`,
    /// with coordinates clamped to the edge.
    pub fn resize_bilinear(&self, width: usize, height: usize) -> Plane {
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        let scale_x = self.width() as f64 / width as f64;
        let scale_y = self.height() as f64 / height as f64;

        let xs: Vec<(usize, usize, f32)> = (0..width)
            .map(|x| axis_taps((x as f64 + 0.5) * scale_x - 0.5, self.width()))
            .collect();

        let mut out = Plane::zeros(width, height);
        for y in 0..height {
            let (y0, y1, fy) = axis_taps((y as f64 + 0.5) * scale_y - 0.5, self.height());
            let row0 = self.row(y0);
            let row1 = self.row(y1);
            for (x, &(x0, x1, fx)) in xs.iter().enumerate() {
                let top = row0[x0] * (1.0 - fx) + row0[x1] * fx;
                let bottom = row1[x0] * (1.0 - fx) + row1[x1] * fx;
                out.set(x, y, top * (1.0 - fy) + bottom * fy);
            }
        }
        out
    }
}

/// Neighbor indices and blend weight for a source coordinate
#[inline]
fn axis_taps(coord: f64, len: usize) -> (usize, usize, f32) {
    let floor = coord.floor();
    let frac = (coord - floor) as f32;
    let i0 = floor as isize;
    if i0 < 0 {
        return (0, 0, 0.0);
    }
    let i0 = i0 as usize;
    if i0 + 1 >= len {
        return (len - 1, len - 1, 0.0);
    }
    (i0, i0 + 1, frac)
}

/// Bilinear RGB sample; taps outside the image contribute black
#[inline]
pub fn sample_bilinear(src: &RgbImage, x: f64, y: f64) -> [u8; 3] {
    let (width, height) = (src.width() as i64, src.height() as i64);
    let raw = src.as_raw();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 3];
    for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
        let sy = y0 + dy;
        if wy == 0.0 || sy < 0 || sy >= height {
            continue;
        }
        for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
            let sx = x0 + dx;
            let weight = wx * wy;
            if weight == 0.0 || sx < 0 || sx >= width {
                continue;
            }
            let i = ((sy * width + sx) * 3) as usize;
            for c in 0..3 {
                acc[c] += raw[i + c] as f64 * weight;
            }
        }
    }
    acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Build a `width`x`height` image by sampling `src` at `map(x, y)`
pub fn remap(
    src: &RgbImage,
    width: u32,
    height: u32,
    map: impl Fn(u32, u32) -> (f64, f64) + Sync,
) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    let row_bytes = width as usize * 3;
    if row_bytes == 0 {
        return out;
    }
    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let (sx, sy) = map(x as u32, y as u32);
                px.copy_from_slice(&sample_bilinear(src, sx, sy));
            }
        });
    out
}

/// Source taps and weights along one axis for a constant shift
///
/// Output index `i` reads `i + offset` with weight `1 - frac` and
/// `i + offset + 1` with weight `frac`.
fn shift_taps(shift: f64) -> (i64, f64) {
    let source = -shift;
    let offset = source.floor();
    (offset as i64, source - offset)
}

/// Shift image content by `(dx, dy)` pixels, keeping dimensions
///
/// Equivalent to an affine warp with matrix `[[1, 0, dx], [0, 1, dy]]`
/// and a black border. The bilinear weights are the same for every pixel.
pub fn translate(src: &RgbImage, dx: f64, dy: f64) -> RgbImage {
    #[cfg(feature = "opencv")]
    {
        match crate::media::cv::translate(src, dx, dy) {
            Ok(image) => return image,
            Err(e) => tracing::warn!(error = %e, "OpenCV warp failed, using built-in translation"),
        }
    }

    let (width, height) = (src.width() as i64, src.height() as i64);
    let mut out = RgbImage::new(src.width(), src.height());
    let row_bytes = width as usize * 3;
    if row_bytes == 0 {
        return out;
    }

    let (ox, fx) = shift_taps(dx);
    let (oy, fy) = shift_taps(dy);
    let raw = src.as_raw();
    let x_taps = [(0, 1.0 - fx), (1, fx)];
    let y_taps = [(0, 1.0 - fy), (1, fy)];

    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let x = x as i64;
                let mut acc = [0.0f64; 3];
                for (ty, wy) in y_taps {
                    let sy = y + oy + ty;
                    if wy == 0.0 || sy < 0 || sy >= height {
                        continue;
                    }
                    for (tx, wx) in x_taps {
                        let sx = x + ox + tx;
                        if wx == 0.0 || sx < 0 || sx >= width {
                            continue;
                        }
                        let i = ((sy * width + sx) * 3) as usize;
                        let weight = wx * wy;
                        for c in 0..3 {
                            acc[c] += raw[i + c] as f64 * weight;
                        }
                    }
                }
                for c in 0..3 {
                    px[c] = acc[c].round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    out
}
