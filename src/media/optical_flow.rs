// SPDX-License-Identifier: GPL-3.0-only

//! Dense optical flow by polynomial expansion
//!
//! Each neighborhood of both images is approximated by a quadratic
//! polynomial. The displacement that best maps the first polynomial onto the
//! second is solved per pixel from windowed normal equations, refined over a
//! few iterations and a coarse-to-fine image pyramid.
//!
//! The estimated field maps `prev` onto `next`: `prev(p) ~ next(p + flow(p))`.
//!
//! With the `opencv` feature, [`mean_flow`] runs OpenCV's Farneback
//! implementation and falls back to this module if the call fails.

use crate::constants::optical_flow as consts;
use crate::media::resample::Plane;
use image::GrayImage;

/// Flow estimator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParams {
    /// Scale between pyramid levels, < 1
    pub pyramid_scale: f64,
    /// Levels above the base image
    pub levels: usize,
    /// Averaging window size (odd)
    pub window_size: usize,
    /// Refinement iterations per level
    pub iterations: usize,
    /// Half-width of the polynomial expansion neighborhood
    pub poly_n: usize,
    /// Gaussian sigma weighting the expansion
    pub poly_sigma: f64,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            pyramid_scale: consts::PYRAMID_SCALE,
            levels: consts::PYRAMID_LEVELS,
            window_size: consts::WINDOW_SIZE,
            iterations: consts::ITERATIONS,
            poly_n: consts::POLY_N,
            poly_sigma: consts::POLY_SIGMA,
        }
    }
}

/// Per-pixel displacement field
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub dx: Plane,
    pub dy: Plane,
}

impl FlowField {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            dx: Plane::zeros(width, height),
            dy: Plane::zeros(width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.dx.width()
    }

    pub fn height(&self) -> usize {
        self.dx.height()
    }

    /// Mean horizontal and vertical displacement, averaged independently
    pub fn mean(&self) -> (f64, f64) {
        (self.dx.mean(), self.dy.mean())
    }

    /// Resample to a new level size, scaling vectors by `factor`
    fn upscaled(&self, width: usize, height: usize, factor: f32) -> Self {
        let mut dx = self.dx.resize_bilinear(width, height);
        let mut dy = self.dy.resize_bilinear(width, height);
        dx.scale_in_place(factor);
        dy.scale_in_place(factor);
        Self { dx, dy }
    }
}

/// Gaussian-weighted basis for the polynomial expansion
struct PolyBasis {
    n: usize,
    /// g[k], k = 0..=n (symmetric)
    g: Vec<f32>,
    xg: Vec<f32>,
    xxg: Vec<f32>,
    ig11: f64,
    ig03: f64,
    ig33: f64,
    ig55: f64,
}

impl PolyBasis {
    fn new(n: usize, sigma: f64) -> Self {
        let sigma = if sigma < f32::EPSILON as f64 {
            n as f64 * 0.3
        } else {
            sigma
        };

        let raw: Vec<f64> = (0..=n)
            .map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
            .collect();
        let total = raw[0] + 2.0 * raw[1..].iter().sum::<f64>();
        let g: Vec<f32> = raw.iter().map(|v| (v / total) as f32).collect();
        let xg: Vec<f32> = g.iter().enumerate().map(|(k, v)| k as f32 * v).collect();
        let xxg: Vec<f32> = g
            .iter()
            .enumerate()
            .map(|(k, v)| (k * k) as f32 * v)
            .collect();

        // Moments of the separable weight over the full (2n+1)^2 window
        let (mut m0, mut m2, mut m4, mut m22) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        let ni = n as isize;
        for y in -ni..=ni {
            for x in -ni..=ni {
                let w = g[y.unsigned_abs()] as f64 * g[x.unsigned_abs()] as f64;
                let (xf, yf) = (x as f64, y as f64);
                m0 += w;
                m2 += w * xf * xf;
                m4 += w * xf.powi(4);
                m22 += w * xf * xf * yf * yf;
            }
        }

        // Closed-form inverse of the coupled {1, x^2, y^2} block
        //   [m0 m2 m2]
        //   [m2 m4 m22]
        //   [m2 m22 m4]
        let r_plus_s = 1.0 / (m4 + m22 - 2.0 * m2 * m2 / m0);
        let r_minus_s = 1.0 / (m4 - m22);

        Self {
            n,
            g,
            xg,
            xxg,
            ig11: 1.0 / m2,
            ig03: -m2 * r_plus_s / m0,
            ig33: 0.5 * (r_plus_s + r_minus_s),
            ig55: 1.0 / m22,
        }
    }
}

/// Quadratic coefficients per pixel: `[y, x, yy, xx, xy]`
type Coefficients = Vec<[f32; 5]>;

/// Planes hold unit-range luminance; the expansion works in 8-bit units
const INTENSITY_RANGE: f64 = 255.0;

fn poly_expansion(src: &Plane, basis: &PolyBasis) -> Coefficients {
    let (width, height) = (src.width(), src.height());
    let n = basis.n;
    let (g, xg, xxg) = (&basis.g, &basis.xg, &basis.xxg);

    let mut out = vec![[0.0f32; 5]; width * height];
    let mut row = vec![[0.0f32; 3]; width + 2 * n];

    for y in 0..height {
        // Vertical pass: [sum g*I, sum y*g*I, sum y^2*g*I]
        let center = src.row(y);
        for x in 0..width {
            row[x + n] = [center[x] * g[0], 0.0, 0.0];
        }
        for k in 1..=n {
            let above = src.row(y.saturating_sub(k));
            let below = src.row((y + k).min(height - 1));
            for x in 0..width {
                let p = above[x] + below[x];
                let cell = &mut row[x + n];
                cell[0] += g[k] * p;
                cell[1] += xg[k] * (below[x] - above[x]);
                cell[2] += xxg[k] * p;
            }
        }
        for i in 0..n {
            row[i] = row[n];
            row[width + n + i] = row[width + n - 1];
        }

        // Horizontal pass
        for x in 0..width {
            let c = x + n;
            let g0 = g[0] as f64;
            let mut b1 = row[c][0] as f64 * g0;
            let mut b2 = 0.0f64;
            let mut b3 = row[c][1] as f64 * g0;
            let mut b4 = 0.0f64;
            let mut b5 = row[c][2] as f64 * g0;
            let mut b6 = 0.0f64;
            for k in 1..=n {
                let (r, l) = (row[c + k], row[c - k]);
                let tg = (r[0] + l[0]) as f64;
                b1 += tg * g[k] as f64;
                b4 += tg * xxg[k] as f64;
                b2 += (r[0] - l[0]) as f64 * xg[k] as f64;
                b3 += (r[1] + l[1]) as f64 * g[k] as f64;
                b6 += (r[1] - l[1]) as f64 * xg[k] as f64;
                b5 += (r[2] + l[2]) as f64 * g[k] as f64;
            }
            let (b1, b2, b3, b4, b5, b6) = (
                b1 * INTENSITY_RANGE,
                b2 * INTENSITY_RANGE,
                b3 * INTENSITY_RANGE,
                b4 * INTENSITY_RANGE,
                b5 * INTENSITY_RANGE,
                b6 * INTENSITY_RANGE,
            );
            out[y * width + x] = [
                (b3 * basis.ig11) as f32,
                (b2 * basis.ig11) as f32,
                (b1 * basis.ig03 + b5 * basis.ig33) as f32,
                (b1 * basis.ig03 + b4 * basis.ig33) as f32,
                (b6 * basis.ig55) as f32,
            ];
        }
    }
    out
}

const BORDER: usize = 5;
const BORDER_WEIGHTS: [f32; BORDER] = [0.14, 0.14, 0.4472, 0.4472, 0.4472];

/// Normal-equation terms `[G11, G12, G22, h1, h2]` for the current flow
fn update_matrices(r0: &Coefficients, r1: &Coefficients, flow: &FlowField) -> Vec<[f32; 5]> {
    let (width, height) = (flow.width(), flow.height());
    let mut m = vec![[0.0f32; 5]; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let dx = flow.dx.get(x, y);
            let dy = flow.dy.get(x, y);
            let fx = x as f32 + dx;
            let fy = y as f32 + dy;
            let x1 = fx.floor();
            let y1 = fy.floor();
            let (fx, fy) = (fx - x1, fy - y1);
            let p0 = r0[idx];

            let (mut r2, mut r3, r4, r5, r6);
            if x1 >= 0.0
                && y1 >= 0.0
                && (x1 as usize) < width - 1
                && (y1 as usize) < height - 1
            {
                let base = y1 as usize * width + x1 as usize;
                let (a00, a01, a10, a11) = (
                    (1.0 - fx) * (1.0 - fy),
                    fx * (1.0 - fy),
                    (1.0 - fx) * fy,
                    fx * fy,
                );
                let lerp = |c: usize| {
                    a00 * r1[base][c]
                        + a01 * r1[base + 1][c]
                        + a10 * r1[base + width][c]
                        + a11 * r1[base + width + 1][c]
                };
                r2 = lerp(0);
                r3 = lerp(1);
                r4 = (p0[2] + lerp(2)) * 0.5;
                r5 = (p0[3] + lerp(3)) * 0.5;
                r6 = (p0[4] + lerp(4)) * 0.25;
            } else {
                r2 = 0.0;
                r3 = 0.0;
                r4 = p0[2];
                r5 = p0[3];
                r6 = p0[4] * 0.5;
            }

            r2 = (p0[0] - r2) * 0.5;
            r3 = (p0[1] - r3) * 0.5;
            r2 += r4 * dy + r6 * dx;
            r3 += r6 * dy + r5 * dx;

            // Down-weight pixels near the border where the expansion is unreliable
            let mut scale = 1.0f32;
            if x < BORDER {
                scale *= BORDER_WEIGHTS[x];
            }
            if x + BORDER >= width {
                scale *= BORDER_WEIGHTS[width - x - 1];
            }
            if y < BORDER {
                scale *= BORDER_WEIGHTS[y];
            }
            if y + BORDER >= height {
                scale *= BORDER_WEIGHTS[height - y - 1];
            }
            let (r2, r3, r4, r5, r6) = (r2 * scale, r3 * scale, r4 * scale, r5 * scale, r6 * scale);

            m[idx] = [
                r4 * r4 + r6 * r6,
                (r4 + r5) * r6,
                r5 * r5 + r6 * r6,
                r4 * r2 + r6 * r3,
                r6 * r2 + r5 * r3,
            ];
        }
    }
    m
}

/// Box-filter the normal equations over `block` x `block` with edge replication
fn box_filter(m: &[[f32; 5]], width: usize, height: usize, block: usize) -> Vec<[f64; 5]> {
    let radius = (block / 2) as isize;
    let clamp = |i: isize, len: usize| i.clamp(0, len as isize - 1) as usize;

    let mut horizontal = vec![[0.0f64; 5]; width * height];
    for y in 0..height {
        let row = &m[y * width..(y + 1) * width];
        let mut acc = [0.0f64; 5];
        for i in -radius..=radius {
            let v = row[clamp(i, width)];
            for c in 0..5 {
                acc[c] += v[c] as f64;
            }
        }
        for x in 0..width {
            horizontal[y * width + x] = acc;
            let add = row[clamp(x as isize + radius + 1, width)];
            let sub = row[clamp(x as isize - radius, width)];
            for c in 0..5 {
                acc[c] += add[c] as f64 - sub[c] as f64;
            }
        }
    }

    let scale = 1.0 / (block * block) as f64;
    let mut out = vec![[0.0f64; 5]; width * height];
    for x in 0..width {
        let mut acc = [0.0f64; 5];
        for i in -radius..=radius {
            let v = horizontal[clamp(i, height) * width + x];
            for c in 0..5 {
                acc[c] += v[c];
            }
        }
        for y in 0..height {
            out[y * width + x] = acc.map(|v| v * scale);
            let add = horizontal[clamp(y as isize + radius + 1, height) * width + x];
            let sub = horizontal[clamp(y as isize - radius, height) * width + x];
            for c in 0..5 {
                acc[c] += add[c] - sub[c];
            }
        }
    }
    out
}

/// Solve the windowed 2x2 systems for a new flow estimate
fn solve_flow(m: &[[f32; 5]], flow: &mut FlowField, block: usize) {
    let (width, height) = (flow.width(), flow.height());
    let blurred = box_filter(m, width, height, block);
    for y in 0..height {
        for x in 0..width {
            let [g11, g12, g22, h1, h2] = blurred[y * width + x];
            let idet = 1.0 / (g11 * g22 - g12 * g12 + 1e-3);
            flow.dx.set(x, y, ((g11 * h2 - g12 * h1) * idet) as f32);
            flow.dy.set(x, y, ((g22 * h1 - g12 * h2) * idet) as f32);
        }
    }
}

/// Blurred and downscaled copies of `base`, one per entry of `sizes`
///
/// Each level is built from the one before it.
fn pyramid(base: &Plane, sizes: &[(usize, usize)], sigma: f32) -> Vec<Plane> {
    let mut levels: Vec<Plane> = Vec::with_capacity(sizes.len());
    let mut current = base.clone();
    for (i, &(width, height)) in sizes.iter().enumerate() {
        if i > 0 {
            current = current.gaussian_blur(sigma).resize(width, height);
        }
        levels.push(current.clone());
    }
    levels
}

/// Estimate dense flow from `prev` to `next`
///
/// Both planes must have the same size; a mismatch yields a zero field of
/// `prev`'s size.
pub fn dense_flow(prev: &Plane, next: &Plane, params: &FlowParams) -> FlowField {
    let (width, height) = (prev.width(), prev.height());
    if width == 0 || height == 0 || next.width() != width || next.height() != height {
        return FlowField::zeros(width, height);
    }

    let mut sizes = vec![(width, height)];
    let mut scale = 1.0;
    while sizes.len() <= params.levels {
        scale *= params.pyramid_scale;
        if width as f64 * scale < consts::MIN_LEVEL_SIZE
            || height as f64 * scale < consts::MIN_LEVEL_SIZE
        {
            break;
        }
        sizes.push((
            ((width as f64 * scale).round() as usize).max(1),
            ((height as f64 * scale).round() as usize).max(1),
        ));
    }

    let sigma = ((1.0 / params.pyramid_scale - 1.0) * 0.5) as f32;
    let prev_levels = pyramid(prev, &sizes, sigma);
    let next_levels = pyramid(next, &sizes, sigma);

    let basis = PolyBasis::new(params.poly_n, params.poly_sigma);
    let block = params.window_size.max(1);
    let mut coarser: Option<FlowField> = None;

    for level in (0..sizes.len()).rev() {
        let (level_width, level_height) = sizes[level];
        let mut flow = match coarser.take() {
            Some(f) => f.upscaled(level_width, level_height, (1.0 / params.pyramid_scale) as f32),
            None => FlowField::zeros(level_width, level_height),
        };

        let r0 = poly_expansion(&prev_levels[level], &basis);
        let r1 = poly_expansion(&next_levels[level], &basis);

        let mut m = update_matrices(&r0, &r1, &flow);
        for i in 0..params.iterations {
            solve_flow(&m, &mut flow, block);
            if i + 1 < params.iterations {
                m = update_matrices(&r0, &r1, &flow);
            }
        }

        coarser = Some(flow);
    }

    coarser.unwrap_or_else(|| FlowField::zeros(width, height))
}

/// Mean displacement from `prev` to `next`
pub fn mean_flow(prev: &GrayImage, next: &GrayImage, params: &FlowParams) -> (f64, f64) {
    #[cfg(feature = "opencv")]
    {
        match crate::media::cv::mean_flow(prev, next, params) {
            Ok(mean) => return mean,
            Err(e) => tracing::warn!(error = %e, "OpenCV optical flow failed, using built-in estimator"),
        }
    }

    dense_flow(&Plane::from_luma(prev), &Plane::from_luma(next), params).mean()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth synthetic texture, shifted by (sx, sy)
    fn texture(width: usize, height: usize, sx: f32, sy: f32) -> Plane {
        Plane::from_fn(width, height, |x, y| {
            let (xf, yf) = (x as f32 - sx, y as f32 - sy);
            let v = 128.0 + 50.0 * (xf * 0.21).sin() * (yf * 0.17).cos() + 30.0 * ((xf + yf) * 0.09).sin();
            v / 255.0
        })
    }

    #[test]
    fn test_poly_basis_inverse_is_consistent() {
        let basis = PolyBasis::new(5, 1.2);
        let g_sum: f32 = basis.g[0] + 2.0 * basis.g[1..].iter().sum::<f32>();
        assert!((g_sum - 1.0).abs() < 1e-5);
        assert!(basis.ig11 > 0.0 && basis.ig33 > 0.0 && basis.ig55 > 0.0);
        assert!(basis.ig03 < 0.0);
    }

    #[test]
    fn test_linear_ramp_expansion() {
        // I = 2x + 3y in 8-bit units: linear coefficients recover the gradient
        let plane = Plane::from_fn(40, 40, |x, y| (2.0 * x as f32 + 3.0 * y as f32) / 255.0);
        let coeffs = poly_expansion(&plane, &PolyBasis::new(5, 1.2));
        let c = coeffs[20 * 40 + 20];
        assert!((c[0] - 3.0).abs() < 1e-3, "y coefficient {}", c[0]);
        assert!((c[1] - 2.0).abs() < 1e-3, "x coefficient {}", c[1]);
        assert!(c[4].abs() < 1e-3);
    }

    #[test]
    fn test_identical_frames_have_near_zero_flow() {
        // The last row and column have no forward neighbor and leak a small residual
        let plane = texture(64, 48, 0.0, 0.0);
        let flow = dense_flow(&plane, &plane, &FlowParams::default());
        let (dx, dy) = flow.mean();
        assert_eq!((flow.width(), flow.height()), (64, 48));
        assert!(dx.abs() < 0.25 && dy.abs() < 0.25, "flow ({}, {})", dx, dy);
    }

    #[test]
    fn test_detects_horizontal_shift() {
        let prev = texture(96, 80, 0.0, 0.0);
        let next = texture(96, 80, 2.0, 0.0);
        let (dx, dy) = dense_flow(&prev, &next, &FlowParams::default()).mean();
        assert!(dx > 0.5, "expected rightward flow, got dx = {}", dx);
        assert!(dy.abs() < dx.abs(), "vertical component {} dominates", dy);
    }

    #[test]
    fn test_size_mismatch_yields_zero_field() {
        let prev = texture(32, 32, 0.0, 0.0);
        let next = texture(40, 32, 0.0, 0.0);
        let flow = dense_flow(&prev, &next, &FlowParams::default());
        assert_eq!(flow.mean(), (0.0, 0.0));
    }
}
