// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for video encoding based on resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// All preset variants, lowest first
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Get bitrate in kbps for a given resolution
    ///
    /// - SD (640x480): Low=1, Medium=2, High=4 Mbps
    /// - HD (1280x720): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (1920x1080): Low=4, Medium=8, High=16 Mbps
    /// - 2K (2560x1440): Low=8, Medium=16, High=32 Mbps
    /// - 4K (3840x2160): Low=15, Medium=30, High=50 Mbps
    pub fn bitrate_kbps(&self, width: u32, _height: u32) -> u32 {
        match (get_resolution_tier(width), self) {
            (ResolutionTier::SD, BitratePreset::Low) => 1_000,
            (ResolutionTier::SD, BitratePreset::Medium) => 2_000,
            (ResolutionTier::SD, BitratePreset::High) => 4_000,
            (ResolutionTier::HD, BitratePreset::Low) => 2_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 5_000,
            (ResolutionTier::HD, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHD, BitratePreset::High) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::Low) => 8_000,
            (ResolutionTier::TwoK, BitratePreset::Medium) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::High) => 32_000,
            (ResolutionTier::FourK, BitratePreset::Low) => 15_000,
            (ResolutionTier::FourK, BitratePreset::Medium) => 30_000,
            (ResolutionTier::FourK, BitratePreset::High) => 50_000,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// SD: 640x480 and below
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080
    FullHD,
    /// 2K: 2560x1440
    TwoK,
    /// 4K: 3840x2160 and above
    FourK,
}

/// Get the resolution tier for a given width
pub fn get_resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 3840 => ResolutionTier::FourK,
        w if w >= 2560 => ResolutionTier::TwoK,
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Zoom control range and path thresholds
pub mod zoom {
    /// Widest zoom (maximum wide-angle intensity)
    pub const MIN: f32 = 0.5;

    /// Tightest digital zoom
    pub const MAX: f32 = 5.0;

    /// Identity zoom
    pub const NEUTRAL: f32 = 1.0;

    /// Wide-angle intensity per unit of zoom below neutral
    pub const WIDE_ANGLE_GAIN: f32 = 2.0;

    /// Zoom change per key press in the terminal host
    pub const STEP: f32 = 0.1;
}

/// Synthetic lens model for the wide-angle emulation
pub mod lens {
    /// First radial coefficient per unit intensity
    pub const K1_PER_INTENSITY: f64 = -0.2;

    /// Second radial coefficient per unit intensity
    pub const K2_PER_INTENSITY: f64 = 0.1;

    /// Grid resolution used to sample the undistorted image border
    pub const RECT_SAMPLE_GRID: usize = 9;

    /// Fixed-point iterations when inverting the distortion model
    pub const UNDISTORT_ITERATIONS: usize = 5;

    /// Free scaling between the inscribed (0.0) and circumscribed (1.0) view
    pub const FREE_SCALING_ALPHA: f64 = 1.0;
}

/// Dense optical flow parameters used by the stabilizer
pub mod optical_flow {
    /// Scale between successive pyramid levels
    pub const PYRAMID_SCALE: f64 = 0.5;

    /// Number of pyramid levels above the base image
    pub const PYRAMID_LEVELS: usize = 3;

    /// Averaging window size
    pub const WINDOW_SIZE: usize = 15;

    /// Iterations per pyramid level
    pub const ITERATIONS: usize = 3;

    /// Polynomial expansion neighborhood (half-width of the kernel)
    pub const POLY_N: usize = 5;

    /// Gaussian sigma for the polynomial expansion
    pub const POLY_SIGMA: f64 = 1.2;

    /// Pyramid levels narrower than this are skipped
    pub const MIN_LEVEL_SIZE: f64 = 32.0;

    /// Wider frames are downscaled to this width before estimating motion
    pub const ANALYSIS_MAX_WIDTH: u32 = 320;
}

/// Recording output
pub mod recording {
    /// Fixed output framerate
    pub const FRAMERATE: u32 = 30;

    /// Output container extension
    pub const CONTAINER_EXTENSION: &str = "mp4";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Render loop period (~30 Hz)
    pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

    /// Log frame statistics every N ticks
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Consecutive failed reads before the capture is reported as lost (~1 s)
    pub const CAPTURE_LOST_TICKS: u32 = 30;

    /// Max time to wait for the muxer to finalize on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// How long to watch the bus for errors right after a recording starts
    pub const START_ERROR_CHECK_MS: u64 = 200;
}

/// Supported file formats
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("VIEWFINDER_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_tiers() {
        assert_eq!(get_resolution_tier(3840), ResolutionTier::FourK);
        assert_eq!(get_resolution_tier(1920), ResolutionTier::FullHD);
        assert_eq!(get_resolution_tier(640), ResolutionTier::SD);
    }

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("JPG"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
