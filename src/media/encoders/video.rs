// SPDX-License-Identifier: MPL-2.0

//! H.264 encoder selection with hardware acceleration priority
//!
//! Recordings are always H.264 in MP4, the most widely playable pairing.
//! Hardware encoders are preferred; software encoders are the fallback.

use crate::constants::BitratePreset;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info};

/// Parser element placed between encoder and muxer
pub const H264_PARSER: &str = "h264parse";

/// Muxer element for the MP4 container
pub const MP4_MUXER: &str = "mp4mux";

/// Static description of a candidate encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSpec {
    /// GStreamer element name
    pub element_name: &'static str,
    /// Display name for logs and `list`
    pub display_name: &'static str,
    /// Whether this is hardware accelerated
    pub is_hardware: bool,
}

/// H.264 encoders in priority order (hardware first)
pub const H264_ENCODERS: &[EncoderSpec] = &[
    EncoderSpec {
        element_name: "vah264enc",
        display_name: "VA-API H.264 (HW)",
        is_hardware: true,
    },
    EncoderSpec {
        element_name: "vaapih264enc",
        display_name: "VA-API H.264 (HW, legacy)",
        is_hardware: true,
    },
    EncoderSpec {
        element_name: "nvh264enc",
        display_name: "NVIDIA H.264 (HW)",
        is_hardware: true,
    },
    EncoderSpec {
        element_name: "v4l2h264enc",
        display_name: "V4L2 H.264 (HW)",
        is_hardware: true,
    },
    EncoderSpec {
        element_name: "x264enc",
        display_name: "x264 H.264 (SW)",
        is_hardware: false,
    },
    EncoderSpec {
        element_name: "openh264enc",
        display_name: "OpenH264 H.264 (SW)",
        is_hardware: false,
    },
];

/// x264 speed preset for a bitrate preset
pub fn x264_preset(preset: BitratePreset) -> &'static str {
    match preset {
        BitratePreset::Low => "veryfast",
        BitratePreset::Medium => "fast",
        BitratePreset::High => "medium",
    }
}

/// Encoder chosen for a recording
pub struct SelectedVideoEncoder {
    /// The encoder element
    pub encoder: gst::Element,
    /// Parser element
    pub parser: gst::Element,
    /// Which candidate was picked
    pub spec: EncoderSpec,
}

/// Encoders installed on this system, in priority order
pub fn available_encoders() -> Vec<EncoderSpec> {
    if gst::init().is_err() {
        return Vec::new();
    }
    H264_ENCODERS
        .iter()
        .copied()
        .filter(|spec| gst::ElementFactory::find(spec.element_name).is_some())
        .collect()
}

/// Pick and configure the highest priority H.264 encoder available
pub fn select_h264_encoder(
    preset: BitratePreset,
    width: u32,
    height: u32,
) -> Result<SelectedVideoEncoder, String> {
    gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

    let bitrate = preset.bitrate_kbps(width, height);

    for spec in H264_ENCODERS {
        let Ok(encoder) = gst::ElementFactory::make(spec.element_name).build() else {
            continue;
        };
        let parser = gst::ElementFactory::make(H264_PARSER)
            .build()
            .map_err(|e| format!("Failed to create parser {}: {}", H264_PARSER, e))?;

        configure_video_encoder(&encoder, spec.element_name, preset, bitrate);
        info!(
            encoder = spec.element_name,
            hardware = spec.is_hardware,
            bitrate_kbps = bitrate,
            "Selected video encoder"
        );
        return Ok(SelectedVideoEncoder {
            encoder,
            parser,
            spec: *spec,
        });
    }

    Err("No H.264 encoder available. Please install gstreamer1-plugins-ugly (x264enc) or gstreamer1-plugin-openh264".to_string())
}

/// Configure encoder based on type and bitrate
fn configure_video_encoder(
    encoder: &gst::Element,
    encoder_name: &str,
    preset: BitratePreset,
    bitrate: u32,
) {
    match encoder_name {
        "x264enc" => {
            let _ = encoder.set_property_from_str("speed-preset", x264_preset(preset));
            let _ = encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property("bitrate", bitrate);
            debug!(
                "Configured x264enc: preset={}, bitrate={} kbps",
                x264_preset(preset),
                bitrate
            );
        }

        // VA-API encoders (old plugin style - uses integer)
        "vaapih264enc" => {
            encoder.set_property_from_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured VA-API encoder: bitrate={} kbps", bitrate);
        }

        "vah264enc" => {
            encoder.set_property_from_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured VA-API encoder: bitrate={} kbps", bitrate);
        }

        "nvh264enc" => {
            encoder.set_property("bitrate", bitrate);
            encoder.set_property_from_str("rc-mode", "vbr");
            let nv_preset = match preset {
                BitratePreset::Low | BitratePreset::Medium => "fast",
                BitratePreset::High => "hq",
            };
            encoder.set_property_from_str("preset", nv_preset);
            debug!(
                "Configured NVIDIA encoder: preset={}, bitrate={} kbps",
                nv_preset, bitrate
            );
        }

        // V4L2 encoders typically have limited configuration
        "v4l2h264enc" => {
            debug!("Using V4L2 encoder with default configuration");
        }

        "openh264enc" => {
            encoder.set_property_from_str("rate-control", "bitrate");
            encoder.set_property("bitrate", bitrate * 1000); // Bits per second
            encoder.set_property_from_str("usage-type", "camera");
            debug!(
                "Configured openh264enc: rate-control=bitrate, bitrate={} bps",
                bitrate * 1000
            );
        }

        _ => {
            debug!("Unknown encoder type, using default configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_encoders_come_first() {
        let first_software = H264_ENCODERS
            .iter()
            .position(|e| !e.is_hardware)
            .unwrap();
        assert!(
            H264_ENCODERS[first_software..].iter().all(|e| !e.is_hardware),
            "hardware encoder listed after a software one"
        );
    }

    #[test]
    fn test_x264_presets_distinct() {
        let presets: Vec<_> = BitratePreset::ALL.iter().map(|p| x264_preset(*p)).collect();
        assert_eq!(presets, vec!["veryfast", "fast", "medium"]);
    }
}
