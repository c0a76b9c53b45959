// SPDX-License-Identifier: MPL-2.0

//! MP4 muxing and file output

use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::media::encoders::video::MP4_MUXER;

/// Muxer configuration
pub struct MuxerConfig {
    /// Muxer element
    pub muxer: gst::Element,
    /// File sink element
    pub filesink: gst::Element,
    /// Output file path
    pub output_path: PathBuf,
}

/// Create an MP4 muxer and a filesink writing to `output_path`
pub fn create_muxer(output_path: &Path) -> Result<MuxerConfig, String> {
    info!(path = %output_path.display(), "Creating muxer");

    let muxer = gst::ElementFactory::make(MP4_MUXER)
        .build()
        .map_err(|e| format!("Failed to create muxer {}: {}", MP4_MUXER, e))?;

    // Non-streamable output gets a proper index for seekable playback
    if muxer.has_property("streamable") {
        muxer.set_property("streamable", false);
        debug!("Configured muxer with streamable=false for seekable output");
    }

    let location = output_path
        .to_str()
        .ok_or_else(|| format!("Output path is not valid UTF-8: {}", output_path.display()))?;
    let filesink = gst::ElementFactory::make("filesink")
        .property("location", location)
        .build()
        .map_err(|e| format!("Failed to create filesink: {}", e))?;

    debug!("Muxer and filesink created");

    Ok(MuxerConfig {
        muxer,
        filesink,
        output_path: output_path.to_path_buf(),
    })
}

/// Link video parser (or encoder) to muxer
pub fn link_video_to_muxer(upstream: &gst::Element, muxer: &gst::Element) -> Result<(), String> {
    upstream
        .link(muxer)
        .map_err(|_| "Failed to link video stream to muxer".to_string())?;

    debug!("Video stream linked to muxer");
    Ok(())
}

/// Link muxer to filesink
pub fn link_muxer_to_sink(muxer: &gst::Element, filesink: &gst::Element) -> Result<(), String> {
    muxer
        .link(filesink)
        .map_err(|_| "Failed to link muxer to filesink".to_string())?;

    debug!("Muxer linked to filesink");
    Ok(())
}
