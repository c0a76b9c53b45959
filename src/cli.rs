// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking photos
//! - Recording the processed viewfinder stream
//! - Running a still image through the viewfinder transforms

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use viewfinder::backends::camera::{CaptureSource, StillImageSource, V4l2Source, enumerate_devices};
use viewfinder::constants::{file_formats, timing};
use viewfinder::media::encoders::available_encoders;
use viewfinder::pipelines::photo::{PhotoCapture, PhotoPipeline};
use viewfinder::pipelines::video::GstRecorderBackend;
use viewfinder::pipelines::viewfinder::{ZoomLevel, correct_and_zoom, orientation};
use viewfinder::pipelines::{Controls, PipelineController, PipelineEvent};
use viewfinder::Config;

/// Frames read and discarded while the sensor settles
const WARMUP: Duration = Duration::from_millis(500);

/// Give up on a first frame after this long
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_devices();

    if cameras.is_empty() {
        println!("No cameras found.");
    } else {
        println!("Available cameras:");
        println!();
        for camera in &cameras {
            println!("  [{}] {}", camera.index, camera.name);
            println!("      Device: {}", camera.path.display());
        }
    }

    println!();
    let encoders = available_encoders();
    if encoders.is_empty() {
        println!("No H.264 encoder found; recording is unavailable.");
    } else {
        let names: Vec<String> = encoders
            .iter()
            .map(|e| {
                let kind = if e.is_hardware { "hw" } else { "sw" };
                format!("{} ({})", e.display_name, kind)
            })
            .collect();
        println!("Video encoders: {}", names.join(", "));
    }

    Ok(())
}

/// Take a raw photo using the configured camera
pub fn take_photo(config: &Config, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = open_camera(config)?;
    let (width, height) = source.native_resolution();
    println!("Capture format: {}x{}", width, height);

    println!("Capturing...");
    warm_up(&mut source)?;

    let pipeline = PhotoPipeline::new(config.photos_dir.clone(), config.jpeg_quality);
    let path = match output {
        Some(path) if path.is_dir() => PhotoPipeline::new(path, config.jpeg_quality).capture(&mut source)?,
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let frame = PhotoCapture::capture_from_source(&mut source)?;
            pipeline.save_frame_to(&frame, &path)?
        }
        None => pipeline.capture(&mut source)?,
    };

    println!("Photo saved: {}", path.display());
    Ok(())
}

/// Record the processed viewfinder stream
pub fn record_video(
    config: &Config,
    duration: u64,
    zoom: f32,
    stabilize: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_camera(config)?;
    let (width, height) = source.native_resolution();
    println!(
        "Recording format: {}x{} @ {}fps",
        width, height, config.framerate
    );
    println!("Zoom: {:.2}x", ZoomLevel::new(zoom).value());
    println!("Stabilization: {}", if stabilize { "on" } else { "off" });
    println!("Bitrate: {}", config.bitrate_preset.display_name());
    println!("Duration: {} seconds", duration);

    let recorder = GstRecorderBackend::new(config.bitrate_preset);
    let mut controller = PipelineController::new(source, recorder, config);
    let mut controls = Controls {
        zoom,
        stabilization_enabled: stabilize,
        video_mode: true,
        action_triggered: true,
    };

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Recording... (press Ctrl+C to stop early)");

    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        let tick_started = Instant::now();
        let output = controller.tick(&controls);
        for event in &output.events {
            match event {
                PipelineEvent::RecordingStarted(path) => {
                    println!("Output: {}", path.display());
                    controls.action_triggered = false;
                }
                PipelineEvent::ActionFailed(reason) => {
                    return Err(reason.clone().into());
                }
                _ => {}
            }
        }
        if output.status.is_persistent() {
            return Err("Camera stopped delivering frames".into());
        }

        // Print progress
        let elapsed = start.elapsed().as_secs();
        print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
        std::io::Write::flush(&mut std::io::stdout())?;

        if let Some(rest) = timing::TICK_INTERVAL.checked_sub(tick_started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    println!();

    let Some(final_path) = controller.stop_recording()? else {
        return Err("Recording never started".into());
    };

    // If user specified a specific filename, move the file there
    let final_path = match output {
        Some(user_path) if !user_path.is_dir() => move_to(&final_path, &user_path)?,
        Some(dir) => move_to(&final_path, &dir.join(file_name(&final_path)?))?,
        None => final_path,
    };

    println!("Video saved: {}", final_path.display());
    Ok(())
}

/// Run a still image through orientation correction and the zoom path
pub fn process_image(input: &Path, output: &Path, zoom: f32) -> Result<(), Box<dyn std::error::Error>> {
    let supported = |path: &Path| {
        path.extension()
            .map(|ext| file_formats::is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false)
    };
    if !supported(input) || !supported(output) {
        return Err(format!(
            "Unsupported image type (expected one of: {})",
            file_formats::IMAGE_EXTENSIONS.join(", ")
        )
        .into());
    }

    let mut source = StillImageSource::open(input)?;
    let frame = source.read_frame()?;
    println!("Input: {}x{}", frame.width(), frame.height());

    let target = orientation::classify(&frame);
    let processed = correct_and_zoom(frame, target, ZoomLevel::new(zoom))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let pipeline = PhotoPipeline::new(PathBuf::from("."), Default::default());
    let path = pipeline.save_frame_to(&processed, output)?;

    println!(
        "Output: {}x{} -> {}",
        processed.width(),
        processed.height(),
        path.display()
    );
    Ok(())
}

fn open_camera(config: &Config) -> Result<V4l2Source, Box<dyn std::error::Error>> {
    let source = V4l2Source::open(
        config.camera_index,
        config.capture_width,
        config.capture_height,
    )?;
    println!("Using camera: /dev/video{}", config.camera_index);
    Ok(source)
}

/// Read and drop frames until the warm-up period has passed
fn warm_up(source: &mut V4l2Source) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut got_frame = false;
    while start.elapsed() < CAPTURE_TIMEOUT {
        if source.read_frame().is_ok() {
            got_frame = true;
            if start.elapsed() > WARMUP {
                break;
            }
        }
    }
    if !got_frame {
        return Err("Failed to capture frame from camera".into());
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr, Box<dyn std::error::Error>> {
    path.file_name()
        .ok_or_else(|| format!("No file name in {}", path.display()).into())
}

fn move_to(from: &Path, to: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(from, to).is_err() {
        // Different filesystem
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(to.to_path_buf())
}
