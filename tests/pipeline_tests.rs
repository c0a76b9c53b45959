// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the frame pipeline and its controller

use image::RgbImage;
use image::imageops::{self, FilterType};
use std::path::Path;
use viewfinder::backends::camera::{DisplayFrame, Frame, ScriptedSource};
use viewfinder::errors::PipelineError;
use viewfinder::media::Roi;
use viewfinder::pipelines::video::MemoryRecorder;
use viewfinder::pipelines::viewfinder::orientation::{self, Orientation, target_for};
use viewfinder::pipelines::viewfinder::wide_angle::{self, LensPlan};
use viewfinder::pipelines::viewfinder::{CropRect, Stabilizer, ZoomLevel, ZoomPath, crop_rect};
use viewfinder::pipelines::{Controls, PipelineController, PipelineEvent};
use viewfinder::Config;

fn gradient(width: u32, height: u32) -> Frame {
    Frame::from_image(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn textured(width: u32, height: u32, shift_x: f32) -> Frame {
    Frame::from_image(RgbImage::from_fn(width, height, |x, y| {
        let xf = x as f32 - shift_x;
        let yf = y as f32;
        let v = 128.0 + 60.0 * (xf * 0.2).sin() * (yf * 0.15).cos();
        image::Rgb([v as u8, v as u8, v as u8])
    }))
}

fn test_config(dir: &Path) -> Config {
    Config {
        photos_dir: dir.join("photos"),
        videos_dir: dir.join("videos"),
        ..Config::default()
    }
}

fn controller_with(
    dir: &Path,
    resolution: (u32, u32),
    frames: Vec<Frame>,
) -> (PipelineController<ScriptedSource, MemoryRecorder>, MemoryRecorder) {
    let mut source = ScriptedSource::new(resolution);
    for frame in frames {
        source.push_frame(frame);
    }
    let recorder = MemoryRecorder::new();
    let controller = PipelineController::new(source, recorder.clone(), &test_config(dir));
    (controller, recorder)
}

fn video(action: bool) -> Controls {
    Controls {
        video_mode: true,
        action_triggered: action,
        ..Controls::default()
    }
}

#[test]
fn test_full_hd_zoom_two_uses_centered_quarter() {
    let dir = tempfile::tempdir().unwrap();
    let raw = gradient(1920, 1080);
    let (mut controller, _) = controller_with(dir.path(), (1920, 1080), vec![raw.clone()]);

    let output = controller.tick(&Controls {
        zoom: 2.0,
        ..Controls::default()
    });
    let frame = output.frame.expect("tick should produce a frame");
    assert_eq!(frame.dimensions(), (1920, 1080));

    let rect = crop_rect(1920, 1080, 2.0);
    assert_eq!(
        rect.to_pixels(),
        Some(Roi {
            x: 480,
            y: 270,
            width: 960,
            height: 540
        })
    );
    let expected = imageops::resize(
        &imageops::crop_imm(raw.as_image(), 480, 270, 960, 540).to_image(),
        1920,
        1080,
        FilterType::Triangle,
    );
    assert_eq!(frame.as_image(), &expected);
}

#[test]
fn test_zoom_point_seven_selects_wide_angle() {
    let ZoomPath::WideAngle { intensity } = ZoomLevel::new(0.7).path() else {
        panic!("zoom 0.7 should select the wide-angle path");
    };
    assert!((intensity - 0.6).abs() < 1e-6, "intensity = {}", intensity);

    let plan = LensPlan::new(320, 240, intensity);
    assert!((plan.distortion.k1 + 0.12).abs() < 1e-6, "k1 = {}", plan.distortion.k1);
    assert!((plan.distortion.k2 - 0.06).abs() < 1e-6, "k2 = {}", plan.distortion.k2);
    assert_eq!(plan.distortion.p1, 0.0);
    assert_eq!(plan.distortion.p2, 0.0);

    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller_with(dir.path(), (320, 240), vec![gradient(320, 240)]);
    let output = controller.tick(&Controls {
        zoom: 0.7,
        ..Controls::default()
    });
    assert_eq!(output.frame.unwrap().dimensions(), (320, 240));
}

#[test]
fn test_zoom_identity_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let landscape = gradient(40, 30);
    let portrait = gradient(30, 40);
    let (mut controller, _) =
        controller_with(dir.path(), (40, 30), vec![landscape.clone(), portrait.clone()]);

    let first = controller.tick(&Controls::default()).frame.unwrap();
    assert_eq!(first, landscape);

    let second = controller.tick(&Controls::default()).frame.unwrap();
    let corrected = orientation::rotate(portrait, Orientation::Portrait).unwrap();
    assert_eq!(second, corrected);
}

#[test]
fn test_classify_and_rotate_properties() {
    for (w, h) in [(2, 1), (640, 480), (1920, 1080), (5, 4)] {
        assert_eq!(orientation::classify(&gradient(w, h)), Orientation::Landscape);
        let portrait = gradient(h, w);
        assert_eq!(orientation::classify(&portrait), Orientation::Portrait);
        let rotated = orientation::rotate(portrait, Orientation::Portrait).unwrap();
        assert!(rotated.width() > rotated.height(), "{:?}", rotated);
    }
}

#[test]
fn test_rotate_rejects_empty_frame() {
    let empty = Frame::from_image(RgbImage::new(0, 0));
    assert!(matches!(
        orientation::rotate(empty, Orientation::Portrait),
        Err(PipelineError::InvalidFrame(_))
    ));
}

#[test]
fn test_orientation_lock_holds_for_session() {
    assert_eq!(
        target_for(&gradient(8, 4), Some(Orientation::Portrait)),
        Orientation::Portrait
    );
    assert_eq!(target_for(&gradient(8, 4), None), Orientation::Landscape);

    let dir = tempfile::tempdir().unwrap();
    let (mut controller, recorder) = controller_with(
        dir.path(),
        (8, 4),
        vec![gradient(4, 8), gradient(8, 4), gradient(8, 4)],
    );

    // Recording starts on a portrait frame and locks portrait
    let first = controller.tick(&video(true));
    assert!(matches!(first.events.as_slice(), [PipelineEvent::RecordingStarted(_)]));
    assert_eq!(
        controller.state().mode.locked_orientation(),
        Some(Orientation::Portrait)
    );
    assert_eq!(first.frame.unwrap().dimensions(), (8, 4));

    // The device turns to landscape; the lock still rotates
    let second = controller.tick(&video(false));
    assert_eq!(second.frame.unwrap().dimensions(), (4, 8));

    // Stopping releases the lock on the same tick
    let third = controller.tick(&video(true));
    assert!(matches!(third.events.as_slice(), [PipelineEvent::RecordingStopped(_)]));
    assert_eq!(controller.state().mode.locked_orientation(), None);
    assert_eq!(third.frame.unwrap().dimensions(), (8, 4));

    let stats = recorder.stats();
    assert_eq!(stats.streams_opened, 1);
    assert_eq!(stats.streams_closed, 1);
    assert_eq!(stats.opened[0].0, (8, 4), "stream sized to native resolution");
    assert_eq!(stats.frame_sizes, vec![(8, 4), (8, 4)]);
}

#[test]
fn test_recording_start_and_stop_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, recorder) = controller_with(dir.path(), (8, 4), Vec::new());

    assert_eq!(controller.start_recording(Orientation::Landscape).unwrap(), None);

    controller.set_video_mode(true).unwrap();
    let started = controller.start_recording(Orientation::Landscape).unwrap();
    assert!(started.is_some());
    assert_eq!(controller.start_recording(Orientation::Portrait).unwrap(), None);
    assert_eq!(recorder.stats().streams_opened, 1);
    assert_eq!(
        controller.state().mode.locked_orientation(),
        Some(Orientation::Landscape)
    );

    assert_eq!(controller.stop_recording().unwrap(), started);
    assert_eq!(controller.stop_recording().unwrap(), None);
    assert_eq!(recorder.stats().streams_closed, 1);
}

#[test]
fn test_recording_path_uses_video_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller_with(dir.path(), (8, 4), Vec::new());
    controller.set_video_mode(true).unwrap();

    let path = controller
        .start_recording(Orientation::Landscape)
        .unwrap()
        .unwrap();
    assert_eq!(path.parent(), Some(dir.path().join("videos").as_path()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("video_") && name.ends_with(".mp4"), "{}", name);
}

#[test]
fn test_photo_is_raw_independent_read() {
    let dir = tempfile::tempdir().unwrap();
    let displayed = gradient(40, 30);
    let photographed = gradient(36, 20);
    let (mut controller, _) =
        controller_with(dir.path(), (40, 30), vec![displayed, photographed]);

    let output = controller.tick(&Controls {
        zoom: 3.0,
        action_triggered: true,
        ..Controls::default()
    });
    let [PipelineEvent::PhotoSaved(path)] = output.events.as_slice() else {
        panic!("expected a saved photo, got {:?}", output.events);
    };
    assert!(path.starts_with(dir.path().join("photos")));

    // Dimensions of the raw read, not the zoomed display frame
    let decoded = image::open(path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (36, 20));
    assert_eq!(controller.source().reads_served(), 2);
}

#[test]
fn test_failed_photo_read_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller_with(dir.path(), (8, 4), vec![gradient(8, 4)]);

    let output = controller.tick(&Controls {
        action_triggered: true,
        ..Controls::default()
    });
    assert_eq!(output.events, vec![PipelineEvent::PhotoSkipped]);
    assert!(output.frame.is_some());
    assert!(!dir.path().join("photos").exists());
}

#[test]
fn test_stabilizer_first_frame_unchanged() {
    let frame = textured(64, 48, 0.0);
    assert_eq!(Stabilizer::default().apply(frame.clone(), None), frame);

    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller_with(dir.path(), (64, 48), vec![frame.clone()]);
    let output = controller.tick(&Controls {
        stabilization_enabled: true,
        video_mode: true,
        ..Controls::default()
    });
    assert_eq!(output.frame.unwrap(), frame);
}

#[test]
fn test_stabilizer_chains_on_its_own_output() {
    // The applied shift is the observed mean flow, added rather than
    // subtracted. This amplifies motion; the history slot then holds the
    // shifted frame, so the next estimate starts from it.
    let previous = textured(96, 80, 0.0);
    let current = textured(96, 80, 2.0);
    let expected = Stabilizer::default().apply(current.clone(), Some(&previous));
    assert_ne!(expected, current, "a real shift should move the frame");

    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller_with(dir.path(), (96, 80), vec![previous, current]);
    let controls = Controls {
        stabilization_enabled: true,
        video_mode: true,
        ..Controls::default()
    };
    controller.tick(&controls);
    let output = controller.tick(&controls).frame.unwrap();

    assert_eq!(output, expected);
    assert_eq!(controller.state().previous.as_ref(), Some(&expected));
}

#[test]
fn test_digital_zoom_is_monotonic() {
    let (w, h) = (1920, 1080);
    let rects: Vec<CropRect> = (0..400)
        .map(|i| crop_rect(w, h, 1.0001 + i as f32 * 0.01))
        .collect();
    for pair in rects.windows(2) {
        let (outer, inner) = (pair[0], pair[1]);
        assert!(inner.area() < outer.area(), "{:?} vs {:?}", outer, inner);
        assert!(outer.strictly_contains(&inner), "{:?} vs {:?}", outer, inner);
    }
}

#[test]
fn test_degenerate_roi_returns_input() {
    let frame = gradient(64, 48);
    let plan = LensPlan {
        roi: Roi::default(),
        ..LensPlan::new(64, 48, 1.0)
    };
    let out = wide_angle::apply_plan(frame.clone(), &plan);
    assert_eq!(out, frame);
}

#[test]
fn test_invalid_frame_reuses_previous_display() {
    let dir = tempfile::tempdir().unwrap();
    let good = gradient(8, 4);
    let empty = Frame::from_image(RgbImage::new(0, 0));
    let (mut controller, _) = controller_with(dir.path(), (8, 4), vec![good.clone(), empty]);

    let first = controller.tick(&Controls::default());
    let second = controller.tick(&Controls::default());

    assert!(second.frame.is_none());
    assert!(matches!(
        second.events.as_slice(),
        [PipelineEvent::FrameDropped(PipelineError::InvalidFrame(_))]
    ));
    assert_eq!(second.display, first.display);
    assert_eq!(second.display, Some(DisplayFrame::from_frame(&good)));
}

#[test]
fn test_invalid_first_frame_leaves_display_blank() {
    let dir = tempfile::tempdir().unwrap();
    let empty = Frame::from_image(RgbImage::new(0, 4));
    let (mut controller, _) = controller_with(dir.path(), (8, 4), vec![empty, gradient(8, 4)]);

    let first = controller.tick(&Controls::default());
    assert!(first.frame.is_none());
    assert!(first.display.is_none());
    assert!(matches!(
        first.events.as_slice(),
        [PipelineEvent::FrameDropped(PipelineError::InvalidFrame(_))]
    ));

    let second = controller.tick(&Controls::default());
    assert!(second.display.is_some());
}

#[test]
fn test_display_rows_are_bottom_to_top() {
    let dir = tempfile::tempdir().unwrap();
    let frame = gradient(6, 3);
    let (mut controller, _) = controller_with(dir.path(), (6, 3), vec![frame.clone()]);

    let display = controller.tick(&Controls::default()).display.unwrap();
    let stride = display.stride();
    assert_eq!(&display.data[..stride], &frame.as_raw()[2 * stride..]);
    assert_eq!(display.pixel(1, 0), Some(frame.as_image().get_pixel(1, 0).0));
}
