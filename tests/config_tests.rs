// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use viewfinder::Config;
use viewfinder::constants::BitratePreset;
use viewfinder::pipelines::photo::EncodingQuality;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.framerate, 30, "Recording should default to 30 fps");
    assert_eq!(config.initial_zoom, 1.0, "Viewfinder should start unzoomed");
    assert!(
        !config.stabilization_enabled,
        "Stabilization should be off by default"
    );
    assert_eq!(config.jpeg_quality.jpeg_quality(), 92);
    assert_eq!(config.bitrate_preset, BitratePreset::Medium);
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        camera_index: 2,
        initial_zoom: 0.7,
        jpeg_quality: EncodingQuality::Maximum,
        photos_dir: dir.path().join("shots"),
        ..Config::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "stabilization_enabled": true }"#).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert!(loaded.stabilization_enabled);
    assert_eq!(loaded.framerate, Config::default().framerate);
    assert_eq!(loaded.capture_width, 1280);
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(Config::load(&path).is_err());
}
