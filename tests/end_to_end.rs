mod common;

use common::{Fixture, encode, sky_png, solid_png};
use haze_aqi_rs::aqi_pipeline::{
    AnalysisResponse, AqiCategory, AqiPipeline, BreakpointConfig, BreakpointPreset, ErrorKind,
    HazeLevel, PipelineConfig,
};
use image::{ImageFormat, Rgb, RgbImage};

#[test]
fn clear_air_photo_is_good() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(1.0);
    let pipeline = AqiPipeline::new(fixture.config(&weights));
    assert!(pipeline.is_ready());

    let result = pipeline.analyze_image(&solid_png(64, 48, [255, 255, 255])).unwrap();

    assert!((result.value - 15.0).abs() < 5.0, "got {}", result.value);
    assert_eq!(result.category, AqiCategory::Good);
    assert_eq!(result.color, "#00e400");
    assert_eq!(result.haze_level, HazeLevel::Low);
}

#[test]
fn heavy_haze_photo_is_very_unhealthy() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(2.0);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let result = pipeline.analyze_image(&sky_png(300, 200)).unwrap();

    assert!((result.value - 400.0).abs() < 5.0, "got {}", result.value);
    assert_eq!(result.category, AqiCategory::VeryUnhealthy);
    assert_eq!(result.color, "#8f3f97");

    let response = AnalysisResponse::from(&result);
    assert_eq!(response.status, "success");
    assert_eq!(response.category, "Very Unhealthy");
}

#[test]
fn low_transmission_follows_the_fitted_polynomial() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(0.5);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let result = pipeline.analyze_image(&sky_png(64, 64)).unwrap();

    // 192.142857 - 450.357143 * 0.5 + 276.785714 * 0.25
    assert!((result.value - 36.161).abs() < 0.01, "got {}", result.value);
    assert_eq!(result.category, AqiCategory::Good);
}

#[test]
fn epa_table_puts_heavy_haze_in_hazardous() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(2.0);
    let config = PipelineConfig {
        breakpoints: BreakpointConfig::Preset(BreakpointPreset::Epa),
        ..fixture.config(&weights)
    };
    let pipeline = AqiPipeline::new(config);

    let result = pipeline.analyze_image(&sky_png(64, 64)).unwrap();
    assert_eq!(result.category, AqiCategory::Hazardous);
}

#[test]
fn night_photo_is_unsuitable() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(1.0);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let error = pipeline.analyze_image(&solid_png(64, 64, [12, 14, 20])).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::UnsuitableImage);
    assert!(error.public_message().contains("daytime"));
}

#[test]
fn empty_upload_is_invalid_and_cleaned_up() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(1.0);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let error = pipeline.analyze_upload(b"").unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidImage);
    assert_eq!(fixture.staged_files(), 0);
}

#[test]
fn upload_and_file_paths_agree() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(1.3);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let bytes = sky_png(120, 90);
    let photo = fixture.path("photo.png");
    std::fs::write(&photo, &bytes).unwrap();

    let uploaded = pipeline.analyze_upload(&bytes).unwrap();
    let from_file = pipeline.analyze_file(&photo).unwrap();
    let in_memory = pipeline.analyze_image(&bytes).unwrap();

    assert_eq!(uploaded, from_file);
    assert_eq!(uploaded, in_memory);
    assert_eq!(fixture.staged_files(), 0);
}

#[test]
fn jpeg_input_is_accepted() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(1.0);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let image = RgbImage::from_pixel(80, 60, Rgb([210, 220, 235]));
    let result = pipeline.analyze_image(&encode(&image, ImageFormat::Jpeg)).unwrap();
    assert_eq!(result.category, AqiCategory::Good);
}

#[test]
fn missing_weights_report_model_unavailable() {
    let fixture = Fixture::new();
    let pipeline = AqiPipeline::new(fixture.config(&fixture.path("nowhere.safetensors")));

    assert!(!pipeline.is_ready());
    assert!(pipeline.status().reason.is_some());

    let error = pipeline.analyze_image(&sky_png(32, 32)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ModelUnavailable);
}

#[test]
fn config_file_drives_the_pipeline() {
    let fixture = Fixture::new();
    fixture.constant_weights(2.0);
    std::fs::write(
        fixture.path("calibration.json"),
        r#"{"coefficients": [0.0, 100.0, 0.0]}"#,
    )
    .unwrap();
    std::fs::write(
        fixture.path("pipeline.json"),
        r#"{
            "breakpoints": "epa",
            "artifacts": {
                "dehaze_weights": "aodnet-2.safetensors",
                "calibration": "calibration.json"
            },
            "staging_dir": "uploads"
        }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(fixture.path("pipeline.json")).unwrap();
    let pipeline = AqiPipeline::new(config);
    assert!(pipeline.is_ready(), "{:?}", pipeline.status().reason);

    // 100 * mean haze 2.0 lands in the EPA Unhealthy band
    let result = pipeline.analyze_upload(&sky_png(64, 64)).unwrap();
    assert!((result.value - 200.0).abs() < 1e-3);
    assert_eq!(result.category, AqiCategory::Unhealthy);
    assert_eq!(fixture.staged_files(), 0);
}

#[test]
fn dehazed_scene_can_be_rendered() {
    let fixture = Fixture::new();
    let weights = fixture.constant_weights(1.0);
    let pipeline = AqiPipeline::new(fixture.config(&weights));

    let report = pipeline.analyze_with_timings(&solid_png(40, 40, [200, 180, 160])).unwrap();
    let rendered = report.dehazed.to_rgb_image(pipeline.config().channel_order).unwrap();

    assert_eq!(rendered.dimensions(), (256, 256));
    // K = 1 leaves the scene as it was
    assert_eq!(rendered.get_pixel(128, 128).0, [200, 180, 160]);
    assert!(report.timings.total_duration() > std::time::Duration::ZERO);
}
