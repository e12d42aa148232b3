use std::fs::File;

use scanbe_rs::scan_pipeline::{
    Completion, DeviceRegistry, ImageType, OutputConfig, ScanError, ScanToTiffPipeline,
    SessionConfig, SettingId, SettingKind, SettingValue, SimulatedScanner, TiffCompression,
};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};

fn registry() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.register("flatbed", SimulatedScanner::new);
    registry.register("aligned", || {
        SimulatedScanner::new()
            .with_name("aligned")
            .with_row_alignment(4)
    });
    registry
}

#[test]
fn test_rgb_capture_to_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("scan.tiff");

    let mut session = registry()
        .open(Some("aligned"), SessionConfig::default())
        .expect("open");
    session
        .put_setting(SettingId::ImageType, SettingValue::Type(ImageType::Rgb))
        .expect("rgb");
    let changed = session
        .put_setting(SettingId::Resolution, SettingValue::UInt(150))
        .expect("150 dpi");
    assert!(changed.contains(SettingId::Width));
    assert_eq!(
        session.get_setting(SettingId::RowBytes, SettingKind::Current).expect("row bytes"),
        SettingValue::UInt(452)
    );

    let pipeline = ScanToTiffPipeline::new(
        OutputConfig::builder()
            .compression(TiffCompression::None)
            .build(),
    );
    let report = pipeline.capture_file(&mut session, &path).expect("capture");
    assert_eq!((report.width, report.height), (150, 75));
    assert_eq!(report.completion, Completion::Full);

    let mut decoder = Decoder::new(File::open(&path).expect("output exists")).expect("tiff");
    assert_eq!(decoder.dimensions().expect("dimensions"), (150, 75));
    assert_eq!(decoder.colortype().expect("color type"), ColorType::RGBA(8));
    let DecodingResult::U8(pixels) = decoder.read_image().expect("pixels") else {
        panic!("expected 8-bit samples");
    };
    // Gradient pattern: blue is constant, alpha is the pad channel.
    assert!(pixels.chunks_exact(4).all(|px| px[2] == 0x80 && px[3] == 0xFF));

    session.close().expect("close");
}

#[test]
fn test_missing_output_directory_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("missing").join("scan.tiff");
    let mut session = registry().open(None, SessionConfig::default()).expect("open");

    let pipeline = ScanToTiffPipeline::new(OutputConfig::default());
    let result = pipeline.capture_file(&mut session, &path);
    assert!(matches!(result, Err(ScanError::OutputWriteError(_))));
}

#[test]
fn test_unknown_device_name() {
    let result = registry().open(Some("drum"), SessionConfig::default());
    assert!(matches!(result, Err(ScanError::NoMatchingDevice(_))));
}
