use crate::scan_pipeline::common::error::ScanError;
use crate::scan_pipeline::device::SimulatedScanner;
use crate::scan_pipeline::settings::{
    ImageType, RangePolicy, ScanRect, ScanSettings, SettingId, SettingKind, SettingValue,
    SettingsMask, SettingsNegotiator, identity_tone_map, padded_row_bytes,
};

fn load(device: &SimulatedScanner, policy: RangePolicy) -> SettingsNegotiator {
    SettingsNegotiator::load(device, policy).expect("settings should load")
}

fn mask(ids: &[SettingId]) -> SettingsMask {
    ids.iter().copied().collect()
}

#[test]
fn test_load_derives_geometry() {
    let device = SimulatedScanner::new();
    let negotiator = load(&device, RangePolicy::Reject);

    let current = negotiator.current();
    assert_eq!(current.pixel_width, 100);
    assert_eq!(current.pixel_height, 50);
    assert_eq!(current.row_bytes, 100);
    assert_eq!(negotiator.view(SettingKind::Maximum).resolution, 1200);
    assert_eq!(negotiator.view(SettingKind::Minimum).scaling, 25);
}

#[test]
fn test_derived_fields_never_appear_as_capabilities() {
    let advertised = mask(&[SettingId::Area, SettingId::Resolution, SettingId::Width, SettingId::RowBytes]);
    let device = SimulatedScanner::new().with_capabilities(advertised);
    let negotiator = load(&device, RangePolicy::Reject);

    let caps = negotiator.capabilities();
    assert!(caps.contains(SettingId::Area));
    assert!(caps.contains(SettingId::Resolution));
    assert!(!caps.intersects(SettingsMask::DERIVED));
    assert!(negotiator.is_supported(SettingId::Height));
}

#[test]
fn test_unsupported_setting_reads_neutral_value() {
    let device =
        SimulatedScanner::new().with_capabilities(mask(&[SettingId::Area, SettingId::Resolution]));
    let negotiator = load(&device, RangePolicy::Reject);

    assert_eq!(negotiator.get(SettingId::Brightness, SettingKind::Current), SettingValue::SInt(0));
    assert_eq!(negotiator.get(SettingId::Scaling, SettingKind::Maximum), SettingValue::UInt(100));
    assert_eq!(
        negotiator.get(SettingId::ToneMap, SettingKind::Current),
        SettingValue::Table(identity_tone_map(1))
    );
    assert_eq!(negotiator.get(SettingId::Specific, SettingKind::Current), SettingValue::Bytes(Vec::new()));
}

#[test]
fn test_unknown_setting_id_is_rejected() {
    assert!(matches!(SettingId::try_from(0x8000), Err(ScanError::UnknownSetting(0x8000))));
    assert!(matches!(SettingId::try_from(3), Err(ScanError::UnknownSetting(3))));
    assert_eq!(SettingId::try_from(8).expect("resolution code"), SettingId::Resolution);
}

#[test]
fn test_derived_fields_are_read_only() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Clamp);
    let before = negotiator.current().clone();

    for id in [SettingId::Width, SettingId::Height, SettingId::RowBytes] {
        let result = negotiator.put(&mut device, id, SettingValue::UInt(10));
        assert!(matches!(result, Err(ScanError::InvalidSetting { id: rejected, .. }) if rejected == id));
    }
    assert_eq!(negotiator.current(), &before);
}

#[test]
fn test_resolution_change_reports_dependent_fields() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);

    let changed = negotiator
        .put(&mut device, SettingId::Resolution, SettingValue::UInt(200))
        .expect("resolution within range");

    assert_eq!(
        changed,
        mask(&[SettingId::Resolution, SettingId::Width, SettingId::Height, SettingId::RowBytes])
    );
    let current = negotiator.current();
    assert_eq!((current.pixel_width, current.pixel_height, current.row_bytes), (200, 100, 200));
}

#[test]
fn test_repeated_put_changes_nothing() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);

    let first = negotiator
        .put(&mut device, SettingId::Contrast, SettingValue::SInt(12))
        .expect("contrast within range");
    let snapshot = negotiator.current().clone();
    let second = negotiator
        .put(&mut device, SettingId::Contrast, SettingValue::SInt(12))
        .expect("same contrast again");

    assert_eq!(first, mask(&[SettingId::Contrast]));
    assert!(second.is_empty());
    assert_eq!(negotiator.current(), &snapshot);
}

#[test]
fn test_out_of_range_rejects_without_side_effect() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);
    let before = negotiator.current().clone();

    let brightness = negotiator.put(&mut device, SettingId::Brightness, SettingValue::SInt(500));
    let resolution = negotiator.put(&mut device, SettingId::Resolution, SettingValue::UInt(4800));

    assert!(matches!(brightness, Err(ScanError::InvalidSetting { .. })));
    assert!(matches!(resolution, Err(ScanError::InvalidSetting { .. })));
    assert_eq!(negotiator.current(), &before);
}

#[test]
fn test_clamp_policy_pulls_to_bounds() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Clamp);

    let changed = negotiator
        .put(&mut device, SettingId::Brightness, SettingValue::SInt(500))
        .expect("clamped");
    assert_eq!(changed, mask(&[SettingId::Brightness]));
    assert_eq!(negotiator.current().brightness, 100);

    negotiator
        .put(&mut device, SettingId::Scaling, SettingValue::UInt(1))
        .expect("clamped");
    assert_eq!(negotiator.current().scaling, 25);
}

#[test]
fn test_image_type_change_updates_pixel_bits_and_stride() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);

    let changed = negotiator
        .put(&mut device, SettingId::ImageType, SettingValue::Type(ImageType::Rgb))
        .expect("rgb is offered");

    assert_eq!(
        changed,
        mask(&[SettingId::ImageType, SettingId::PixelBits, SettingId::RowBytes])
    );
    assert_eq!(negotiator.current().pixel_bits, 24);
    assert_eq!(negotiator.current().row_bytes, 300);
}

#[test]
fn test_pixel_bits_must_match_image_type() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);

    let result = negotiator.put(&mut device, SettingId::PixelBits, SettingValue::UInt(24));
    assert!(matches!(result, Err(ScanError::InvalidSetting { id: SettingId::PixelBits, .. })));

    let unchanged = negotiator
        .put(&mut device, SettingId::PixelBits, SettingValue::UInt(8))
        .expect("matching bits");
    assert!(unchanged.is_empty());
}

#[test]
fn test_unknown_image_type_is_rejected() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Clamp);

    let result =
        negotiator.put(&mut device, SettingId::ImageType, SettingValue::Type(ImageType::Unknown));
    assert!(matches!(result, Err(ScanError::InvalidSetting { .. })));
    assert_eq!(negotiator.current().image_type, ImageType::Gray);
}

#[test]
fn test_binary_rows_follow_device_padding() {
    let mut device = SimulatedScanner::new().with_row_alignment(4);
    let mut negotiator = load(&device, RangePolicy::Reject);

    negotiator
        .put(&mut device, SettingId::ImageType, SettingValue::Type(ImageType::Binary))
        .expect("binary is offered");

    let current = negotiator.current();
    assert_eq!(current.pixel_bits, 1);
    assert_eq!(current.packed_row_bytes(), 13);
    assert_eq!(current.row_bytes, 16);
    assert_eq!(current.row_bytes, padded_row_bytes(current.pixel_width, 1, 4));
}

#[test]
fn test_area_outside_bed() {
    let outside = SettingValue::Rect(ScanRect::new(2000, 0, 3000, 300));

    let mut device = SimulatedScanner::new();
    let mut strict = load(&device, RangePolicy::Reject);
    assert!(strict.put(&mut device, SettingId::Area, outside.clone()).is_err());

    let mut device = SimulatedScanner::new();
    let mut lenient = load(&device, RangePolicy::Clamp);
    let changed = lenient
        .put(&mut device, SettingId::Area, outside)
        .expect("clamped to the bed");
    assert_eq!(lenient.current().area, ScanRect::new(2000, 0, 2550, 300));
    assert!(changed.contains(SettingId::Area));
    assert!(changed.contains(SettingId::Width));

    let empty = lenient.put(&mut device, SettingId::Area, SettingValue::Rect(ScanRect::new(10, 10, 10, 40)));
    assert!(empty.is_err());
}

#[test]
fn test_wrong_value_type_and_unsupported_id() {
    let mut device =
        SimulatedScanner::new().with_capabilities(mask(&[SettingId::Area, SettingId::Resolution]));
    let mut negotiator = load(&device, RangePolicy::Reject);

    let mistyped = negotiator.put(&mut device, SettingId::Resolution, SettingValue::SInt(300));
    let unsupported = negotiator.put(&mut device, SettingId::Brightness, SettingValue::SInt(0));

    assert!(matches!(mistyped, Err(ScanError::InvalidSetting { .. })));
    assert!(matches!(unsupported, Err(ScanError::InvalidSetting { id: SettingId::Brightness, .. })));
}

#[test]
fn test_tone_map_length_is_checked() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);

    let short = negotiator.put(&mut device, SettingId::ToneMap, SettingValue::Table(vec![0; 10]));
    assert!(short.is_err());

    let inverted: Vec<u8> = (0..=u8::MAX).rev().collect();
    let changed = negotiator
        .put(&mut device, SettingId::ToneMap, SettingValue::Table(inverted.clone()))
        .expect("full-length tone map");
    assert_eq!(changed, mask(&[SettingId::ToneMap]));
    assert_eq!(negotiator.get(SettingId::ToneMap, SettingKind::Current), SettingValue::Table(inverted));
}

#[test]
fn test_put_all_applies_only_differences() {
    let mut device = SimulatedScanner::new();
    let mut negotiator = load(&device, RangePolicy::Reject);

    let wanted = ScanSettings {
        resolution: 200,
        contrast: 10,
        ..negotiator.current().clone()
    };
    let changed = negotiator.put_all(&mut device, &wanted).expect("all in range");

    assert!(changed.contains(SettingId::Resolution));
    assert!(changed.contains(SettingId::Contrast));
    assert!(changed.contains(SettingId::Width));
    assert!(!changed.contains(SettingId::Brightness));
    assert_eq!(negotiator.current().resolution, 200);

    let again = negotiator.put_all(&mut device, &wanted).expect("nothing to do");
    assert!(again.is_empty());
}

#[test]
fn test_stride_is_consistent_for_any_geometry() {
    for (alignment, image_type) in [(1, ImageType::Gray), (4, ImageType::Rgb), (2, ImageType::Binary), (8, ImageType::Gray)] {
        for (right, resolution, scaling) in [(300, 100, 100), (301, 75, 50), (2550, 300, 133), (37, 1200, 400)] {
            let mut settings = ScanSettings {
                area: ScanRect::new(0, 0, right, 90),
                image_type,
                pixel_bits: image_type.pixel_bits().unwrap_or(8),
                resolution,
                scaling,
                ..ScanSettings::neutral()
            };
            settings.derive_geometry(alignment);

            let packed = settings.packed_row_bytes();
            assert!(u64::from(settings.row_bytes) >= packed);
            assert!(u64::from(settings.row_bytes) < packed + u64::from(alignment));
            assert_eq!(settings.row_bytes % alignment, 0);
        }
    }
}

#[test]
fn test_mask_operations() {
    let mut m = SettingsMask::EMPTY;
    assert!(m.is_empty());
    m.insert(SettingId::Contrast);
    m |= SettingsMask::from(SettingId::Area);
    assert_eq!(m.bits(), 1 | 32);
    assert_eq!(m.iter().collect::<Vec<_>>(), vec![SettingId::Area, SettingId::Contrast]);
    m.remove(SettingId::Area);
    assert_eq!(m, SettingsMask::from(SettingId::Contrast));
    assert_eq!(SettingsMask::from_bits(0xffff_ffff).bits(), 0x1fff);
}
