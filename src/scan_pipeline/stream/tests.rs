use crate::scan_pipeline::common::error::ScanError;
use crate::scan_pipeline::settings::ImageType;
use crate::scan_pipeline::stream::{
    Completion, DEST_BYTES_PER_PIXEL, Feed, PAD, RawChunk, StreamAssembler, StreamGeometry,
    convert_rows,
};

fn geometry(format: ImageType, width: u32, height: u32, row_bytes: u32) -> StreamGeometry {
    StreamGeometry {
        format,
        width,
        height,
        pixel_bits: format.pixel_bits().unwrap_or(0),
        row_bytes,
    }
}

fn assembler(geometry: StreamGeometry) -> StreamAssembler {
    StreamAssembler::new(geometry).expect("valid geometry")
}

/// Deterministic pseudo-random sample stream.
fn samples(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

fn feed_in_chunks(geometry: StreamGeometry, stream: &[u8], sizes: &[usize]) -> StreamAssembler {
    let mut asm = assembler(geometry);
    let mut offset = 0;
    let mut next = sizes.iter().copied().cycle();
    while offset < stream.len() {
        let size = next.next().unwrap_or(1).max(1);
        let end = (offset + size).min(stream.len());
        asm.feed(RawChunk::new(&stream[offset..end])).expect("chunk accepted");
        assert!(asm.cursor() <= asm.image().data.len());
        offset = end;
    }
    asm
}

#[test]
fn test_gray_scan_in_five_chunks() {
    let stream: Vec<u8> = (0..5000u32).map(|i| (i % 100) as u8).collect();
    let mut asm = assembler(geometry(ImageType::Gray, 100, 50, 100));
    assert_eq!(asm.total_bytes(), 5000);

    for (i, chunk) in stream.chunks(1000).enumerate() {
        let feed = asm.feed(RawChunk::new(chunk)).expect("chunk accepted");
        if i < 4 {
            assert_eq!(feed, Feed::Partial { rows: (i as u32 + 1) * 10 });
        } else {
            assert_eq!(feed, Feed::Complete(Completion::Full));
        }
    }

    let captured = asm.finish();
    assert!(captured.is_complete());
    assert_eq!(captured.image.data.len(), 100 * 50 * DEST_BYTES_PER_PIXEL);
    for y in 0..50 {
        for x in 0..100 {
            let v = x as u8;
            assert_eq!(captured.image.pixel(x, y), Some([v, v, v, PAD]));
        }
    }
}

#[test]
fn test_chunk_boundaries_do_not_change_the_image() {
    // 7 RGB pixels are 21 sample bytes, padded to 24 per row.
    let geom = geometry(ImageType::Rgb, 7, 9, 24);
    let stream = samples(24 * 9);

    let whole = feed_in_chunks(geom, &stream, &[stream.len()]).finish();
    assert!(whole.is_complete());

    for sizes in [
        vec![1],
        vec![2],
        vec![5],
        vec![23],
        vec![24],
        vec![25],
        vec![47, 1, 3],
        vec![100, 7],
    ] {
        let split = feed_in_chunks(geom, &stream, &sizes).finish();
        assert_eq!(split, whole, "chunk sizes {sizes:?}");
    }
}

#[test]
fn test_parallel_conversion_matches_sequential() {
    let geom = geometry(ImageType::Gray, 33, 200, 36);
    let stream = samples(36 * 200);

    let mut sequential = assembler(geom).with_parallel_min_rows(usize::MAX);
    let mut parallel = assembler(geom).with_parallel_min_rows(1);
    sequential.feed(RawChunk::new(&stream)).expect("accepted");
    parallel.feed(RawChunk::new(&stream)).expect("accepted");

    assert_eq!(sequential.finish(), parallel.finish());
}

#[test]
fn test_single_byte_chunks_stay_in_bounds() {
    let geom = geometry(ImageType::Binary, 13, 6, 4);
    let stream = samples(4 * 6);
    let mut asm = assembler(geom);
    let capacity = asm.image().data.len();
    let dest_row = 13 * DEST_BYTES_PER_PIXEL;

    for byte in &stream {
        asm.feed(RawChunk::new(std::slice::from_ref(byte))).expect("accepted");
        assert!(asm.cursor() <= capacity);
        assert_eq!(asm.cursor() % dest_row, 0);
    }
    assert_eq!(asm.cursor(), capacity);
    assert_eq!(asm.completion(), Some(Completion::Full));
}

#[test]
fn test_binary_bits_are_msb_first() {
    let mut asm = assembler(geometry(ImageType::Binary, 10, 2, 2));
    asm.feed(RawChunk::new(&[0b1010_0000, 0b1100_0000, 0xFF, 0x00]))
        .expect("accepted");
    let image = asm.finish().image;

    let black = [0x00, 0x00, 0x00, PAD];
    let white = [0xFF, 0xFF, 0xFF, PAD];
    let row0: Vec<_> = (0..10).map(|x| image.pixel(x, 0)).collect();
    let expected0 = [black, white, black, white, white, white, white, white, black, black];
    assert_eq!(row0, expected0.map(Some).to_vec());

    let row1: Vec<_> = (0..10).map(|x| image.pixel(x, 1)).collect();
    let mut expected1 = [black; 10];
    expected1[8] = white;
    expected1[9] = white;
    assert_eq!(row1, expected1.map(Some).to_vec());
}

#[test]
fn test_rgb_copies_channels_and_pads() {
    let mut asm = assembler(geometry(ImageType::Rgb, 2, 1, 8));
    asm.feed(RawChunk::new(&[1, 2, 3, 4, 5, 6, 0xAA, 0xAA]))
        .expect("accepted");
    let image = asm.finish().image;
    assert_eq!(image.data, vec![1, 2, 3, PAD, 4, 5, 6, PAD]);
}

#[test]
fn test_unknown_format_fails_closed() {
    let result = StreamAssembler::new(geometry(ImageType::Unknown, 10, 10, 10));
    assert!(matches!(result, Err(ScanError::UnsupportedFormat(ImageType::Unknown))));

    let mut dst = vec![0; 16];
    let converted = convert_rows(ImageType::Unknown, &[0; 4], 4, &mut dst, 16, false);
    assert!(matches!(converted, Err(ScanError::UnsupportedFormat(_))));
}

#[test]
fn test_geometry_is_checked_up_front() {
    assert!(matches!(
        StreamAssembler::new(geometry(ImageType::Gray, 100, 50, 0)),
        Err(ScanError::StrideUnknown)
    ));
    assert!(matches!(
        StreamAssembler::new(geometry(ImageType::Rgb, 100, 50, 200)),
        Err(ScanError::InvalidGeometry(_))
    ));
    assert!(matches!(
        StreamAssembler::new(geometry(ImageType::Gray, 0, 50, 100)),
        Err(ScanError::InvalidGeometry(_))
    ));
}

#[test]
fn test_pixel_bits_must_match_format() {
    let gray16 = StreamGeometry {
        pixel_bits: 16,
        ..geometry(ImageType::Gray, 100, 50, 200)
    };
    assert!(matches!(
        StreamAssembler::new(gray16),
        Err(ScanError::InvalidGeometry(_))
    ));

    let rgb32 = StreamGeometry {
        pixel_bits: 32,
        ..geometry(ImageType::Rgb, 100, 50, 400)
    };
    assert!(matches!(
        StreamAssembler::new(rgb32),
        Err(ScanError::InvalidGeometry(_))
    ));
}

#[test]
fn test_early_end_is_truncated() {
    let mut asm = assembler(geometry(ImageType::Gray, 100, 50, 100));
    let feed = asm.feed(RawChunk::new(&[7; 250])).expect("accepted");
    assert_eq!(feed, Feed::Partial { rows: 2 });

    let end = asm.feed(RawChunk::end()).expect("end accepted");
    assert_eq!(
        end,
        Feed::Complete(Completion::Truncated {
            received: 250,
            expected: 5000
        })
    );
    assert_eq!(asm.rows_written(), 2);
    assert_eq!(asm.cursor(), 2 * 100 * DEST_BYTES_PER_PIXEL);

    let captured = asm.finish();
    assert!(!captured.is_complete());
    assert_eq!(captured.image.pixel(0, 2), Some([0, 0, 0, 0]));
}

#[test]
fn test_end_after_all_bytes_is_full() {
    let mut asm = assembler(geometry(ImageType::Gray, 4, 2, 4));
    asm.feed(RawChunk::new(&[1; 8])).expect("accepted");
    assert_eq!(asm.feed(RawChunk::end()).expect("end"), Feed::Complete(Completion::Full));
}

#[test]
fn test_negative_or_zero_reported_length_ends_data() {
    assert!(RawChunk::with_reported(&[1, 2, 3], 0).is_end());
    assert!(RawChunk::with_reported(&[1, 2, 3], -4).is_end());
    assert_eq!(RawChunk::with_reported(&[1, 2, 3], 2).bytes(), &[1, 2]);
    assert_eq!(RawChunk::with_reported(&[1, 2, 3], 9).bytes(), &[1, 2, 3]);

    let mut asm = assembler(geometry(ImageType::Gray, 4, 2, 4));
    let feed = asm
        .feed(RawChunk::with_reported(&[1; 8], 0))
        .expect("end accepted");
    assert_eq!(
        feed,
        Feed::Complete(Completion::Truncated {
            received: 0,
            expected: 8
        })
    );
}

#[test]
fn test_overrun_is_reported_and_image_kept() {
    let mut asm = assembler(geometry(ImageType::Gray, 4, 2, 4));
    let result = asm.feed(RawChunk::new(&[9; 11]));

    assert!(matches!(result, Err(ScanError::Overrun { excess: 3, expected: 8 })));
    assert_eq!(asm.completion(), Some(Completion::Full));

    let late = asm.feed(RawChunk::new(&[1]));
    assert!(matches!(late, Err(ScanError::Overrun { excess: 1, .. })));

    let captured = asm.finish();
    assert!(captured.is_complete());
    assert_eq!(captured.image.pixel(3, 1), Some([9, 9, 9, PAD]));
}
