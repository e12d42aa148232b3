use rayon::prelude::*;

use crate::scan_pipeline::common::error::{Result, ScanError};
use crate::scan_pipeline::settings::ImageType;
use crate::scan_pipeline::stream::types::{DEST_BYTES_PER_PIXEL, PAD};

/// Destination intensity for a set bit in binary scans.
pub const BINARY_ON: u8 = 0x00;
/// Destination intensity for a clear bit in binary scans.
pub const BINARY_OFF: u8 = 0xFF;

/// Converts one source row into `dst`, which holds exactly one destination
/// row. Source padding past the packed row is ignored.
pub fn convert_row(format: ImageType, src: &[u8], dst: &mut [u8]) -> Result<()> {
    let pixels = dst.chunks_exact_mut(DEST_BYTES_PER_PIXEL);
    match format {
        ImageType::Binary => {
            for (x, px) in pixels.enumerate() {
                let byte = src.get(x / 8).copied().unwrap_or(0);
                let v = if byte & (0x80 >> (x % 8)) != 0 {
                    BINARY_ON
                } else {
                    BINARY_OFF
                };
                px.copy_from_slice(&[v, v, v, PAD]);
            }
        }
        ImageType::Gray => {
            for (px, &v) in pixels.zip(src) {
                px.copy_from_slice(&[v, v, v, PAD]);
            }
        }
        ImageType::Rgb => {
            for (px, rgb) in pixels.zip(src.chunks_exact(3)) {
                px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], PAD]);
            }
        }
        ImageType::Unknown => return Err(ScanError::UnsupportedFormat(format)),
    }
    Ok(())
}

/// Converts consecutive rows. `src` holds whole source rows of `src_stride`
/// bytes and `dst` the matching destination rows. Rows go through rayon when
/// `parallel` is set; each row lands at its own offset either way.
pub fn convert_rows(
    format: ImageType,
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    parallel: bool,
) -> Result<()> {
    if format == ImageType::Unknown {
        return Err(ScanError::UnsupportedFormat(format));
    }
    if src_stride == 0 || dst_stride == 0 {
        return Err(ScanError::StrideUnknown);
    }
    if parallel {
        dst.par_chunks_mut(dst_stride)
            .zip(src.par_chunks(src_stride))
            .try_for_each(|(out, row)| convert_row(format, row, out))
    } else {
        dst.chunks_mut(dst_stride)
            .zip(src.chunks(src_stride))
            .try_for_each(|(out, row)| convert_row(format, row, out))
    }
}
