//! Stream assembly data types

use crate::scan_pipeline::common::error::{Result, ScanError};

/// Bytes per destination pixel: R, G, B and a pad channel.
pub const DEST_BYTES_PER_PIXEL: usize = 4;

/// Value of the pad channel in every destination pixel.
pub const PAD: u8 = 0xFF;

/// An assembled image in interleaved R,G,B,pad layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    /// Allocates a zeroed buffer for `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(DEST_BYTES_PER_PIXEL))
            .ok_or_else(|| {
                ScanError::InvalidGeometry(format!("{width}x{height} pixels do not fit in memory"))
            })?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * DEST_BYTES_PER_PIXEL
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let stride = self.row_bytes();
        let start = (y as usize).checked_mul(stride)?;
        self.data.get(start..start + stride)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; DEST_BYTES_PER_PIXEL]> {
        if x >= self.width {
            return None;
        }
        let start = x as usize * DEST_BYTES_PER_PIXEL;
        let px = self.row(y)?.get(start..start + DEST_BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// One delivery from the device: the bytes plus the length the device
/// reported for them. A reported length of zero or less ends the image.
#[derive(Debug, Clone, Copy)]
pub struct RawChunk<'a> {
    data: &'a [u8],
    reported: i64,
}

impl<'a> RawChunk<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            reported: i64::try_from(data.len()).unwrap_or(i64::MAX),
        }
    }

    pub fn with_reported(data: &'a [u8], reported: i64) -> Self {
        Self { data, reported }
    }

    /// The end-of-data signal.
    pub fn end() -> Self {
        Self {
            data: &[],
            reported: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.reported <= 0
    }

    /// The delivered bytes, limited to the reported length.
    pub fn bytes(&self) -> &'a [u8] {
        let len = usize::try_from(self.reported).unwrap_or(0).min(self.data.len());
        &self.data[..len]
    }
}

/// How an image finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every expected byte arrived.
    Full,
    /// The device signalled end of data early.
    Truncated { received: u64, expected: u64 },
}

impl Completion {
    pub fn is_full(self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Result of feeding one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// More data is needed; `rows` have been written so far.
    Partial { rows: u32 },
    Complete(Completion),
}

/// An image handed to the consumer together with how it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub image: Image,
    pub completion: Completion,
}

impl CapturedImage {
    pub fn is_complete(&self) -> bool {
        self.completion.is_full()
    }
}
