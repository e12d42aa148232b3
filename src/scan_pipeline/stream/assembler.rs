use tracing::{debug, warn};

use crate::scan_pipeline::common::error::{Result, ScanError};
use crate::scan_pipeline::settings::{ImageType, ScanSettings, packed_row_bytes};
use crate::scan_pipeline::stream::convert::{convert_row, convert_rows};
use crate::scan_pipeline::stream::types::{
    CapturedImage, Completion, DEST_BYTES_PER_PIXEL, Feed, Image, RawChunk,
};

/// Rows a chunk must hold before conversion is spread over the rayon pool.
pub const DEFAULT_PARALLEL_MIN_ROWS: usize = 64;

/// Source layout of one image, fixed when capture starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    pub format: ImageType,
    pub width: u32,
    pub height: u32,
    /// Bits per pixel the device reports for `format`.
    pub pixel_bits: u32,
    /// Source bytes per row including device padding.
    pub row_bytes: u32,
}

impl StreamGeometry {
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Self {
            format: settings.image_type,
            width: settings.pixel_width,
            height: settings.pixel_height,
            pixel_bits: settings.pixel_bits,
            row_bytes: settings.row_bytes,
        }
    }

    /// Bytes the device is expected to deliver for the whole image.
    pub fn total_bytes(&self) -> u64 {
        u64::from(self.row_bytes) * u64::from(self.height)
    }

    /// Checks that the layout describes an image the assembler can build.
    pub fn validate(&self) -> Result<()> {
        let Some(bits) = self.format.pixel_bits() else {
            return Err(ScanError::UnsupportedFormat(self.format));
        };
        if self.pixel_bits != bits {
            return Err(ScanError::InvalidGeometry(format!(
                "{:?} samples are {bits} bits but the device reports {}",
                self.format, self.pixel_bits
            )));
        }
        if self.row_bytes == 0 {
            return Err(ScanError::StrideUnknown);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ScanError::InvalidGeometry(format!(
                "image is {}x{} pixels",
                self.width, self.height
            )));
        }
        let packed = packed_row_bytes(self.width, bits);
        if u64::from(self.row_bytes) < packed {
            return Err(ScanError::InvalidGeometry(format!(
                "row stride {} is shorter than {packed} bytes of samples",
                self.row_bytes
            )));
        }
        Ok(())
    }
}

/// Rebuilds one image from raw device chunks.
///
/// Chunks must arrive in delivery order. Bytes that do not complete a row are
/// held back and prefixed to the next chunk.
#[derive(Debug)]
pub struct StreamAssembler {
    geometry: StreamGeometry,
    row_bytes: usize,
    dest_row_bytes: usize,
    total: u64,
    consumed: u64,
    carry: Vec<u8>,
    image: Image,
    cursor: usize,
    rows: u32,
    parallel_min_rows: usize,
    completion: Option<Completion>,
}

impl StreamAssembler {
    pub fn new(geometry: StreamGeometry) -> Result<Self> {
        geometry.validate()?;
        let image = Image::new(geometry.width, geometry.height)?;
        let row_bytes = geometry.row_bytes as usize;
        debug!(
            format = ?geometry.format,
            width = geometry.width,
            height = geometry.height,
            row_bytes,
            total = geometry.total_bytes(),
            "Stream assembler ready"
        );
        Ok(Self {
            geometry,
            row_bytes,
            dest_row_bytes: geometry.width as usize * DEST_BYTES_PER_PIXEL,
            total: geometry.total_bytes(),
            consumed: 0,
            carry: Vec::with_capacity(row_bytes),
            image,
            cursor: 0,
            rows: 0,
            parallel_min_rows: DEFAULT_PARALLEL_MIN_ROWS,
            completion: None,
        })
    }

    pub fn with_parallel_min_rows(mut self, rows: usize) -> Self {
        self.parallel_min_rows = rows.max(1);
        self
    }

    pub fn geometry(&self) -> &StreamGeometry {
        &self.geometry
    }

    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Destination bytes written so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rows_written(&self) -> u32 {
        self.rows
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Feeds the next chunk.
    ///
    /// Bytes past the expected total are not written; they complete the image
    /// and are reported as [`ScanError::Overrun`]. The finished image stays
    /// available through [`StreamAssembler::finish`].
    pub fn feed(&mut self, chunk: RawChunk<'_>) -> Result<Feed> {
        if self.row_bytes == 0 {
            return Err(ScanError::StrideUnknown);
        }
        if chunk.is_end() {
            return Ok(Feed::Complete(self.end_of_data()));
        }

        let bytes = chunk.bytes();
        if let Some(completion) = self.completion {
            warn!(?completion, bytes = bytes.len(), "Data after the image completed");
            return Err(ScanError::Overrun {
                excess: bytes.len(),
                expected: self.total,
            });
        }

        let remaining = usize::try_from(self.total - self.consumed).unwrap_or(usize::MAX);
        let (accepted, excess) = bytes.split_at(bytes.len().min(remaining));
        self.assemble(accepted)?;
        self.consumed += accepted.len() as u64;

        if self.consumed == self.total {
            self.completion = Some(Completion::Full);
            debug!(bytes = self.total, rows = self.rows, "Image complete");
        }
        if !excess.is_empty() {
            warn!(
                excess = excess.len(),
                expected = self.total,
                "Device delivered more data than advertised"
            );
            return Err(ScanError::Overrun {
                excess: excess.len(),
                expected: self.total,
            });
        }

        Ok(match self.completion {
            Some(completion) => Feed::Complete(completion),
            None => Feed::Partial { rows: self.rows },
        })
    }

    /// Hands the image over. An image that never completed counts as
    /// truncated at the bytes received so far.
    pub fn finish(mut self) -> CapturedImage {
        let completion = self.end_of_data();
        CapturedImage {
            image: self.image,
            completion,
        }
    }

    fn end_of_data(&mut self) -> Completion {
        if let Some(completion) = self.completion {
            return completion;
        }
        let completion = if self.consumed >= self.total {
            Completion::Full
        } else {
            Completion::Truncated {
                received: self.consumed,
                expected: self.total,
            }
        };
        if !self.carry.is_empty() {
            debug!(bytes = self.carry.len(), "Discarding partial row at end of data");
            self.carry.clear();
        }
        debug!(?completion, rows = self.rows, "End of data");
        self.completion = Some(completion);
        completion
    }

    fn assemble(&mut self, mut input: &[u8]) -> Result<()> {
        let (format, row_bytes, dest_row_bytes) =
            (self.geometry.format, self.row_bytes, self.dest_row_bytes);

        if !self.carry.is_empty() {
            let needed = row_bytes - self.carry.len();
            let (head, rest) = input.split_at(needed.min(input.len()));
            self.carry.extend_from_slice(head);
            input = rest;
            if self.carry.len() < row_bytes {
                return Ok(());
            }
            let row = std::mem::take(&mut self.carry);
            let dst = self.reserve(1)?;
            convert_row(format, &row, dst)?;
            self.commit(1);
            self.carry = row;
            self.carry.clear();
        }

        let whole_rows = input.len() / row_bytes;
        if whole_rows > 0 {
            let (rows, rest) = input.split_at(whole_rows * row_bytes);
            let parallel = whole_rows >= self.parallel_min_rows;
            let dst = self.reserve(whole_rows)?;
            convert_rows(format, rows, row_bytes, dst, dest_row_bytes, parallel)?;
            self.commit(whole_rows);
            input = rest;
        }

        self.carry.extend_from_slice(input);
        Ok(())
    }

    /// The destination slice for the next `rows` rows.
    fn reserve(&mut self, rows: usize) -> Result<&mut [u8]> {
        let len = rows * self.dest_row_bytes;
        let capacity = self.image.data.len();
        let end = self.cursor.checked_add(len).filter(|end| *end <= capacity);
        match end {
            Some(end) => Ok(&mut self.image.data[self.cursor..end]),
            None => Err(ScanError::OutOfBounds {
                offset: self.cursor,
                len,
                capacity,
            }),
        }
    }

    fn commit(&mut self, rows: usize) {
        self.cursor += rows * self.dest_row_bytes;
        self.rows += rows as u32;
    }
}
