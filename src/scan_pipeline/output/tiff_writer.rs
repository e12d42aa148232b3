use std::io::{Cursor, Write};

use tiff::encoder::colortype::RGBA8;
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::debug;

use crate::scan_pipeline::common::error::{Result, ScanError};
use crate::scan_pipeline::output::types::{OutputConfig, TiffCompression};
use crate::scan_pipeline::output::writer::ImageWriter;
use crate::scan_pipeline::stream::{DEST_BYTES_PER_PIXEL, Image};

/// Writes images as 8-bit RGBA TIFF; the pad channel becomes alpha.
pub struct TiffImageWriter;

impl ImageWriter for TiffImageWriter {
    fn write_image(
        &self,
        image: &Image,
        output: &mut dyn Write,
        config: &OutputConfig,
    ) -> Result<()> {
        debug!(width = image.width, height = image.height, "Encoding TIFF image");

        let expected = image.width as usize * image.height as usize * DEST_BYTES_PER_PIXEL;
        if image.data.len() != expected {
            return Err(ScanError::EncodeError(format!(
                "{}x{} image needs {expected} bytes, buffer holds {}",
                image.width,
                image.height,
                image.data.len()
            )));
        }

        let compression = match config.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        };

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| ScanError::EncodeError(e.to_string()))?
            .with_compression(compression);

        if let Some(predictor) = config.predictor {
            encoder = encoder.with_predictor(match predictor {
                2 => Predictor::Horizontal,
                _ => Predictor::None,
            });
        }

        encoder
            .write_image::<RGBA8>(image.width, image.height, &image.data)
            .map_err(|e| ScanError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;
        debug!(bytes = buffer.len(), "TIFF encoding complete");
        Ok(())
    }
}
