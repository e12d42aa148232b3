use std::io::Write;

use crate::scan_pipeline::common::error::Result;
use crate::scan_pipeline::output::types::OutputConfig;
use crate::scan_pipeline::stream::Image;

/// Encodes an assembled image into some file format.
pub trait ImageWriter {
    fn write_image(&self, image: &Image, output: &mut dyn Write, config: &OutputConfig)
    -> Result<()>;
}
