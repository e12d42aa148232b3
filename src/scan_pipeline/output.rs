//! Image output module
//!
//! Writers that encode assembled scans into image files.

pub mod tiff_writer;
pub mod types;
pub mod writer;

pub use tiff_writer::TiffImageWriter;
pub use types::{OutputConfig, OutputConfigBuilder, TiffCompression};
pub use writer::ImageWriter;
