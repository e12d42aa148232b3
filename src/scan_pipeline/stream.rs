//! Stream assembly module
//!
//! Turns the raw sample bytes a scanner delivers during capture into an
//! interleaved four-channel image.

mod assembler;
pub mod convert;
pub mod types;

#[cfg(test)]
mod tests;

pub use assembler::{DEFAULT_PARALLEL_MIN_ROWS, StreamAssembler, StreamGeometry};
pub use convert::{BINARY_OFF, BINARY_ON, convert_row, convert_rows};
pub use types::{CapturedImage, Completion, DEST_BYTES_PER_PIXEL, Feed, Image, PAD, RawChunk};
