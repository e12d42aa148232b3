//! Capture-to-file conversions
//!
//! This module provides pipelines that combine a session capture with an
//! image writer.

pub mod scan_to_tiff;

pub use scan_to_tiff::{CaptureReport, ScanToTiffPipeline};
