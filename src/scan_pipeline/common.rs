//! Common utilities module
//!
//! This module contains the error type, the device status taxonomy and
//! capture timing helpers shared across the scan pipeline.

pub mod error;
pub mod status;
pub mod timing;

pub use error::{Result, ScanError};
pub use status::StatusCode;
pub use timing::{CaptureTimings, StepTiming, Timer};
