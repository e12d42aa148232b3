//! Scanner device module
//!
//! This module defines the interface scanner add-ons implement, the
//! cancellation signal for the blocking `start` call, a registry of named
//! devices and a simulated scanner.

mod cancel;
mod registry;
mod scanner;
pub mod simulated;

pub use cancel::CancelToken;
pub use registry::DeviceRegistry;
pub use scanner::{DataStatus, DeviceResult, ScanDevice, ScanVersion, device_error};
pub use simulated::{DeviceStats, SimulatedScanner, TestPattern, TriggerHandle, TriggerMode};
