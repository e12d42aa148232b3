//! Scan pipeline module
//!
//! This module drives scanner add-ons through a capture session: settings
//! negotiation, the blocking start, assembly of the raw sample stream into an
//! image, push-style delivery and writing the result to disk.

pub mod common;
pub mod conversions;
pub mod device;
pub mod notify;
pub mod output;
pub mod session;
pub mod settings;
pub mod stream;

pub use common::{CaptureTimings, Result, ScanError, StatusCode};

pub use device::{
    CancelToken, DeviceRegistry, ScanDevice, ScanVersion, SimulatedScanner, TestPattern,
};

pub use settings::{
    ImageType, RangePolicy, ScanRect, ScanSettings, SettingId, SettingKind, SettingValue,
    SettingsMask,
};

pub use session::{Interrupter, Phase, Pump, Session, SessionConfig, SessionConfigBuilder};

pub use stream::{CapturedImage, Completion, Image, StreamAssembler};

pub use notify::{BridgeEvent, NotificationBridge};

pub use output::{ImageWriter, OutputConfig, OutputConfigBuilder, TiffCompression, TiffImageWriter};

pub use conversions::{CaptureReport, ScanToTiffPipeline};
