use thiserror::Error;

use crate::scan_pipeline::common::status::StatusCode;
use crate::scan_pipeline::device::ScanVersion;
use crate::scan_pipeline::session::{Operation, Phase};
use crate::scan_pipeline::settings::{ImageType, SettingId};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{operation} is not allowed while the session is {phase}")]
    Phase { operation: Operation, phase: Phase },

    #[error("Unknown setting id: {0:#x}")]
    UnknownSetting(u32),

    #[error("Invalid value for {id}: {reason}")]
    InvalidSetting { id: SettingId, reason: String },

    #[error("Device error ({status}): {message}")]
    Device { status: StatusCode, message: String },

    #[error("Capture cancelled by user")]
    UserCancelled,

    #[error("Device reports version {found}, at least {required} is required")]
    VersionTooOld {
        found: ScanVersion,
        required: ScanVersion,
    },

    #[error("No registered device matches {0:?}")]
    NoMatchingDevice(Option<String>),

    #[error("Invalid capture geometry: {0}")]
    InvalidGeometry(String),

    #[error("Row stride is zero or unknown")]
    StrideUnknown,

    #[error("Unsupported source pixel format: {0:?}")]
    UnsupportedFormat(ImageType),

    #[error("Write of {len} bytes at offset {offset} exceeds image size {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Device delivered {excess} bytes beyond the {expected} expected")]
    Overrun { excess: usize, expected: u64 },

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    /// Maps the error onto the device-boundary status taxonomy.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Phase { .. } => StatusCode::BadPhase,
            Self::UnknownSetting(_) | Self::InvalidSetting { .. } => StatusCode::InvalidSetting,
            Self::Device { status, .. } => *status,
            Self::UserCancelled => StatusCode::UserCancel,
            Self::VersionTooOld { .. } => StatusCode::AddonError,
            Self::NoMatchingDevice(_) => StatusCode::NoAddon,
            Self::InvalidGeometry(_) | Self::UnsupportedFormat(_) => StatusCode::BadConfig,
            Self::StrideUnknown | Self::OutOfBounds { .. } | Self::Overrun { .. } => {
                StatusCode::Error
            }
            Self::OutputWriteError(_) | Self::EncodeError(_) | Self::IoError(_) => {
                StatusCode::Error
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    pub(crate) fn invalid(id: SettingId, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
