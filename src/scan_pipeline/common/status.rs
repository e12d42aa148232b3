//! Status codes shared by the session layer and device add-ons.

use std::fmt;

/// Result taxonomy of the device boundary.
///
/// The numeric codes are the wire values scanner add-ons report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    /// All scan data has been read. Not a failure.
    DataEnd,
    Error,
    /// Wrong value for an argument.
    BadParam,
    /// Call made in the wrong order.
    BadPhase,
    BadConfig,
    /// No add-on contains the requested scanner.
    NoAddon,
    /// Internal add-on failure.
    AddonError,
    /// The add-on could not find the scanner.
    NoScanner,
    UserCancel,
    /// Invalid session handle.
    BadId,
    /// The scanner rejected one or more settings.
    InvalidSetting,
}

const SCAN_ERROR_BASE: i32 = i32::MIN + 0xc000;

impl StatusCode {
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::DataEnd => SCAN_ERROR_BASE,
            Self::Error => SCAN_ERROR_BASE + 1,
            Self::BadParam => SCAN_ERROR_BASE + 2,
            Self::BadPhase => SCAN_ERROR_BASE + 3,
            Self::BadConfig => SCAN_ERROR_BASE + 4,
            Self::NoAddon => SCAN_ERROR_BASE + 5,
            Self::AddonError => SCAN_ERROR_BASE + 6,
            Self::NoScanner => SCAN_ERROR_BASE + 7,
            Self::UserCancel => SCAN_ERROR_BASE + 8,
            Self::BadId => SCAN_ERROR_BASE + 9,
            Self::InvalidSetting => SCAN_ERROR_BASE + 10,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        const ALL: [StatusCode; 12] = [
            StatusCode::Success,
            StatusCode::DataEnd,
            StatusCode::Error,
            StatusCode::BadParam,
            StatusCode::BadPhase,
            StatusCode::BadConfig,
            StatusCode::NoAddon,
            StatusCode::AddonError,
            StatusCode::NoScanner,
            StatusCode::UserCancel,
            StatusCode::BadId,
            StatusCode::InvalidSetting,
        ];
        ALL.into_iter().find(|status| status.code() == code)
    }

    /// Success and end-of-data are the two non-failure outcomes.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success | Self::DataEnd)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::DataEnd => "end of scan data",
            Self::Error => "scanner error",
            Self::BadParam => "bad parameter",
            Self::BadPhase => "call made out of order",
            Self::BadConfig => "bad configuration",
            Self::NoAddon => "no add-on for the requested scanner",
            Self::AddonError => "scanner add-on error",
            Self::NoScanner => "scanner not found",
            Self::UserCancel => "cancelled by user",
            Self::BadId => "invalid session handle",
            Self::InvalidSetting => "scanner rejected the setting",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
