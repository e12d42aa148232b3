use std::fmt;

use crate::scan_pipeline::common::error::ScanError;
use crate::scan_pipeline::common::status::StatusCode;
use crate::scan_pipeline::device::cancel::CancelToken;
use crate::scan_pipeline::settings::{SettingId, SettingKind, SettingValue, SettingsMask};

/// Device calls fail with a bare status code; the session layer attaches the
/// device's own message when it surfaces the failure.
pub type DeviceResult<T> = std::result::Result<T, StatusCode>;

/// Protocol version reported by a device add-on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanVersion {
    pub major: u32,
    pub minor: u32,
    pub incr: u32,
    pub info: String,
}

impl ScanVersion {
    /// Oldest add-on protocol the session layer talks to.
    pub const MINIMUM: ScanVersion = ScanVersion::new(0, 9, 0);

    pub const fn new(major: u32, minor: u32, incr: u32) -> Self {
        Self {
            major,
            minor,
            incr,
            info: String::new(),
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Compares major, minor and increment; `info` is ignored.
    pub fn is_at_least(&self, required: &ScanVersion) -> bool {
        (self.major, self.minor, self.incr) >= (required.major, required.minor, required.incr)
    }
}

impl fmt::Display for ScanVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.incr)
    }
}

/// Outcome of one `data` call: the number of bytes written into the buffer,
/// and whether the device considers the image finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    More(usize),
    End(usize),
}

impl DataStatus {
    pub fn len(self) -> usize {
        match self {
            Self::More(n) | Self::End(n) => n,
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn is_end(self) -> bool {
        matches!(self, Self::End(_))
    }
}

/// A scanner add-on.
///
/// The implementing value is the add-on's private per-session state; the
/// session layer owns it exclusively and calls it in protocol order.
pub trait ScanDevice: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> DeviceResult<ScanVersion>;

    fn close(&mut self) -> DeviceResult<()>;

    fn capabilities(&self) -> DeviceResult<SettingsMask>;

    fn get_setting(&self, id: SettingId, kind: SettingKind) -> DeviceResult<SettingValue>;

    /// Applies one setting and reports every setting it affected.
    fn put_setting(&mut self, id: SettingId, value: &SettingValue) -> DeviceResult<SettingsMask>;

    fn open_image(&mut self) -> DeviceResult<()>;

    fn close_image(&mut self) -> DeviceResult<()>;

    /// Blocks until the device is ready to deliver data. Must return
    /// `Err(StatusCode::UserCancel)` promptly once `cancel` fires.
    fn start(&mut self, cancel: &CancelToken) -> DeviceResult<()>;

    /// Fills `buffer` with raw sample bytes.
    fn data(&mut self, buffer: &mut [u8]) -> DeviceResult<DataStatus>;

    /// Whether the document feeder holds another page.
    fn adf_ready(&self) -> bool {
        false
    }

    fn error_message(&self, status: StatusCode) -> String {
        status.description().to_owned()
    }

    /// Row padding convention in bytes.
    fn row_alignment(&self) -> u32 {
        1
    }
}

impl<D: ScanDevice + ?Sized> ScanDevice for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn open(&mut self) -> DeviceResult<ScanVersion> {
        (**self).open()
    }

    fn close(&mut self) -> DeviceResult<()> {
        (**self).close()
    }

    fn capabilities(&self) -> DeviceResult<SettingsMask> {
        (**self).capabilities()
    }

    fn get_setting(&self, id: SettingId, kind: SettingKind) -> DeviceResult<SettingValue> {
        (**self).get_setting(id, kind)
    }

    fn put_setting(&mut self, id: SettingId, value: &SettingValue) -> DeviceResult<SettingsMask> {
        (**self).put_setting(id, value)
    }

    fn open_image(&mut self) -> DeviceResult<()> {
        (**self).open_image()
    }

    fn close_image(&mut self) -> DeviceResult<()> {
        (**self).close_image()
    }

    fn start(&mut self, cancel: &CancelToken) -> DeviceResult<()> {
        (**self).start(cancel)
    }

    fn data(&mut self, buffer: &mut [u8]) -> DeviceResult<DataStatus> {
        (**self).data(buffer)
    }

    fn adf_ready(&self) -> bool {
        (**self).adf_ready()
    }

    fn error_message(&self, status: StatusCode) -> String {
        (**self).error_message(status)
    }

    fn row_alignment(&self) -> u32 {
        (**self).row_alignment()
    }
}

/// Turns a device status into the session-level error, attaching the
/// device's message.
pub fn device_error<D: ScanDevice + ?Sized>(device: &D, status: StatusCode) -> ScanError {
    match status {
        StatusCode::UserCancel => ScanError::UserCancelled,
        status => ScanError::Device {
            status,
            message: device.error_message(status),
        },
    }
}
