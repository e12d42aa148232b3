//! Simulated flatbed scanner.
//!
//! Behaves like a minimal scanner add-on: it keeps its own settings views,
//! waits for a trigger in `start` and produces a synthetic test pattern from
//! `data`. Used by the demo binary and throughout the tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::scan_pipeline::common::status::StatusCode;
use crate::scan_pipeline::device::cancel::CancelToken;
use crate::scan_pipeline::device::scanner::{DataStatus, DeviceResult, ScanDevice, ScanVersion};
use crate::scan_pipeline::settings::{
    ImageType, ScanRect, ScanSettings, SettingId, SettingKind, SettingValue, SettingsMask,
    identity_tone_map,
};

const TRIGGER_POLL: Duration = Duration::from_millis(5);

/// Sample data produced by the simulated scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    /// Left-to-right ramp; RGB adds a top-to-bottom ramp in green, binary
    /// alternates checker rows.
    Gradient,
    /// Every sample byte set to the given value.
    Solid(u8),
}

/// How `start` decides the device is ready.
#[derive(Debug, Clone)]
pub enum TriggerMode {
    /// Ready as soon as `start` is called.
    Immediate,
    /// Blocks until [`TriggerHandle::press`] is called, like a scan button.
    Manual(TriggerHandle),
}

/// Remote control for a manually triggered scanner.
#[derive(Debug, Clone, Default)]
pub struct TriggerHandle {
    inner: Arc<TriggerInner>,
}

#[derive(Debug, Default)]
struct TriggerInner {
    state: Mutex<TriggerState>,
    signal: Condvar,
}

#[derive(Debug, Default)]
struct TriggerState {
    pending: u32,
    dismissed: bool,
}

impl TriggerHandle {
    /// Presses the scan button once; one pending `start` (or the next one)
    /// returns ready.
    pub fn press(&self) {
        let mut state = self.lock();
        state.pending += 1;
        self.inner.signal.notify_all();
    }

    /// Presses the device UI's cancel button; every later `start` fails
    /// with `UserCancel`.
    pub fn dismiss(&self) {
        let mut state = self.lock();
        state.dismissed = true;
        self.inner.signal.notify_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TriggerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self, cancel: &CancelToken) -> DeviceResult<()> {
        let mut state = self.lock();
        loop {
            if state.dismissed || cancel.is_cancelled() {
                return Err(StatusCode::UserCancel);
            }
            if state.pending > 0 {
                state.pending -= 1;
                return Ok(());
            }
            state = self
                .inner
                .signal
                .wait_timeout(state, TRIGGER_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Call counters, shared so tests can observe a device that has been moved
/// into a session or a worker thread.
#[derive(Debug, Default)]
pub struct DeviceStats {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub image_opens: AtomicUsize,
    pub image_closes: AtomicUsize,
    pub starts: AtomicUsize,
    pub data_calls: AtomicUsize,
    pub puts: AtomicUsize,
}

impl DeviceStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct SimulatedScanner {
    name: String,
    version: ScanVersion,
    capabilities: SettingsMask,
    current: ScanSettings,
    minimum: ScanSettings,
    maximum: ScanSettings,
    tone_map: Vec<u8>,
    tone_map3: Vec<u8>,
    alignment: u32,
    trigger: TriggerMode,
    pattern: TestPattern,
    max_transfer: usize,
    stop_after: Option<u64>,
    zero_read_after: Option<u64>,
    overrun: u64,
    adf_pages: u32,
    stats: Arc<DeviceStats>,
    open: bool,
    image_open: bool,
    started: bool,
    row_bytes: u64,
    total_bytes: u64,
    byte_count: u64,
}

impl Default for SimulatedScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedScanner {
    /// A flatbed with an A4 bed, currently set to a one by half inch gray
    /// scan at 100 dpi (100 x 50 pixels).
    pub fn new() -> Self {
        let bed = ScanRect::new(0, 0, 2550, 3508);
        let mut current = ScanSettings {
            area: ScanRect::new(0, 0, 300, 150),
            image_type: ImageType::Gray,
            pixel_bits: 8,
            resolution: 100,
            ..ScanSettings::neutral()
        };
        current.derive_geometry(1);

        let minimum = ScanSettings {
            area: ScanRect::new(0, 0, 30, 30),
            image_type: ImageType::Binary,
            pixel_bits: 1,
            resolution: 50,
            brightness: -100,
            contrast: -100,
            scaling: 25,
            pixel_width: 0,
            pixel_height: 0,
            row_bytes: 0,
        };
        let maximum = ScanSettings {
            area: bed,
            image_type: ImageType::Rgb,
            pixel_bits: 24,
            resolution: 1200,
            brightness: 100,
            contrast: 100,
            scaling: 400,
            pixel_width: 0,
            pixel_height: 0,
            row_bytes: 0,
        };

        Self {
            name: "simulated-flatbed".to_owned(),
            version: ScanVersion::new(0, 9, 0).with_info("Simulated flatbed"),
            capabilities: [
                SettingId::Area,
                SettingId::ImageType,
                SettingId::PixelBits,
                SettingId::Resolution,
                SettingId::Brightness,
                SettingId::Contrast,
                SettingId::Scaling,
                SettingId::ToneMap,
            ]
            .into_iter()
            .collect(),
            current,
            minimum,
            maximum,
            tone_map: identity_tone_map(1),
            tone_map3: identity_tone_map(3),
            alignment: 1,
            trigger: TriggerMode::Immediate,
            pattern: TestPattern::Gradient,
            max_transfer: usize::MAX,
            stop_after: None,
            zero_read_after: None,
            overrun: 0,
            adf_pages: 0,
            stats: Arc::new(DeviceStats::default()),
            open: false,
            image_open: false,
            started: false,
            row_bytes: 0,
            total_bytes: 0,
            byte_count: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: ScanVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_capabilities(mut self, capabilities: SettingsMask) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replaces the current view; derived fields are recomputed.
    pub fn with_current(mut self, settings: ScanSettings) -> Self {
        self.current = settings;
        self.current.derive_geometry(self.alignment);
        self
    }

    pub fn with_row_alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment.max(1);
        self.current.derive_geometry(self.alignment);
        self
    }

    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Caps the bytes returned by one `data` call.
    pub fn with_max_transfer(mut self, bytes: usize) -> Self {
        self.max_transfer = bytes.max(1);
        self
    }

    /// Ends every image after `bytes` bytes, as if cancelled on the device.
    pub fn with_stop_after(mut self, bytes: u64) -> Self {
        self.stop_after = Some(bytes);
        self
    }

    /// After `bytes` bytes every `data` call returns zero bytes without the
    /// end flag, like an add-on that stops mid-image.
    pub fn with_zero_read_after(mut self, bytes: u64) -> Self {
        self.zero_read_after = Some(bytes);
        self
    }

    /// Delivers `bytes` more than the advertised image size.
    pub fn with_overrun(mut self, bytes: u64) -> Self {
        self.overrun = bytes;
        self
    }

    pub fn with_adf_pages(mut self, pages: u32) -> Self {
        self.adf_pages = pages;
        self
    }

    /// Switches to manual triggering and returns the button.
    pub fn with_manual_trigger(mut self) -> (Self, TriggerHandle) {
        let handle = TriggerHandle::default();
        self.trigger = TriggerMode::Manual(handle.clone());
        (self, handle)
    }

    pub fn stats(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }

    fn view(&self, kind: SettingKind) -> &ScanSettings {
        match kind {
            SettingKind::Current => &self.current,
            SettingKind::Minimum => &self.minimum,
            SettingKind::Maximum => &self.maximum,
        }
    }

    fn sample(&self, offset: u64) -> u8 {
        let row = offset / self.row_bytes;
        let column = offset % self.row_bytes;
        if column >= self.current.packed_row_bytes() {
            return 0;
        }
        let value = match (self.pattern, self.current.image_type) {
            (TestPattern::Solid(value), _) => value,
            (TestPattern::Gradient, ImageType::Binary) => {
                if row % 2 == 0 { 0b1010_1010 } else { 0b0101_0101 }
            }
            (TestPattern::Gradient, ImageType::Rgb) => {
                let pixel = column / 3;
                match column % 3 {
                    0 => ramp(pixel, u64::from(self.current.pixel_width)),
                    1 => ramp(row, u64::from(self.current.pixel_height)),
                    _ => 0x80,
                }
            }
            (TestPattern::Gradient, _) => ramp(column, u64::from(self.current.pixel_width)),
        };
        self.tone_map
            .get(usize::from(value))
            .copied()
            .unwrap_or(value)
    }
}

fn ramp(position: u64, extent: u64) -> u8 {
    let span = extent.saturating_sub(1).max(1);
    u8::try_from(position.min(span) * 255 / span).unwrap_or(u8::MAX)
}

impl ScanDevice for SimulatedScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> DeviceResult<ScanVersion> {
        DeviceStats::bump(&self.stats.opens);
        if self.open {
            return Err(StatusCode::BadPhase);
        }
        self.open = true;
        self.image_open = false;
        self.started = false;
        Ok(self.version.clone())
    }

    fn close(&mut self) -> DeviceResult<()> {
        DeviceStats::bump(&self.stats.closes);
        self.open = false;
        self.image_open = false;
        self.started = false;
        Ok(())
    }

    fn capabilities(&self) -> DeviceResult<SettingsMask> {
        Ok(self.capabilities)
    }

    fn get_setting(&self, id: SettingId, kind: SettingKind) -> DeviceResult<SettingValue> {
        if !id.is_derived() && !self.capabilities.contains(id) {
            return Err(StatusCode::BadParam);
        }
        match id {
            SettingId::ToneMap => Ok(SettingValue::Table(self.tone_map.clone())),
            SettingId::ToneMap3 => Ok(SettingValue::Table(self.tone_map3.clone())),
            SettingId::Specific => Ok(SettingValue::Bytes(Vec::new())),
            field => self.view(kind).value(field).ok_or(StatusCode::BadParam),
        }
    }

    fn put_setting(&mut self, id: SettingId, value: &SettingValue) -> DeviceResult<SettingsMask> {
        DeviceStats::bump(&self.stats.puts);
        if id.is_derived() || !self.capabilities.contains(id) {
            return Err(StatusCode::InvalidSetting);
        }
        if self.started {
            return Err(StatusCode::BadPhase);
        }
        let before = self.current.clone();
        match (id, value) {
            (SettingId::ToneMap, SettingValue::Table(table)) => self.tone_map = table.clone(),
            (SettingId::ToneMap3, SettingValue::Table(table)) => self.tone_map3 = table.clone(),
            (SettingId::Specific, _) => {}
            (id, value) => {
                self.current
                    .set_value(id, value)
                    .map_err(|_| StatusCode::InvalidSetting)?;
                if let (SettingId::ImageType, Some(bits)) = (id, self.current.image_type.pixel_bits()) {
                    self.current.pixel_bits = bits;
                }
            }
        }
        self.current.derive_geometry(self.alignment);
        Ok(before.diff(&self.current) | id)
    }

    fn open_image(&mut self) -> DeviceResult<()> {
        DeviceStats::bump(&self.stats.image_opens);
        if !self.open {
            return Err(StatusCode::BadPhase);
        }
        self.image_open = true;
        self.started = false;
        self.row_bytes = 0;
        self.total_bytes = 0;
        self.byte_count = 0;
        Ok(())
    }

    fn close_image(&mut self) -> DeviceResult<()> {
        DeviceStats::bump(&self.stats.image_closes);
        self.image_open = false;
        self.started = false;
        Ok(())
    }

    fn start(&mut self, cancel: &CancelToken) -> DeviceResult<()> {
        DeviceStats::bump(&self.stats.starts);
        if !self.image_open {
            return Err(StatusCode::BadPhase);
        }
        if let TriggerMode::Manual(trigger) = &self.trigger {
            debug!(device = %self.name, "Waiting for scan button");
            trigger.wait(cancel)?;
        } else if cancel.is_cancelled() {
            return Err(StatusCode::UserCancel);
        }

        self.row_bytes = u64::from(self.current.row_bytes);
        self.total_bytes = self.row_bytes * u64::from(self.current.pixel_height);
        self.byte_count = 0;
        if self.row_bytes == 0 {
            return Err(StatusCode::BadConfig);
        }
        self.started = true;
        self.adf_pages = self.adf_pages.saturating_sub(1);
        debug!(
            device = %self.name,
            row_bytes = self.row_bytes,
            total_bytes = self.total_bytes,
            "Scan started"
        );
        Ok(())
    }

    fn data(&mut self, buffer: &mut [u8]) -> DeviceResult<DataStatus> {
        DeviceStats::bump(&self.stats.data_calls);
        if !self.started {
            return Err(StatusCode::BadPhase);
        }
        let end = match self.stop_after {
            Some(stop) => stop.min(self.total_bytes),
            None => self.total_bytes + self.overrun,
        };
        let limit = self.zero_read_after.map_or(end, |quiet| quiet.min(end));
        let remaining = limit.saturating_sub(self.byte_count);
        let count = usize::try_from(remaining)
            .unwrap_or(usize::MAX)
            .min(buffer.len())
            .min(self.max_transfer);

        for (i, byte) in buffer.iter_mut().take(count).enumerate() {
            *byte = self.sample(self.byte_count + i as u64);
        }
        self.byte_count += count as u64;
        trace!(count, byte_count = self.byte_count, limit, "Delivered scan data");

        if self.byte_count >= end {
            Ok(DataStatus::End(count))
        } else {
            Ok(DataStatus::More(count))
        }
    }

    fn adf_ready(&self) -> bool {
        self.adf_pages > 0
    }

    fn error_message(&self, status: StatusCode) -> String {
        format!("{}: {}", self.name, status.description())
    }

    fn row_alignment(&self) -> u32 {
        self.alignment
    }
}
