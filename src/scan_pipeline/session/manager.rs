use tracing::{debug, info, instrument, warn};

use crate::scan_pipeline::common::error::{Result, ScanError};
use crate::scan_pipeline::common::status::StatusCode;
use crate::scan_pipeline::device::{CancelToken, DataStatus, ScanDevice, ScanVersion, device_error};
use crate::scan_pipeline::session::config::SessionConfig;
use crate::scan_pipeline::session::phase::{Operation, Phase};
use crate::scan_pipeline::settings::{
    ScanSettings, SettingId, SettingKind, SettingValue, SettingsMask, SettingsNegotiator,
};
use crate::scan_pipeline::stream::{
    CapturedImage, Completion, Feed, RawChunk, StreamAssembler, StreamGeometry,
};

/// Outcome of one [`Session::pump`] call.
#[derive(Debug)]
pub enum Pump {
    /// The image needs more data; `rows` rows are assembled so far.
    Progress { rows: u32 },
    Complete(CapturedImage),
}

/// Requests that a session stop from another thread.
///
/// A `start` blocked in the device returns [`ScanError::UserCancelled`] and
/// the session closes itself. The request cannot be withdrawn.
#[derive(Debug, Clone)]
pub struct Interrupter {
    cancel: CancelToken,
}

impl Interrupter {
    pub fn interrupt(&self) {
        debug!("Session interrupt requested");
        self.cancel.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// One open connection to a scanner.
///
/// Operations are only accepted in the phases that allow them; a rejected
/// call returns [`ScanError::Phase`] without touching the session or the
/// device.
pub struct Session<D: ScanDevice> {
    device: D,
    config: SessionConfig,
    phase: Phase,
    version: ScanVersion,
    settings: SettingsNegotiator,
    cancel: CancelToken,
    assembler: Option<StreamAssembler>,
    buffer: Vec<u8>,
}

impl<D: ScanDevice> Session<D> {
    /// Opens `device` and loads its settings.
    #[instrument(skip_all, fields(device = device.name()))]
    pub fn open(mut device: D, config: SessionConfig) -> Result<Self> {
        let version = device
            .open()
            .map_err(|status| device_error(&device, status))?;

        if !version.is_at_least(&config.min_version) {
            warn!(
                found = %version,
                required = %config.min_version,
                "Device protocol version too old"
            );
            if let Err(status) = device.close() {
                warn!(%status, "Closing refused device failed");
            }
            return Err(ScanError::VersionTooOld {
                found: version,
                required: config.min_version,
            });
        }

        let settings = match SettingsNegotiator::load(&device, config.range_policy) {
            Ok(settings) => settings,
            Err(err) => {
                if let Err(status) = device.close() {
                    warn!(%status, "Closing device after failed settings load failed");
                }
                return Err(err);
            }
        };

        info!(version = %version, info = %version.info, "Session opened");
        Ok(Self {
            device,
            config,
            phase: Phase::Opened,
            version,
            settings,
            cancel: CancelToken::new(),
            assembler: None,
            buffer: Vec::new(),
        })
    }

    /// Closes the session from any phase. An open image is cancelled and
    /// closed first. The session ends up closed even when the device reports
    /// an error; that error is still returned.
    pub fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        info!(device = self.device.name(), phase = %self.phase, "Closing session");

        self.cancel.cancel();
        let mut outcome = Ok(());
        if matches!(
            self.phase,
            Phase::ImageOpened | Phase::Capturing | Phase::Draining
        ) {
            self.assembler = None;
            if let Err(status) = self.device.close_image() {
                warn!(%status, "Device failed to close image");
                outcome = Err(device_error(&self.device, status));
            }
        }
        if let Err(status) = self.device.close() {
            warn!(%status, "Device failed to close");
            if outcome.is_ok() {
                outcome = Err(device_error(&self.device, status));
            }
        }
        self.phase = Phase::Closed;
        outcome
    }

    /// Prepares the next image, from `Opened` or after the previous image
    /// drained.
    pub fn open_image(&mut self) -> Result<()> {
        self.require_phase(Operation::OpenImage)?;
        self.device
            .open_image()
            .map_err(|status| device_error(&self.device, status))?;
        self.assembler = None;
        self.phase = Phase::ImageOpened;
        debug!("Image opened");
        Ok(())
    }

    /// Returns to `Opened`. Per-image state is released even when the device
    /// reports an error.
    pub fn close_image(&mut self) -> Result<()> {
        self.require_phase(Operation::CloseImage)?;
        self.assembler = None;
        self.phase = Phase::Opened;
        self.device.close_image().map_err(|status| {
            warn!(%status, "Device failed to close image");
            device_error(&self.device, status)
        })?;
        debug!("Image closed");
        Ok(())
    }

    /// Arms the device and waits until it is ready to deliver data.
    ///
    /// Geometry is checked before the device is called. Blocks inside the
    /// device; an [`Interrupter`] ends the wait with
    /// [`ScanError::UserCancelled`] and closes the session.
    #[instrument(skip(self), fields(device = self.device.name()))]
    pub fn start(&mut self) -> Result<()> {
        self.require_phase(Operation::Start)?;

        let geometry = StreamGeometry::from_settings(self.settings.current());
        let assembler = StreamAssembler::new(geometry)?
            .with_parallel_min_rows(self.config.parallel_min_rows);

        debug!("Waiting for device to become ready");
        let started = self.device.start(&self.cancel);
        if self.cancel.is_cancelled() {
            info!("Capture interrupted, closing session");
            if let Err(err) = self.close() {
                warn!(error = %err, "Close after interrupt failed");
            }
            return Err(ScanError::UserCancelled);
        }
        if let Err(status) = started {
            if status == StatusCode::UserCancel {
                info!("Capture cancelled on the device");
            }
            return Err(device_error(&self.device, status));
        }

        self.buffer.resize(self.config.chunk_size, 0);
        info!(
            width = geometry.width,
            height = geometry.height,
            row_bytes = geometry.row_bytes,
            total_bytes = assembler.total_bytes(),
            "Capture started"
        );
        self.assembler = Some(assembler);
        self.phase = Phase::Capturing;
        Ok(())
    }

    /// Reads one chunk from the device and assembles it.
    ///
    /// Device errors leave the session capturing. Assembly errors end the
    /// image; whatever was assembled can still be taken with
    /// [`Session::take_image`].
    pub fn pump(&mut self) -> Result<Pump> {
        self.require_phase(Operation::Pump)?;
        if self.cancel.is_cancelled() {
            if let Err(err) = self.close() {
                warn!(error = %err, "Close after interrupt failed");
            }
            return Err(ScanError::UserCancelled);
        }

        let status = self
            .device
            .data(&mut self.buffer)
            .map_err(|status| device_error(&self.device, status))?;
        let len = status.len().min(self.buffer.len());

        let Some(mut assembler) = self.assembler.take() else {
            return Err(ScanError::StrideUnknown);
        };
        match feed_status(&mut assembler, &self.buffer[..len], status) {
            Ok(Feed::Partial { rows }) => {
                self.assembler = Some(assembler);
                Ok(Pump::Progress { rows })
            }
            Ok(Feed::Complete(completion)) => {
                match completion {
                    Completion::Full => info!(rows = assembler.rows_written(), "Image received"),
                    Completion::Truncated { received, expected } => {
                        warn!(received, expected, "Device ended the image early")
                    }
                }
                self.phase = Phase::Draining;
                Ok(Pump::Complete(assembler.finish()))
            }
            Err(err) => {
                self.assembler = Some(assembler);
                self.phase = Phase::Draining;
                Err(err)
            }
        }
    }

    /// Hands over the image left behind by a failed [`Session::pump`].
    pub fn take_image(&mut self) -> Result<Option<CapturedImage>> {
        self.require_phase(Operation::TakeImage)?;
        Ok(self.assembler.take().map(StreamAssembler::finish))
    }

    /// Opens an image, starts, pumps until done and closes the image again.
    /// The image is closed on failure too.
    #[instrument(skip(self), fields(device = self.device.name()))]
    pub fn capture_image(&mut self) -> Result<CapturedImage> {
        self.require_phase(Operation::CaptureImage)?;
        self.open_image()?;

        let captured = self.start().and_then(|()| self.drain());
        match captured {
            Ok(image) => {
                self.close_image()?;
                Ok(image)
            }
            Err(err) => {
                if Operation::CloseImage.permits(self.phase) {
                    if let Err(close_err) = self.close_image() {
                        warn!(error = %close_err, "Close image after failed capture failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Pumps until the image completes.
    pub fn drain(&mut self) -> Result<CapturedImage> {
        loop {
            if let Pump::Complete(image) = self.pump()? {
                return Ok(image);
            }
        }
    }

    pub fn capabilities(&self) -> Result<SettingsMask> {
        self.require_phase(Operation::GetCapabilities)?;
        Ok(self.settings.capabilities())
    }

    pub fn get_setting(&self, id: SettingId, kind: SettingKind) -> Result<SettingValue> {
        self.require_phase(Operation::GetSetting)?;
        Ok(self.settings.get(id, kind))
    }

    /// Applies one setting and returns every field that changed with it.
    pub fn put_setting(&mut self, id: SettingId, value: SettingValue) -> Result<SettingsMask> {
        self.require_phase(Operation::PutSetting)?;
        self.settings.put(&mut self.device, id, value)
    }

    /// All three settings views.
    pub fn settings(&self) -> Result<&SettingsNegotiator> {
        self.require_phase(Operation::GetSetting)?;
        Ok(&self.settings)
    }

    /// Applies every writable field of `settings` that differs from the
    /// current view.
    pub fn put_settings(&mut self, settings: &ScanSettings) -> Result<SettingsMask> {
        self.require_phase(Operation::PutSetting)?;
        self.settings.put_all(&mut self.device, settings)
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            cancel: self.cancel.clone(),
        }
    }

    /// Bytes the device is expected to deliver for the image being captured.
    pub fn expected_bytes(&self) -> Option<u64> {
        self.assembler.as_ref().map(StreamAssembler::total_bytes)
    }

    pub fn adf_ready(&self) -> bool {
        self.phase != Phase::Closed && self.device.adf_ready()
    }

    pub fn error_message(&self, status: StatusCode) -> String {
        self.device.error_message(status)
    }

    pub fn version(&self) -> &ScanVersion {
        &self.version
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn require_phase(&self, operation: Operation) -> Result<()> {
        if operation.permits(self.phase) {
            return Ok(());
        }
        debug!(%operation, phase = %self.phase, "Rejected out-of-phase call");
        Err(ScanError::Phase {
            operation,
            phase: self.phase,
        })
    }
}

impl<D: ScanDevice> Drop for Session<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Closing session on drop failed");
        }
    }
}

fn feed_status(assembler: &mut StreamAssembler, bytes: &[u8], status: DataStatus) -> Result<Feed> {
    let mut feed = Feed::Partial {
        rows: assembler.rows_written(),
    };
    if !bytes.is_empty() {
        feed = assembler.feed(RawChunk::new(bytes))?;
    }
    // A zero-length read ends the image as well, even without an end flag.
    if (status.is_end() || status.is_empty()) && matches!(feed, Feed::Partial { .. }) {
        feed = assembler.feed(RawChunk::end())?;
    }
    Ok(feed)
}
