use std::io::Write;
use std::path::Path;

use tracing::{info, instrument, warn};

use crate::scan_pipeline::{
    common::error::{Result, ScanError},
    common::timing::{CaptureTimings, Timer},
    device::ScanDevice,
    output::{ImageWriter, OutputConfig, TiffImageWriter},
    session::{Operation, Session},
    stream::{CapturedImage, Completion, Image},
};

/// Summary of one capture written by [`ScanToTiffPipeline`].
#[derive(Debug)]
pub struct CaptureReport {
    pub width: u32,
    pub height: u32,
    pub completion: Completion,
    pub timings: CaptureTimings,
}

/// Captures one image from a session and writes it out.
pub struct ScanToTiffPipeline<W: ImageWriter> {
    writer: W,
    config: OutputConfig,
}

impl ScanToTiffPipeline<TiffImageWriter> {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            writer: TiffImageWriter,
            config,
        }
    }
}

impl<W: ImageWriter> ScanToTiffPipeline<W> {
    pub fn with_custom(writer: W, config: OutputConfig) -> Self {
        Self { writer, config }
    }

    /// Runs one full capture on `session` and encodes the result into
    /// `output`. The image is closed again whether or not capture succeeds.
    #[instrument(skip_all, fields(device = session.device_name()))]
    pub fn capture<D: ScanDevice>(
        &self,
        session: &mut Session<D>,
        output: &mut dyn Write,
    ) -> Result<CaptureReport> {
        info!("Starting scan to TIFF capture");
        let mut timings = CaptureTimings::new();

        let captured = {
            let _span = tracing::info_span!("acquire").entered();
            let result = acquire(session, &mut timings);
            if result.is_err() && Operation::CloseImage.permits(session.phase()) {
                if let Err(err) = session.close_image() {
                    warn!(error = %err, "Close image after failed capture failed");
                }
            }
            result?
        };

        if let Completion::Truncated { received, expected } = captured.completion {
            warn!(received, expected, "Writing a truncated image");
        }

        {
            let _span = tracing::info_span!(
                "encode_tiff",
                width = captured.image.width,
                height = captured.image.height
            )
            .entered();
            let timer = Timer::start("encode");
            self.encode(&captured.image, output)?;
            timings.record(timer);
        }

        info!(
            width = captured.image.width,
            height = captured.image.height,
            "Capture written"
        );
        Ok(CaptureReport {
            width: captured.image.width,
            height: captured.image.height,
            completion: captured.completion,
            timings,
        })
    }

    #[instrument(skip(self, session, output_path))]
    pub fn capture_file<D: ScanDevice, P: AsRef<Path>>(
        &self,
        session: &mut Session<D>,
        output_path: P,
    ) -> Result<CaptureReport> {
        let output_path = output_path.as_ref();
        info!(output = %output_path.display(), "Capturing to file");

        let mut output_file = {
            let _span = tracing::info_span!("create_output_file").entered();
            std::fs::File::create(output_path).map_err(|e| {
                ScanError::OutputWriteError(format!("{}: {}", output_path.display(), e))
            })?
        };

        self.capture(session, &mut output_file)
    }

    /// Encodes an image that was captured elsewhere, e.g. one delivered by a
    /// notification bridge.
    pub fn encode(&self, image: &Image, output: &mut dyn Write) -> Result<()> {
        self.writer.write_image(image, output, &self.config)
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: OutputConfig) {
        self.config = config;
    }
}

fn acquire<D: ScanDevice>(
    session: &mut Session<D>,
    timings: &mut CaptureTimings,
) -> Result<CapturedImage> {
    let timer = Timer::start("open_image");
    session.open_image()?;
    timings.record(timer);

    let timer = Timer::start("start");
    session.start()?;
    timings.record(timer);

    let timer = Timer::start("stream");
    let captured = session.drain()?;
    timings.record(timer);

    let timer = Timer::start("close_image");
    session.close_image()?;
    timings.record(timer);

    Ok(captured)
}
