use anyhow::{Context, Result};
use scanbe_rs::logger;
use scanbe_rs::scan_pipeline::{
    DeviceRegistry, ImageType, OutputConfig, ScanToTiffPipeline, SessionConfig, SettingId,
    SettingValue, SimulatedScanner, TiffCompression,
};
use tracing::info;

fn main() -> Result<()> {
    logger::init();

    info!("Starting scanbe...");

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "scan.tiff".to_owned());
    let device = args.next();

    let mut registry = DeviceRegistry::new();
    registry.register("simulated-flatbed", SimulatedScanner::new);
    registry.register("simulated-aligned", || {
        SimulatedScanner::new()
            .with_name("simulated-aligned")
            .with_row_alignment(4)
    });
    info!(devices = ?registry.names(), "Scanners registered");

    let mut session = registry
        .open(device.as_deref(), SessionConfig::default())
        .context("Failed to open scanner")?;
    info!(
        device = session.device_name(),
        version = %session.version(),
        "Scanner ready"
    );

    let mut changed = session
        .put_setting(SettingId::ImageType, SettingValue::Type(ImageType::Rgb))
        .context("Failed to select RGB capture")?;
    changed |= session
        .put_setting(SettingId::Resolution, SettingValue::UInt(150))
        .context("Failed to set resolution")?;
    info!(changed = ?changed, "Settings applied");

    let config = OutputConfig::builder()
        .compression(TiffCompression::DeflateBalanced)
        .predictor(Some(2))
        .build();
    let pipeline = ScanToTiffPipeline::new(config);
    info!("Compression: {:?}", pipeline.config().compression);

    let report = pipeline
        .capture_file(&mut session, &output)
        .with_context(|| format!("Capture to {output} failed"))?;
    info!(
        width = report.width,
        height = report.height,
        completion = ?report.completion,
        output = %output,
        "Capture successful"
    );
    report.timings.log_summary();

    session.close().context("Failed to close scanner")?;
    Ok(())
}
