pub mod logger;
pub mod scan_pipeline;
