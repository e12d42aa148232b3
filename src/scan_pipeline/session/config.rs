//! Session configuration types

use crate::scan_pipeline::device::ScanVersion;
use crate::scan_pipeline::settings::RangePolicy;
use crate::scan_pipeline::stream::DEFAULT_PARALLEL_MIN_ROWS;

/// Bytes requested from the device per `data` call.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Devices reporting an older protocol version are refused
    pub min_version: ScanVersion,
    /// Size of the transfer buffer handed to the device
    pub chunk_size: usize,
    /// How out-of-range setting values are handled
    pub range_policy: RangePolicy,
    /// Rows a chunk must hold before conversion runs in parallel
    pub parallel_min_rows: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_version: ScanVersion::MINIMUM,
            chunk_size: DEFAULT_CHUNK_SIZE,
            range_policy: RangePolicy::Reject,
            parallel_min_rows: DEFAULT_PARALLEL_MIN_ROWS,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for SessionConfig
#[derive(Default)]
pub struct SessionConfigBuilder {
    min_version: Option<ScanVersion>,
    chunk_size: Option<usize>,
    range_policy: Option<RangePolicy>,
    parallel_min_rows: Option<usize>,
}

impl SessionConfigBuilder {
    pub fn min_version(mut self, version: ScanVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    pub fn range_policy(mut self, policy: RangePolicy) -> Self {
        self.range_policy = Some(policy);
        self
    }

    pub fn parallel_min_rows(mut self, rows: usize) -> Self {
        self.parallel_min_rows = Some(rows);
        self
    }

    pub fn build(self) -> SessionConfig {
        let default = SessionConfig::default();
        SessionConfig {
            min_version: self.min_version.unwrap_or(default.min_version),
            chunk_size: self.chunk_size.unwrap_or(default.chunk_size).max(1),
            range_policy: self.range_policy.unwrap_or(default.range_policy),
            parallel_min_rows: self
                .parallel_min_rows
                .unwrap_or(default.parallel_min_rows)
                .max(1),
        }
    }
}
