use tracing::{debug, info};

use crate::scan_pipeline::common::error::{Result, ScanError};
use crate::scan_pipeline::device::scanner::ScanDevice;
use crate::scan_pipeline::session::{Session, SessionConfig};

type DeviceFactory = Box<dyn Fn() -> Box<dyn ScanDevice> + Send + Sync>;

/// Named device constructors the application registered up front.
///
/// Opening by name builds a fresh device value, so two sessions never share
/// device state.
#[derive(Default)]
pub struct DeviceRegistry {
    entries: Vec<(String, DeviceFactory)>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under `name`, replacing an earlier one with
    /// the same name.
    pub fn register<F, D>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: ScanDevice + 'static,
    {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        debug!(device = %name, "Registered scanner");
        self.entries
            .push((name, Box::new(move || Box::new(factory()) as Box<dyn ScanDevice>)));
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Opens a session on the named device, or on the first registered one
    /// when `name` is `None`.
    pub fn open(
        &self,
        name: Option<&str>,
        config: SessionConfig,
    ) -> Result<Session<Box<dyn ScanDevice>>> {
        let (resolved, factory) = match name {
            Some(wanted) => self.entries.iter().find(|(name, _)| name == wanted),
            None => self.entries.first(),
        }
        .ok_or_else(|| ScanError::NoMatchingDevice(name.map(str::to_owned)))?;

        info!(device = %resolved, "Opening scanner");
        Session::open(factory(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_pipeline::device::SimulatedScanner;
    use crate::scan_pipeline::session::Phase;

    #[test]
    fn test_open_by_name_and_default() {
        let mut registry = DeviceRegistry::new();
        registry.register("flatbed", || SimulatedScanner::new().with_name("flatbed"));
        registry.register("feeder", || SimulatedScanner::new().with_name("feeder"));
        assert_eq!(registry.names(), vec!["flatbed", "feeder"]);

        let session = registry
            .open(Some("feeder"), SessionConfig::default())
            .expect("feeder should open");
        assert_eq!(session.device_name(), "feeder");
        assert_eq!(session.phase(), Phase::Opened);

        let session = registry
            .open(None, SessionConfig::default())
            .expect("default device should open");
        assert_eq!(session.device_name(), "flatbed");
    }

    #[test]
    fn test_unknown_name_is_no_matching_device() {
        let mut registry = DeviceRegistry::new();
        registry.register("flatbed", SimulatedScanner::new);

        let result = registry.open(Some("drum"), SessionConfig::default());
        assert!(matches!(result, Err(ScanError::NoMatchingDevice(Some(ref n))) if n == "drum"));

        let empty = DeviceRegistry::new();
        assert!(matches!(
            empty.open(None, SessionConfig::default()),
            Err(ScanError::NoMatchingDevice(None))
        ));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = DeviceRegistry::new();
        registry.register("flatbed", SimulatedScanner::new);
        registry.register("flatbed", || SimulatedScanner::new().with_name("replacement"));
        assert_eq!(registry.names(), vec!["flatbed"]);

        let session = registry
            .open(Some("flatbed"), SessionConfig::default())
            .expect("flatbed should open");
        assert_eq!(session.device_name(), "replacement");
    }
}
