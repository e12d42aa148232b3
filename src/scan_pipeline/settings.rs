//! Settings negotiation module
//!
//! This module provides the settings types exchanged with scanner add-ons and
//! the negotiator that validates and applies setting changes.

mod negotiator;
pub mod types;

#[cfg(test)]
mod tests;

pub use negotiator::{RangePolicy, SettingsNegotiator};
pub use types::{
    BASE_RESOLUTION, ImageType, ScanRect, ScanSettings, SettingId, SettingKind, SettingValue,
    SettingsMask, TONE_MAP_LEN, identity_tone_map, packed_row_bytes, padded_row_bytes,
};
