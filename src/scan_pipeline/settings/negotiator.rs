use std::fmt::Display;

use tracing::{debug, instrument, warn};

use crate::scan_pipeline::common::error::{Result, ScanError};
use crate::scan_pipeline::common::status::StatusCode;
use crate::scan_pipeline::device::{ScanDevice, device_error};
use crate::scan_pipeline::settings::types::{
    ImageType, ScanRect, ScanSettings, SettingId, SettingKind, SettingValue, SettingsMask,
    TONE_MAP_LEN, identity_tone_map,
};

/// What `put_setting` does with a value outside the device's declared
/// minimum/maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    /// Fail with `InvalidSetting` and leave everything untouched.
    #[default]
    Reject,
    /// Pull the value to the nearest bound and apply it.
    Clamp,
}

/// Holds the current/minimum/maximum settings views of one session and
/// validates updates against them before they reach the device.
#[derive(Debug, Clone)]
pub struct SettingsNegotiator {
    capabilities: SettingsMask,
    current: ScanSettings,
    minimum: ScanSettings,
    maximum: ScanSettings,
    tone_map: Vec<u8>,
    tone_map3: Vec<u8>,
    specific: Vec<u8>,
    alignment: u32,
    policy: RangePolicy,
}

impl SettingsNegotiator {
    /// Reads capabilities and all three views from the device.
    #[instrument(skip_all, fields(device = device.name()))]
    pub fn load<D: ScanDevice + ?Sized>(device: &D, policy: RangePolicy) -> Result<Self> {
        let reported = device
            .capabilities()
            .map_err(|status| device_error(device, status))?;
        if reported.intersects(SettingsMask::DERIVED) {
            warn!(
                mask = ?reported,
                "Device advertises derived settings as capabilities, ignoring them"
            );
        }
        let capabilities = reported.difference(SettingsMask::DERIVED);

        let mut negotiator = Self {
            capabilities,
            current: ScanSettings::neutral(),
            minimum: ScanSettings::neutral(),
            maximum: ScanSettings::neutral(),
            tone_map: identity_tone_map(1),
            tone_map3: identity_tone_map(3),
            specific: Vec::new(),
            alignment: device.row_alignment().max(1),
            policy,
        };

        for kind in SettingKind::ALL {
            let mut view = ScanSettings::neutral();
            for id in capabilities.iter() {
                if view.value(id).is_none() {
                    continue;
                }
                let value = read_setting(device, id, kind)?;
                view.set_value(id, &value)?;
            }
            match kind {
                SettingKind::Current => {
                    view.derive_geometry(negotiator.alignment);
                    negotiator.current = view;
                }
                SettingKind::Minimum => negotiator.minimum = view,
                SettingKind::Maximum => negotiator.maximum = view,
            }
        }

        if capabilities.contains(SettingId::ToneMap) {
            negotiator.tone_map = read_table(device, SettingId::ToneMap)?;
        }
        if capabilities.contains(SettingId::ToneMap3) {
            negotiator.tone_map3 = read_table(device, SettingId::ToneMap3)?;
        }
        if capabilities.contains(SettingId::Specific) {
            if let SettingValue::Bytes(bytes) =
                read_setting(device, SettingId::Specific, SettingKind::Current)?
            {
                negotiator.specific = bytes;
            }
        }

        debug!(
            capabilities = ?negotiator.capabilities,
            width = negotiator.current.pixel_width,
            height = negotiator.current.pixel_height,
            row_bytes = negotiator.current.row_bytes,
            "Settings loaded"
        );
        Ok(negotiator)
    }

    pub fn capabilities(&self) -> SettingsMask {
        self.capabilities
    }

    /// Derived fields count as supported even though they are never
    /// advertised.
    pub fn is_supported(&self, id: SettingId) -> bool {
        id.is_derived() || self.capabilities.contains(id)
    }

    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    pub fn view(&self, kind: SettingKind) -> &ScanSettings {
        match kind {
            SettingKind::Current => &self.current,
            SettingKind::Minimum => &self.minimum,
            SettingKind::Maximum => &self.maximum,
        }
    }

    pub fn current(&self) -> &ScanSettings {
        &self.current
    }

    /// Unsupported settings, and tone maps or device-specific data asked for
    /// in the minimum/maximum views, report their neutral value.
    pub fn get(&self, id: SettingId, kind: SettingKind) -> SettingValue {
        if !self.is_supported(id) {
            return SettingValue::neutral(id);
        }
        match (id, kind) {
            (SettingId::ToneMap, SettingKind::Current) => SettingValue::Table(self.tone_map.clone()),
            (SettingId::ToneMap3, SettingKind::Current) => {
                SettingValue::Table(self.tone_map3.clone())
            }
            (SettingId::Specific, SettingKind::Current) => SettingValue::Bytes(self.specific.clone()),
            (SettingId::ToneMap | SettingId::ToneMap3 | SettingId::Specific, _) => {
                SettingValue::neutral(id)
            }
            (field, kind) => self
                .view(kind)
                .value(field)
                .unwrap_or_else(|| SettingValue::neutral(field)),
        }
    }

    /// Validates and applies one setting, returning every field whose value
    /// changed as a consequence.
    #[instrument(skip(self, device, value), fields(device = device.name()))]
    pub fn put<D: ScanDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: SettingId,
        value: SettingValue,
    ) -> Result<SettingsMask> {
        if id.is_derived() {
            return Err(ScanError::invalid(
                id,
                "derived from other settings and read-only",
            ));
        }
        if !self.capabilities.contains(id) {
            return Err(ScanError::invalid(id, "not supported by this device"));
        }
        if !value.matches(id) {
            return Err(ScanError::invalid(
                id,
                format!("{value:?} has the wrong type for this setting"),
            ));
        }
        let value = self.validate(id, value)?;

        let device_mask = device.put_setting(id, &value).map_err(|status| match status {
            StatusCode::InvalidSetting | StatusCode::BadParam => {
                ScanError::invalid(id, device.error_message(status))
            }
            status => device_error(&*device, status),
        })?;

        let mut next = self.current.clone();
        let mut tone_map = self.tone_map.clone();
        let mut tone_map3 = self.tone_map3.clone();
        let mut specific = self.specific.clone();
        match (id, value) {
            (SettingId::ToneMap, SettingValue::Table(table)) => tone_map = table,
            (SettingId::ToneMap3, SettingValue::Table(table)) => tone_map3 = table,
            (SettingId::Specific, SettingValue::Bytes(bytes)) => specific = bytes,
            (id, value) => {
                next.set_value(id, &value)?;
                if let (SettingId::ImageType, Some(bits)) = (id, next.image_type.pixel_bits()) {
                    next.pixel_bits = bits;
                }
            }
        }

        // The device may have adjusted related fields (snapped resolution,
        // new pixel bits); its own view wins for everything it reported.
        for affected in device_mask.difference(SettingsMask::DERIVED).iter() {
            if affected == id || next.value(affected).is_none() || !self.capabilities.contains(affected) {
                continue;
            }
            match device.get_setting(affected, SettingKind::Current) {
                Ok(reported) if reported.matches(affected) => next.set_value(affected, &reported)?,
                Ok(reported) => {
                    warn!(setting = %affected, ?reported, "Device reported a mistyped value")
                }
                Err(status) => {
                    warn!(setting = %affected, %status, "Could not re-read affected setting")
                }
            }
        }
        next.derive_geometry(self.alignment);

        let mut changed = self.current.diff(&next);
        if tone_map != self.tone_map {
            changed.insert(SettingId::ToneMap);
        }
        if tone_map3 != self.tone_map3 {
            changed.insert(SettingId::ToneMap3);
        }
        if specific != self.specific {
            changed.insert(SettingId::Specific);
        }

        self.current = next;
        self.tone_map = tone_map;
        self.tone_map3 = tone_map3;
        self.specific = specific;

        debug!(changed = ?changed, reported = ?device_mask, "Setting applied");
        Ok(changed)
    }

    /// Applies every supported, writable field of `settings` that differs
    /// from the current view, in identifier order. Fields applied before a
    /// failing one stay applied.
    pub fn put_all<D: ScanDevice + ?Sized>(
        &mut self,
        device: &mut D,
        settings: &ScanSettings,
    ) -> Result<SettingsMask> {
        let mut changed = SettingsMask::EMPTY;
        for id in SettingId::FIELDS {
            if id.is_derived() || !self.capabilities.contains(id) {
                continue;
            }
            let Some(wanted) = settings.value(id) else {
                continue;
            };
            if self.current.value(id).as_ref() == Some(&wanted) {
                continue;
            }
            changed |= self.put(device, id, wanted)?;
        }
        Ok(changed)
    }

    fn validate(&self, id: SettingId, value: SettingValue) -> Result<SettingValue> {
        let (min, max) = (&self.minimum, &self.maximum);
        let checked = match value {
            SettingValue::Rect(rect) => SettingValue::Rect(self.bounded_area(rect)?),
            SettingValue::Type(ImageType::Unknown) => {
                return Err(ScanError::invalid(id, "unknown image type cannot be requested"));
            }
            SettingValue::Type(image_type) => {
                if image_type < min.image_type || image_type > max.image_type {
                    return Err(ScanError::invalid(
                        id,
                        format!("{image_type:?} is not offered by this device"),
                    ));
                }
                SettingValue::Type(image_type)
            }
            SettingValue::UInt(v) => {
                let (lo, hi) = match id {
                    SettingId::PixelBits => (min.pixel_bits, max.pixel_bits),
                    SettingId::Resolution => (min.resolution, max.resolution),
                    _ => (min.scaling, max.scaling),
                };
                let v = self.bounded(id, v, lo, hi)?;
                if id == SettingId::PixelBits && self.current.image_type.pixel_bits() != Some(v) {
                    return Err(ScanError::invalid(
                        id,
                        format!(
                            "{v} bits per pixel does not match {:?} samples",
                            self.current.image_type
                        ),
                    ));
                }
                if matches!(id, SettingId::Resolution | SettingId::Scaling) && v == 0 {
                    return Err(ScanError::invalid(id, "must be greater than zero"));
                }
                SettingValue::UInt(v)
            }
            SettingValue::SInt(v) => {
                let (lo, hi) = match id {
                    SettingId::Brightness => (min.brightness, max.brightness),
                    _ => (min.contrast, max.contrast),
                };
                SettingValue::SInt(self.bounded(id, v, lo, hi)?)
            }
            SettingValue::Table(table) => {
                let expected = match id {
                    SettingId::ToneMap3 => TONE_MAP_LEN * 3,
                    _ => TONE_MAP_LEN,
                };
                if table.len() != expected {
                    return Err(ScanError::invalid(
                        id,
                        format!("expected {expected} entries, got {}", table.len()),
                    ));
                }
                SettingValue::Table(table)
            }
            bytes @ SettingValue::Bytes(_) => bytes,
        };
        Ok(checked)
    }

    fn bounded<T: Ord + Copy + Display>(&self, id: SettingId, v: T, lo: T, hi: T) -> Result<T> {
        if lo > hi {
            return Err(ScanError::invalid(
                id,
                format!("device reports an empty range {lo}..={hi}"),
            ));
        }
        if (lo..=hi).contains(&v) {
            return Ok(v);
        }
        match self.policy {
            RangePolicy::Reject => Err(ScanError::invalid(
                id,
                format!("{v} is outside {lo}..={hi}"),
            )),
            RangePolicy::Clamp => {
                let clamped = v.clamp(lo, hi);
                debug!(setting = %id, requested = %v, applied = %clamped, "Clamped setting");
                Ok(clamped)
            }
        }
    }

    /// The maximum view's area is the scanner bed; the minimum view's area
    /// gives the smallest extent the device accepts.
    fn bounded_area(&self, rect: ScanRect) -> Result<ScanRect> {
        let id = SettingId::Area;
        let bed = self.maximum.area;
        let min_width = self.minimum.area.width().max(1);
        let min_height = self.minimum.area.height().max(1);
        let fits = |r: &ScanRect| r.width() >= min_width && r.height() >= min_height;

        if rect.is_empty() {
            return Err(ScanError::invalid(id, format!("{rect:?} is empty")));
        }
        if bed.contains(&rect) && fits(&rect) {
            return Ok(rect);
        }
        match self.policy {
            RangePolicy::Reject => Err(ScanError::invalid(
                id,
                format!("{rect:?} does not fit the bed {bed:?} with minimum extent {min_width}x{min_height}"),
            )),
            RangePolicy::Clamp => {
                let clamped = rect.intersect(&bed);
                if clamped.is_empty() || !fits(&clamped) {
                    return Err(ScanError::invalid(
                        id,
                        format!("{rect:?} lies outside the bed {bed:?}"),
                    ));
                }
                debug!(requested = ?rect, applied = ?clamped, "Clamped scan area");
                Ok(clamped)
            }
        }
    }
}

fn read_setting<D: ScanDevice + ?Sized>(
    device: &D,
    id: SettingId,
    kind: SettingKind,
) -> Result<SettingValue> {
    let value = device
        .get_setting(id, kind)
        .map_err(|status| device_error(device, status))?;
    if !value.matches(id) {
        return Err(ScanError::Device {
            status: StatusCode::AddonError,
            message: format!("device reported {value:?} for {id}"),
        });
    }
    Ok(value)
}

fn read_table<D: ScanDevice + ?Sized>(device: &D, id: SettingId) -> Result<Vec<u8>> {
    match read_setting(device, id, SettingKind::Current)? {
        SettingValue::Table(table) => Ok(table),
        _ => Ok(identity_tone_map(if id == SettingId::ToneMap3 { 3 } else { 1 })),
    }
}
