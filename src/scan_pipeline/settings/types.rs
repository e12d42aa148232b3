//! Scanner settings types
//!
//! Identifier codes and image type codes are the values scanner add-ons use
//! on the wire, so masks reported by a driver can be taken as-is.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::scan_pipeline::common::error::{Result, ScanError};

/// Resolution of the coordinate system used for capture areas.
pub const BASE_RESOLUTION: u32 = 300;

/// Entries in a single-channel tone map.
pub const TONE_MAP_LEN: usize = 256;

/// An area on the scanner bed, in [`BASE_RESOLUTION`] units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ScanRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScanRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.bottom) - i64::from(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, other: &ScanRect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn intersect(&self, other: &ScanRect) -> ScanRect {
        ScanRect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }
}

/// Layout of the raw samples a scanner delivers.
///
/// Declaration order follows the wire codes, so the derived ordering can be
/// used for minimum/maximum range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageType {
    /// One bit per pixel, rows start on byte boundaries.
    Binary,
    /// One 8-bit sample per pixel.
    Gray,
    /// Three 8-bit samples per pixel, no alpha.
    Rgb,
    Unknown,
}

impl ImageType {
    pub const fn code(self) -> u32 {
        match self {
            Self::Binary => 1,
            Self::Gray => 2,
            Self::Rgb => 4,
            Self::Unknown => 8,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Binary,
            2 => Self::Gray,
            4 => Self::Rgb,
            _ => Self::Unknown,
        }
    }

    /// Bits per pixel of the sample layout, `None` for [`ImageType::Unknown`].
    pub const fn pixel_bits(self) -> Option<u32> {
        match self {
            Self::Binary => Some(1),
            Self::Gray => Some(8),
            Self::Rgb => Some(24),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    Area,
    ImageType,
    PixelBits,
    Resolution,
    Brightness,
    Contrast,
    Scaling,
    Width,
    Height,
    RowBytes,
    ToneMap,
    ToneMap3,
    Specific,
}

impl SettingId {
    pub const ALL: [SettingId; 13] = [
        SettingId::Area,
        SettingId::ImageType,
        SettingId::PixelBits,
        SettingId::Resolution,
        SettingId::Brightness,
        SettingId::Contrast,
        SettingId::Scaling,
        SettingId::Width,
        SettingId::Height,
        SettingId::RowBytes,
        SettingId::ToneMap,
        SettingId::ToneMap3,
        SettingId::Specific,
    ];

    /// Fields that are plain members of [`ScanSettings`].
    pub const FIELDS: [SettingId; 10] = [
        SettingId::Area,
        SettingId::ImageType,
        SettingId::PixelBits,
        SettingId::Resolution,
        SettingId::Brightness,
        SettingId::Contrast,
        SettingId::Scaling,
        SettingId::Width,
        SettingId::Height,
        SettingId::RowBytes,
    ];

    pub const fn code(self) -> u32 {
        match self {
            Self::Area => 1,
            Self::ImageType => 2,
            Self::PixelBits => 4,
            Self::Resolution => 8,
            Self::Brightness => 16,
            Self::Contrast => 32,
            Self::Scaling => 64,
            Self::Width => 128,
            Self::Height => 256,
            Self::RowBytes => 512,
            Self::ToneMap => 1024,
            Self::ToneMap3 => 2048,
            Self::Specific => 4096,
        }
    }

    /// Width, height and row bytes follow from the other settings and are
    /// never writable.
    pub const fn is_derived(self) -> bool {
        matches!(self, Self::Width | Self::Height | Self::RowBytes)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::ImageType => "image type",
            Self::PixelBits => "pixel bits",
            Self::Resolution => "resolution",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Scaling => "scaling",
            Self::Width => "pixel width",
            Self::Height => "pixel height",
            Self::RowBytes => "row bytes",
            Self::ToneMap => "tone map",
            Self::ToneMap3 => "three-channel tone map",
            Self::Specific => "device-specific setting",
        }
    }
}

impl TryFrom<u32> for SettingId {
    type Error = ScanError;

    fn try_from(code: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.code() == code)
            .ok_or(ScanError::UnknownSetting(code))
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of setting identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SettingsMask(u32);

impl SettingsMask {
    pub const EMPTY: Self = Self(0);
    pub const DERIVED: Self =
        Self(SettingId::Width.code() | SettingId::Height.code() | SettingId::RowBytes.code());
    const KNOWN_BITS: u32 = 0x1fff;

    /// Builds a mask from raw bits; bits that name no setting are dropped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::KNOWN_BITS)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, id: SettingId) -> bool {
        self.0 & id.code() != 0
    }

    pub fn insert(&mut self, id: SettingId) {
        self.0 |= id.code();
    }

    pub fn remove(&mut self, id: SettingId) {
        self.0 &= !id.code();
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = SettingId> {
        SettingId::ALL.into_iter().filter(move |id| self.contains(*id))
    }
}

impl From<SettingId> for SettingsMask {
    fn from(id: SettingId) -> Self {
        Self(id.code())
    }
}

impl FromIterator<SettingId> for SettingsMask {
    fn from_iter<I: IntoIterator<Item = SettingId>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        for id in iter {
            mask.insert(id);
        }
        mask
    }
}

impl BitOr for SettingsMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<SettingId> for SettingsMask {
    type Output = Self;

    fn bitor(self, rhs: SettingId) -> Self {
        self.union(rhs.into())
    }
}

impl BitOrAssign for SettingsMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for SettingsMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Which of the three settings views a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    Current,
    Minimum,
    Maximum,
}

impl SettingKind {
    pub const ALL: [SettingKind; 3] = [
        SettingKind::Current,
        SettingKind::Minimum,
        SettingKind::Maximum,
    ];

    pub const fn code(self) -> u32 {
        match self {
            Self::Current => 1,
            Self::Minimum => 2,
            Self::Maximum => 3,
        }
    }
}

/// The value of one setting. Which variant applies is fixed per
/// [`SettingId`], see [`SettingValue::matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Rect(ScanRect),
    Type(ImageType),
    UInt(u32),
    SInt(i32),
    /// Tone map entries: 256 for a single map, 768 for three channels.
    Table(Vec<u8>),
    /// Opaque device-specific payload.
    Bytes(Vec<u8>),
}

impl SettingValue {
    pub fn matches(&self, id: SettingId) -> bool {
        matches!(
            (id, self),
            (SettingId::Area, Self::Rect(_))
                | (SettingId::ImageType, Self::Type(_))
                | (
                    SettingId::PixelBits
                        | SettingId::Resolution
                        | SettingId::Scaling
                        | SettingId::Width
                        | SettingId::Height
                        | SettingId::RowBytes,
                    Self::UInt(_)
                )
                | (SettingId::Brightness | SettingId::Contrast, Self::SInt(_))
                | (SettingId::ToneMap | SettingId::ToneMap3, Self::Table(_))
                | (SettingId::Specific, Self::Bytes(_))
        )
    }

    /// The value reported for a setting the device does not support.
    pub fn neutral(id: SettingId) -> Self {
        match id {
            SettingId::ToneMap => Self::Table(identity_tone_map(1)),
            SettingId::ToneMap3 => Self::Table(identity_tone_map(3)),
            SettingId::Specific => Self::Bytes(Vec::new()),
            field => ScanSettings::neutral()
                .value(field)
                .unwrap_or(Self::UInt(0)),
        }
    }
}

pub fn identity_tone_map(channels: usize) -> Vec<u8> {
    (0..channels).flat_map(|_| 0..=u8::MAX).collect()
}

/// One settings view (current, minimum or maximum).
///
/// `pixel_width`, `pixel_height` and `row_bytes` are only meaningful in the
/// current view; they follow from area, resolution, scaling and pixel bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub area: ScanRect,
    pub image_type: ImageType,
    pub pixel_bits: u32,
    pub resolution: u32,
    pub brightness: i32,
    pub contrast: i32,
    /// In percent.
    pub scaling: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Bytes per row including device padding.
    pub row_bytes: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::neutral()
    }
}

impl ScanSettings {
    /// Letter-size bed, 8-bit gray at base resolution, no adjustments.
    pub fn neutral() -> Self {
        let mut settings = Self {
            area: ScanRect::new(0, 0, 2550, 3300),
            image_type: ImageType::Gray,
            pixel_bits: 8,
            resolution: BASE_RESOLUTION,
            brightness: 0,
            contrast: 0,
            scaling: 100,
            pixel_width: 0,
            pixel_height: 0,
            row_bytes: 0,
        };
        settings.derive_geometry(1);
        settings
    }

    /// Reads a plain field. Tone maps and device-specific data are not part
    /// of a settings view and yield `None`.
    pub fn value(&self, id: SettingId) -> Option<SettingValue> {
        let value = match id {
            SettingId::Area => SettingValue::Rect(self.area),
            SettingId::ImageType => SettingValue::Type(self.image_type),
            SettingId::PixelBits => SettingValue::UInt(self.pixel_bits),
            SettingId::Resolution => SettingValue::UInt(self.resolution),
            SettingId::Brightness => SettingValue::SInt(self.brightness),
            SettingId::Contrast => SettingValue::SInt(self.contrast),
            SettingId::Scaling => SettingValue::UInt(self.scaling),
            SettingId::Width => SettingValue::UInt(self.pixel_width),
            SettingId::Height => SettingValue::UInt(self.pixel_height),
            SettingId::RowBytes => SettingValue::UInt(self.row_bytes),
            SettingId::ToneMap | SettingId::ToneMap3 | SettingId::Specific => return None,
        };
        Some(value)
    }

    /// Writes a plain field without any range checks.
    pub fn set_value(&mut self, id: SettingId, value: &SettingValue) -> Result<()> {
        match (id, value) {
            (SettingId::Area, SettingValue::Rect(rect)) => self.area = *rect,
            (SettingId::ImageType, SettingValue::Type(image_type)) => {
                self.image_type = *image_type
            }
            (SettingId::PixelBits, SettingValue::UInt(v)) => self.pixel_bits = *v,
            (SettingId::Resolution, SettingValue::UInt(v)) => self.resolution = *v,
            (SettingId::Brightness, SettingValue::SInt(v)) => self.brightness = *v,
            (SettingId::Contrast, SettingValue::SInt(v)) => self.contrast = *v,
            (SettingId::Scaling, SettingValue::UInt(v)) => self.scaling = *v,
            (SettingId::Width, SettingValue::UInt(v)) => self.pixel_width = *v,
            (SettingId::Height, SettingValue::UInt(v)) => self.pixel_height = *v,
            (SettingId::RowBytes, SettingValue::UInt(v)) => self.row_bytes = *v,
            (id, value) => {
                return Err(ScanError::invalid(
                    id,
                    format!("{value:?} is not a valid value for this setting"),
                ));
            }
        }
        Ok(())
    }

    /// Recomputes pixel width, pixel height and row bytes.
    ///
    /// `alignment` is the device's row padding in bytes; values below one are
    /// treated as one.
    pub fn derive_geometry(&mut self, alignment: u32) {
        let scale = |extent: i64| -> u32 {
            if extent <= 0 {
                return 0;
            }
            let pixels = extent as u128 * u128::from(self.resolution) * u128::from(self.scaling)
                / (u128::from(BASE_RESOLUTION) * 100);
            u32::try_from(pixels).unwrap_or(u32::MAX)
        };
        self.pixel_width = scale(self.area.width());
        self.pixel_height = scale(self.area.height());
        self.row_bytes = padded_row_bytes(self.pixel_width, self.pixel_bits, alignment);
    }

    /// Bytes needed for one row without padding.
    pub fn packed_row_bytes(&self) -> u64 {
        packed_row_bytes(self.pixel_width, self.pixel_bits)
    }

    /// Fields whose values differ between `self` and `other`.
    pub fn diff(&self, other: &ScanSettings) -> SettingsMask {
        SettingId::FIELDS
            .into_iter()
            .filter(|id| self.value(*id) != other.value(*id))
            .collect()
    }
}

pub fn packed_row_bytes(width: u32, pixel_bits: u32) -> u64 {
    (u64::from(width) * u64::from(pixel_bits)).div_ceil(8)
}

pub fn padded_row_bytes(width: u32, pixel_bits: u32, alignment: u32) -> u32 {
    let alignment = u64::from(alignment.max(1));
    let padded = packed_row_bytes(width, pixel_bits).div_ceil(alignment) * alignment;
    u32::try_from(padded).unwrap_or(u32::MAX)
}
