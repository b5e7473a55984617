//! Channel volume encoding.
//!
//! The kernel reports a channel's level as one integer per channel with the
//! left side in the low byte and the right side in the next byte, each on a
//! 0-100 scale. The session works with normalized `f32` values in 0.0-1.0.

use super::device::MixerError;

/// Lowest normalized volume.
pub const VOLUME_MIN: f32 = 0.0;

/// Highest normalized volume.
pub const VOLUME_MAX: f32 = 1.0;

/// Highest raw kernel volume.
pub const RAW_MAX: u8 = 100;

/// Lowest and highest pan values.
pub const PAN_MIN: f32 = -1.0;
pub const PAN_MAX: f32 = 1.0;

/// Convert a raw 0-100 level to 0.0-1.0.
pub fn normalize(raw: u8) -> f32 {
    f32::from(raw.min(RAW_MAX)) / 100.0
}

/// Convert a 0.0-1.0 level to the nearest raw 0-100 value.
pub fn denormalize(level: f32) -> u8 {
    (level.clamp(VOLUME_MIN, VOLUME_MAX) * 100.0).round() as u8
}

/// Left/right levels in the kernel's native scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawVolume {
    pub left: u8,
    pub right: u8,
}

impl RawVolume {
    pub fn new(left: u8, right: u8) -> Self {
        Self { left, right }
    }

    /// Encode as `left | right << 8`.
    pub fn pack(self) -> i32 {
        i32::from(self.left) | (i32::from(self.right) << 8)
    }

    /// Decode a kernel value. Each side is masked to 7 bits and capped at 100.
    pub fn unpack(value: i32) -> Self {
        let left = (value & 0x7f) as u8;
        let right = ((value >> 8) & 0x7f) as u8;
        Self {
            left: left.min(RAW_MAX),
            right: right.min(RAW_MAX),
        }
    }
}

/// Normalized left/right volume, both sides within 0.0-1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Volume {
    pub left: f32,
    pub right: f32,
}

impl Volume {
    /// Validate a pair of normalized levels.
    pub fn new(left: f32, right: f32) -> Result<Self, MixerError> {
        if !in_range(left) || !in_range(right) {
            return Err(MixerError::VolumeOutOfRange { left, right });
        }
        Ok(Self { left, right })
    }

    pub fn from_raw(raw: RawVolume) -> Self {
        Self {
            left: normalize(raw.left),
            right: normalize(raw.right),
        }
    }

    pub fn to_raw(self) -> RawVolume {
        RawVolume {
            left: denormalize(self.left),
            right: denormalize(self.right),
        }
    }

    /// `right - left`, in -1.0..=1.0.
    pub fn pan(&self) -> f32 {
        self.right - self.left
    }

    /// Rebalance to `pan` while keeping the quieter side where it is.
    ///
    /// The side `pan` points to is raised to `base + |pan|`. If that would
    /// exceed 1.0 both sides move down so the louder one sits at 1.0.
    pub fn with_pan(&self, pan: f32) -> Result<Self, MixerError> {
        if !(PAN_MIN..=PAN_MAX).contains(&pan) {
            return Err(MixerError::PanOutOfRange(pan));
        }
        let spread = pan.abs();
        let base = self.left.min(self.right).min(VOLUME_MAX - spread);
        let (left, right) = if pan >= 0.0 {
            (base, base + spread)
        } else {
            (base + spread, base)
        };
        Self::new(left.clamp(VOLUME_MIN, VOLUME_MAX), right.clamp(VOLUME_MIN, VOLUME_MAX))
    }
}

fn in_range(level: f32) -> bool {
    (VOLUME_MIN..=VOLUME_MAX).contains(&level)
}
