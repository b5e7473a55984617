//! Device protocol adapter interfaces.
//!
//! The session talks to the kernel only through these two traits:
//! [`SoundSystem`] for process-wide operations (opening a mixer node, the
//! default unit) and [`MixerDevice`] for calls against one open handle.
//! Implemented by:
//! - `OssSystem` / `OssDevice` (OSS ioctls on `/dev/mixerN`)
//! - the in-memory fake used by the session tests

use super::device::{CapabilityMasks, MixerError, MixerIdentity};
use super::volume::RawVolume;

/// Prefix of every mixer device node. `/dev/mixer` alone means the default unit.
pub const DEVICE_PREFIX: &str = "/dev/mixer";

/// Canonical device node for `unit`.
pub fn device_path(unit: u32) -> String {
    format!("{DEVICE_PREFIX}{unit}")
}

/// Process-wide sound system operations.
pub trait SoundSystem {
    /// Handle type returned by [`SoundSystem::open_device`].
    type Device: MixerDevice;

    /// Open a mixer node for reading and writing.
    fn open_device(&self, path: &str) -> Result<Self::Device, MixerError>;

    /// Current system default unit.
    fn default_unit(&self) -> Result<u32, MixerError>;

    /// Change the system default unit.
    fn set_default_unit(&self, unit: u32) -> Result<(), MixerError>;
}

/// Operations on one open mixer handle.
///
/// Every call is a single synchronous request to the device. Implementations
/// never retry; failures are returned as they come.
pub trait MixerDevice {
    /// Mixer and card names. `unit` selects which mixer/card to describe.
    fn identity(&self, unit: u32) -> Result<MixerIdentity, MixerError>;

    /// Device, recording, recording-source and mute masks.
    fn capability_masks(&self) -> Result<CapabilityMasks, MixerError>;

    fn read_volume(&self, index: usize) -> Result<RawVolume, MixerError>;

    fn write_volume(&mut self, index: usize, volume: RawVolume) -> Result<(), MixerError>;

    fn read_mute_mask(&self) -> Result<u32, MixerError>;

    fn write_mute_mask(&mut self, mask: u32) -> Result<(), MixerError>;

    fn read_recsrc_mask(&self) -> Result<u32, MixerError>;

    fn write_recsrc_mask(&mut self, mask: u32) -> Result<(), MixerError>;

    /// Number of mixers in the whole system. Independent of which unit the
    /// handle targets.
    fn mixer_count(&self) -> Result<u32, MixerError>;

    /// Release the handle, reporting the close result.
    fn close(self) -> Result<(), MixerError>;
}
