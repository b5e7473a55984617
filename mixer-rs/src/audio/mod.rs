//! Audio module for OSS mixer control.
//!
//! This module provides the channel and volume models, the device protocol
//! traits, mixer sessions and mixer enumeration.

pub mod backend;
pub mod device;
pub mod enumerator;
#[cfg(test)]
pub(crate) mod fake;
pub mod session;
pub mod volume;

pub use backend::{device_path, MixerDevice, SoundSystem, DEVICE_PREFIX};
pub use device::{
    CapabilityMasks, Channel, ErrorKind, MixerError, MixerIdentity, MixerSnapshot, MuteAction,
    RecSrcAction, CHANNEL_COUNT, CHANNEL_NAMES,
};
pub use enumerator::{enumerate_mixers, MixerEnumerator};
pub use session::{Mixer, MixerSession};
pub use volume::{RawVolume, Volume};
