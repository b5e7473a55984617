//! Mixer data models.
//!
//! Defines the channel model, the kernel capability masks a channel's flags
//! are decoded from, mixer identity, the mute and recording-source actions,
//! and the error type shared by the whole crate.

use std::fmt;
use std::io;

use thiserror::Error;

use super::volume::Volume;

/// Number of entries in the kernel's channel name table (`SOUND_MIXER_NRDEVICES`).
pub const CHANNEL_COUNT: usize = 25;

/// Kernel channel labels (`SOUND_DEVICE_NAMES`), indexed by channel number.
pub const CHANNEL_NAMES: [&str; CHANNEL_COUNT] = [
    "vol", "bass", "treble", "synth", "pcm", "speaker", "line", "mic", "cd", "mix", "pcm2", "rec",
    "igain", "ogain", "line1", "line2", "line3", "dig1", "dig2", "dig3", "phin", "phout", "video",
    "radio", "monitor",
];

/// Look up the kernel label for a channel number.
pub fn channel_name(index: usize) -> Option<&'static str> {
    CHANNEL_NAMES.get(index).copied()
}

/// Bit-per-channel snapshots of kernel-reported mixer state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityMasks {
    /// Channels that exist and can be controlled
    pub devices: u32,

    /// Channels that can serve as a recording source
    pub recording: u32,

    /// Channels currently selected as recording sources
    pub recsrc: u32,

    /// Channels currently muted
    pub muted: u32,
}

/// True if bit `index` is set in `mask`.
pub fn is_set(mask: u32, index: usize) -> bool {
    index < 32 && mask & (1 << index) != 0
}

impl CapabilityMasks {
    pub fn is_device(&self, index: usize) -> bool {
        is_set(self.devices, index)
    }

    pub fn is_recording(&self, index: usize) -> bool {
        is_set(self.recording, index)
    }

    pub fn is_recsrc(&self, index: usize) -> bool {
        is_set(self.recsrc, index)
    }

    pub fn is_muted(&self, index: usize) -> bool {
        is_set(self.muted, index)
    }

    /// Channels that get an entry in the session: anything the kernel
    /// reports as controllable or as a possible recording source.
    pub fn is_present(&self, index: usize) -> bool {
        self.is_device(index) || self.is_recording(index)
    }
}

/// A single controllable mixer line with its cached state.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Kernel channel number, unique within a mixer
    pub index: usize,

    /// Label from the kernel name table
    pub name: &'static str,

    /// Normalized left/right volume
    pub volume: Volume,

    /// Playback line (controllable and not a recording input)
    pub is_playback: bool,

    /// Can be selected as a recording source
    pub is_recording: bool,

    /// Currently selected as a recording source
    pub is_recsrc: bool,

    /// Currently muted
    pub is_muted: bool,
}

impl Channel {
    /// Build a channel and decode its flags from `masks`.
    pub fn new(index: usize, name: &'static str, volume: Volume, masks: &CapabilityMasks) -> Self {
        let mut channel = Self {
            index,
            name,
            volume,
            is_playback: false,
            is_recording: false,
            is_recsrc: false,
            is_muted: false,
        };
        channel.apply_masks(masks);
        channel
    }

    /// Re-derive every flag from the mask snapshot.
    pub fn apply_masks(&mut self, masks: &CapabilityMasks) {
        self.is_recording = masks.is_recording(self.index);
        self.is_playback = masks.is_device(self.index) && !self.is_recording;
        self.is_recsrc = masks.is_recsrc(self.index);
        self.is_muted = masks.is_muted(self.index);
    }

    /// Balance between the two sides (`right - left`).
    pub fn pan(&self) -> f32 {
        self.volume.pan()
    }
}

/// Names reported by the mixer and card info queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixerIdentity {
    /// Mixer name (e.g. "pcm0:mixer")
    pub mixer_name: String,

    /// Card description
    pub card_long_name: String,

    /// Hardware details (codec, IRQ, bus location)
    pub card_hw_info: String,
}

/// Owned copy of a mixer's state, safe to keep after the session closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerSnapshot {
    pub unit: u32,
    pub path: String,
    pub identity: MixerIdentity,
    pub is_default_unit: bool,
    pub masks: CapabilityMasks,
    pub channels: Vec<Channel>,
    pub selected: Option<usize>,
}

impl MixerSnapshot {
    /// Channels currently selected as recording sources, in index order.
    pub fn recording_sources(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| self.masks.is_recsrc(c.index))
    }
}

/// Change applied to the selected channel's mute bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MuteAction {
    Mute = 0x01,
    Unmute = 0x02,
    Toggle = 0x04,
}

impl MuteAction {
    /// New mute mask after applying this action to `index`.
    pub fn apply(self, mask: u32, index: usize) -> u32 {
        let bit = 1u32 << index;
        match self {
            MuteAction::Mute => mask | bit,
            MuteAction::Unmute => mask & !bit,
            MuteAction::Toggle => mask ^ bit,
        }
    }
}

impl TryFrom<i32> for MuteAction {
    type Error = MixerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(MuteAction::Mute),
            0x02 => Ok(MuteAction::Unmute),
            0x04 => Ok(MuteAction::Toggle),
            _ => Err(MixerError::InvalidArgument(format!(
                "unknown mute action: {code:#x}"
            ))),
        }
    }
}

/// Change applied to the recording-source mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RecSrcAction {
    /// Add the channel to the current sources
    Add = 0x01,

    /// Remove the channel from the current sources
    Remove = 0x02,

    /// Make the channel the only source
    Set = 0x04,

    Toggle = 0x08,
}

impl RecSrcAction {
    /// New recording-source mask after applying this action to `index`.
    pub fn apply(self, mask: u32, index: usize) -> u32 {
        let bit = 1u32 << index;
        match self {
            RecSrcAction::Add => mask | bit,
            RecSrcAction::Remove => mask & !bit,
            RecSrcAction::Set => bit,
            RecSrcAction::Toggle => mask ^ bit,
        }
    }
}

impl TryFrom<i32> for RecSrcAction {
    type Error = MixerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(RecSrcAction::Add),
            0x02 => Ok(RecSrcAction::Remove),
            0x04 => Ok(RecSrcAction::Set),
            0x08 => Ok(RecSrcAction::Toggle),
            _ => Err(MixerError::InvalidArgument(format!(
                "unknown recording source action: {code:#x}"
            ))),
        }
    }
}

/// Broad classification of a [`MixerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    OutOfRange,
    NotFound,
    NoSuchFeature,
    DeviceError,
    ResourceExhausted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::OutOfRange => "out of range",
            ErrorKind::NotFound => "not found",
            ErrorKind::NoSuchFeature => "no such feature",
            ErrorKind::DeviceError => "device error",
            ErrorKind::ResourceExhausted => "resource exhausted",
        };
        f.write_str(s)
    }
}

/// Mixer error types.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Volume out of range: {left:.2}:{right:.2} (expected 0.00 to 1.00)")]
    VolumeOutOfRange { left: f32, right: f32 },

    #[error("Pan out of range: {0:+.2} (expected -1.00 to +1.00)")]
    PanOutOfRange(f32),

    #[error("Channel index out of range: {0} (expected 0 to {max})", max = CHANNEL_COUNT - 1)]
    IndexOutOfRange(i64),

    #[error("No such channel: {0}")]
    ChannelNotFound(String),

    #[error("Mixer has no channels")]
    NoChannels,

    #[error("Recording source not available: {0}")]
    NoSuchFeature(String),

    #[error("Cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{op} failed: {source}")]
    Device {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Out of memory while building the channel list")]
    ResourceExhausted,
}

impl MixerError {
    /// Wrap an OS error from the named device operation.
    pub fn device(op: &'static str, source: impl Into<io::Error>) -> Self {
        MixerError::Device {
            op,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MixerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MixerError::VolumeOutOfRange { .. }
            | MixerError::PanOutOfRange(_)
            | MixerError::IndexOutOfRange(_) => ErrorKind::OutOfRange,
            MixerError::ChannelNotFound(_) | MixerError::NoChannels => ErrorKind::NotFound,
            MixerError::NoSuchFeature(_) => ErrorKind::NoSuchFeature,
            MixerError::Open { .. } | MixerError::Device { .. } => ErrorKind::DeviceError,
            MixerError::ResourceExhausted => ErrorKind::ResourceExhausted,
        }
    }

    /// Underlying OS error kind for device failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            MixerError::Open { source, .. } | MixerError::Device { source, .. } => {
                Some(source.kind())
            }
            _ => None,
        }
    }
}
