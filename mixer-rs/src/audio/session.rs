//! Mixer session.
//!
//! A [`MixerSession`] owns one open mixer handle and a cached view of its
//! channels. Mutators write to the device, read the value back and only then
//! update the cache, so the cache always reflects what the kernel accepted.

use std::fmt;

use tracing::{debug, info};

use super::backend::{device_path, MixerDevice, SoundSystem, DEVICE_PREFIX};
use super::device::{
    channel_name, CapabilityMasks, Channel, MixerError, MixerIdentity, MixerSnapshot, MuteAction,
    RecSrcAction, CHANNEL_COUNT, CHANNEL_NAMES,
};
use super::volume::Volume;
use crate::platform::OssSystem;

/// Session over the system's OSS mixer devices.
pub type Mixer = MixerSession<OssSystem>;

/// Resolve a device name to a unit number.
///
/// Returns `None` when the name is absent or the bare `/dev/mixer` prefix,
/// meaning the system default unit.
pub fn parse_device_name(name: Option<&str>) -> Result<Option<u32>, MixerError> {
    let Some(name) = name else {
        return Ok(None);
    };
    let suffix = name.strip_prefix(DEVICE_PREFIX).ok_or_else(|| {
        MixerError::InvalidArgument(format!("not a mixer device: {name}"))
    })?;
    if suffix.is_empty() {
        return Ok(None);
    }
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MixerError::InvalidArgument(format!(
            "bad unit number in {name}"
        )));
    }
    suffix
        .parse::<u32>()
        .map(Some)
        .map_err(|_| MixerError::InvalidArgument(format!("bad unit number in {name}")))
}

/// An open mixer and its cached channel state.
pub struct MixerSession<S: SoundSystem> {
    system: S,
    device: S::Device,
    unit: u32,
    path: String,
    identity: MixerIdentity,
    is_default_unit: bool,
    masks: CapabilityMasks,
    channels: Vec<Channel>,
    selected: Option<usize>,
}

impl<S: SoundSystem> fmt::Debug for MixerSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixerSession")
            .field("unit", &self.unit)
            .field("path", &self.path)
            .field("identity", &self.identity)
            .field("is_default_unit", &self.is_default_unit)
            .field("masks", &self.masks)
            .field("channels", &self.channels)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Mixer {
    /// Open an OSS mixer. `None` or `"/dev/mixer"` opens the default unit.
    pub fn open(name: Option<&str>) -> Result<Self, MixerError> {
        Self::open_with(OssSystem, name)
    }

    /// Number of mixers in the system.
    pub fn count_mixers() -> Result<u32, MixerError> {
        Self::count_mixers_with(&OssSystem)
    }
}

impl<S: SoundSystem> MixerSession<S> {
    /// Open a mixer through `system`.
    ///
    /// On any failure after the device node was opened the handle is dropped
    /// (and thereby closed) before the error is returned.
    pub fn open_with(system: S, name: Option<&str>) -> Result<Self, MixerError> {
        let (unit, path) = match parse_device_name(name)? {
            Some(unit) => (unit, name.map_or_else(|| device_path(unit), str::to_string)),
            None => {
                let unit = system.default_unit()?;
                (unit, device_path(unit))
            }
        };

        let device = system.open_device(&path)?;
        let is_default_unit = unit == system.default_unit()?;
        let identity = device.identity(unit)?;
        let masks = device.capability_masks()?;
        let channels = read_channels(&device, &masks)?;
        let selected = if channels.is_empty() { None } else { Some(0) };

        info!(
            path = %path,
            mixer = %identity.mixer_name,
            channels = channels.len(),
            is_default_unit,
            "opened mixer"
        );

        Ok(Self {
            system,
            device,
            unit,
            path,
            identity,
            is_default_unit,
            masks,
            channels,
            selected,
        })
    }

    /// Close the session, reporting the result of closing the handle.
    pub fn close(self) -> Result<(), MixerError> {
        let Self {
            device,
            path,
            channels,
            ..
        } = self;
        drop(channels);
        let result = device.close();
        debug!(path = %path, ok = result.is_ok(), "closed mixer");
        result
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn identity(&self) -> &MixerIdentity {
        &self.identity
    }

    /// Whether this mixer was the system default unit when last checked.
    pub fn is_default_unit(&self) -> bool {
        self.is_default_unit
    }

    pub fn masks(&self) -> &CapabilityMasks {
        &self.masks
    }

    /// Channels in ascending index order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// The channel subsequent mutators act on.
    pub fn selected(&self) -> Result<&Channel, MixerError> {
        self.selected_pos().map(|pos| &self.channels[pos])
    }

    fn selected_pos(&self) -> Result<usize, MixerError> {
        self.selected.ok_or(MixerError::NoChannels)
    }

    /// Select a channel by label. On a miss the selection is unchanged.
    pub fn select_by_name(&mut self, name: &str) -> Result<&Channel, MixerError> {
        let pos = self
            .channels
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| MixerError::ChannelNotFound(name.to_string()))?;
        self.selected = Some(pos);
        Ok(&self.channels[pos])
    }

    /// Select a channel by kernel index. On a miss the selection is unchanged.
    pub fn select_by_index(&mut self, index: usize) -> Result<&Channel, MixerError> {
        if index >= CHANNEL_COUNT {
            return Err(MixerError::IndexOutOfRange(
                i64::try_from(index).unwrap_or(i64::MAX),
            ));
        }
        let pos = self
            .channels
            .iter()
            .position(|c| c.index == index)
            .ok_or_else(|| MixerError::ChannelNotFound(CHANNEL_NAMES[index].to_string()))?;
        self.selected = Some(pos);
        Ok(&self.channels[pos])
    }

    /// Set the selected channel's volume, returning the level the kernel kept.
    pub fn set_volume(&mut self, left: f32, right: f32) -> Result<Volume, MixerError> {
        let requested = Volume::new(left, right)?;
        let pos = self.selected_pos()?;
        let index = self.channels[pos].index;

        self.device.write_volume(index, requested.to_raw())?;
        let confirmed = Volume::from_raw(self.device.read_volume(index)?);

        let channel = &mut self.channels[pos];
        debug!(
            channel = channel.name,
            from = ?channel.volume,
            to = ?confirmed,
            "set volume"
        );
        channel.volume = confirmed;
        Ok(confirmed)
    }

    /// Rebalance the selected channel. See [`Volume::with_pan`].
    pub fn set_pan(&mut self, pan: f32) -> Result<Volume, MixerError> {
        let target = self.selected()?.volume.with_pan(pan)?;
        self.set_volume(target.left, target.right)
    }

    /// Change the selected channel's mute state, returning whether it is muted.
    pub fn set_mute(&mut self, action: MuteAction) -> Result<bool, MixerError> {
        let pos = self.selected_pos()?;
        let index = self.channels[pos].index;

        let mask = action.apply(self.masks.muted, index);
        self.device.write_mute_mask(mask)?;
        self.masks.muted = self.device.read_mute_mask()?;
        self.apply_masks();

        let channel = &self.channels[pos];
        debug!(channel = channel.name, ?action, muted = channel.is_muted, "set mute");
        Ok(channel.is_muted)
    }

    /// Change the recording-source mask around the selected channel,
    /// returning whether it is a recording source afterwards.
    pub fn modify_recording_source(&mut self, action: RecSrcAction) -> Result<bool, MixerError> {
        if self.masks.recording == 0 {
            return Err(MixerError::NoSuchFeature(format!(
                "{} has no recording inputs",
                self.path
            )));
        }
        let pos = self.selected_pos()?;
        let channel = &self.channels[pos];
        if !channel.is_recording {
            return Err(MixerError::NoSuchFeature(channel.name.to_string()));
        }
        let index = channel.index;

        let mask = action.apply(self.masks.recsrc, index);
        self.device.write_recsrc_mask(mask)?;
        self.masks.recsrc = self.device.read_recsrc_mask()?;
        self.apply_masks();

        let channel = &self.channels[pos];
        info!(
            channel = channel.name,
            ?action,
            recsrc = self.masks.recsrc,
            "changed recording sources"
        );
        Ok(channel.is_recsrc)
    }

    fn apply_masks(&mut self) {
        let masks = self.masks;
        for channel in &mut self.channels {
            channel.apply_masks(&masks);
        }
    }

    /// Current system default unit.
    pub fn default_unit(&self) -> Result<u32, MixerError> {
        self.system.default_unit()
    }

    /// Change the system default unit.
    pub fn set_default_unit(&mut self, unit: u32) -> Result<(), MixerError> {
        self.system.set_default_unit(unit)?;
        self.is_default_unit = self.unit == unit;
        Ok(())
    }

    /// Re-query the system default unit and update [`Self::is_default_unit`].
    pub fn refresh_default_unit(&mut self) -> Result<bool, MixerError> {
        self.is_default_unit = self.unit == self.system.default_unit()?;
        Ok(self.is_default_unit)
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> MixerSnapshot {
        MixerSnapshot {
            unit: self.unit,
            path: self.path.clone(),
            identity: self.identity.clone(),
            is_default_unit: self.is_default_unit,
            masks: self.masks,
            channels: self.channels.clone(),
            selected: self.selected,
        }
    }
}

impl<S: SoundSystem + Clone> MixerSession<S> {
    /// Number of mixers in the system, queried through a throwaway session
    /// on the default unit.
    pub fn count_mixers_with(system: &S) -> Result<u32, MixerError> {
        let session = Self::open_with(system.clone(), None)?;
        let count = session.device.mixer_count();
        let closed = session.close();
        let count = count?;
        closed?;
        Ok(count)
    }
}

fn read_channels<D: MixerDevice>(
    device: &D,
    masks: &CapabilityMasks,
) -> Result<Vec<Channel>, MixerError> {
    let present = (0..CHANNEL_COUNT).filter(|&i| masks.is_present(i));

    let mut channels = Vec::new();
    channels
        .try_reserve_exact(present.clone().count())
        .map_err(|_| MixerError::ResourceExhausted)?;

    for index in present {
        let Some(name) = channel_name(index) else {
            continue;
        };
        let volume = Volume::from_raw(device.read_volume(index)?);
        channels.push(Channel::new(index, name, volume, masks));
    }
    Ok(channels)
}
