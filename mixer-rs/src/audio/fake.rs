//! In-memory sound system for exercising the session without hardware.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::rc::Rc;

use super::backend::{MixerDevice, SoundSystem};
use super::device::{CapabilityMasks, MixerError, MixerIdentity, CHANNEL_COUNT};
use super::volume::RawVolume;

/// A request the fake kernel received that changed its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeWrite {
    Volume { index: usize, value: i32 },
    Mute(u32),
    RecSrc(u32),
}

#[derive(Debug)]
pub struct FakeState {
    pub default_unit: u32,
    /// Paths that exist. Anything else fails to open with `NotFound`.
    pub nodes: HashSet<String>,
    pub identity: MixerIdentity,
    pub devices: u32,
    pub recording: u32,
    pub recsrc: u32,
    pub muted: u32,
    /// Packed kernel volume per channel.
    pub volumes: [i32; CHANNEL_COUNT],
    /// Highest raw level the fake kernel accepts; larger writes are clamped.
    pub volume_ceiling: u8,
    /// Sources the fake kernel allows; written recsrc masks are ANDed with it.
    pub recsrc_allowed: u32,
    pub mixer_count: u32,
    /// Operation names that fail with an I/O error.
    pub failing: HashSet<&'static str>,
    pub writes: Vec<FakeWrite>,
    pub opened: Vec<String>,
    pub open_handles: usize,
    pub releases: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            default_unit: 0,
            nodes: (0..4).map(|u| format!("/dev/mixer{u}")).collect(),
            identity: MixerIdentity {
                mixer_name: "pcm0:mixer".to_string(),
                card_long_name: "Fake HDA codec".to_string(),
                card_hw_info: "at nid 0".to_string(),
            },
            devices: 0,
            recording: 0,
            recsrc: 0,
            muted: 0,
            volumes: [0; CHANNEL_COUNT],
            volume_ceiling: 100,
            recsrc_allowed: u32::MAX,
            mixer_count: 1,
            failing: HashSet::new(),
            writes: Vec::new(),
            opened: Vec::new(),
            open_handles: 0,
            releases: 0,
        }
    }
}

impl FakeState {
    fn check(&self, op: &'static str) -> Result<(), MixerError> {
        if self.failing.contains(op) {
            return Err(MixerError::device(op, io::Error::other("injected failure")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    state: Rc<RefCell<FakeState>>,
}

impl FakeSystem {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Mixer exposing `channels` as `(index, left, right)` raw levels.
    pub fn with_channels(channels: &[(usize, u8, u8)], recording: u32) -> Self {
        let mut state = FakeState::default();
        for &(index, left, right) in channels {
            state.devices |= 1 << index;
            state.volumes[index] = RawVolume::new(left, right).pack();
        }
        state.recording = recording;
        Self::new(state)
    }

    pub fn state(&self) -> std::cell::RefMut<'_, FakeState> {
        self.state.borrow_mut()
    }

    pub fn fail(&self, op: &'static str) {
        self.state.borrow_mut().failing.insert(op);
    }

    pub fn writes(&self) -> Vec<FakeWrite> {
        self.state.borrow().writes.clone()
    }
}

impl SoundSystem for FakeSystem {
    type Device = FakeDevice;

    fn open_device(&self, path: &str) -> Result<FakeDevice, MixerError> {
        let mut state = self.state.borrow_mut();
        if !state.nodes.contains(path) {
            return Err(MixerError::Open {
                path: path.to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        state.opened.push(path.to_string());
        state.open_handles += 1;
        Ok(FakeDevice {
            state: Rc::clone(&self.state),
            closed: false,
        })
    }

    fn default_unit(&self) -> Result<u32, MixerError> {
        let state = self.state.borrow();
        state.check("default_unit")?;
        Ok(state.default_unit)
    }

    fn set_default_unit(&self, unit: u32) -> Result<(), MixerError> {
        let mut state = self.state.borrow_mut();
        state.check("set_default_unit")?;
        state.default_unit = unit;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeDevice {
    state: Rc<RefCell<FakeState>>,
    closed: bool,
}

impl FakeDevice {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.state.borrow_mut();
            state.open_handles -= 1;
            state.releases += 1;
        }
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.release();
    }
}

impl MixerDevice for FakeDevice {
    fn identity(&self, _unit: u32) -> Result<MixerIdentity, MixerError> {
        let state = self.state.borrow();
        state.check("identity")?;
        Ok(state.identity.clone())
    }

    fn capability_masks(&self) -> Result<CapabilityMasks, MixerError> {
        let state = self.state.borrow();
        state.check("capability_masks")?;
        Ok(CapabilityMasks {
            devices: state.devices,
            recording: state.recording,
            recsrc: state.recsrc,
            muted: state.muted,
        })
    }

    fn read_volume(&self, index: usize) -> Result<RawVolume, MixerError> {
        let state = self.state.borrow();
        state.check("read_volume")?;
        Ok(RawVolume::unpack(state.volumes[index]))
    }

    fn write_volume(&mut self, index: usize, volume: RawVolume) -> Result<(), MixerError> {
        let mut state = self.state.borrow_mut();
        state.check("write_volume")?;
        let value = volume.pack();
        state.writes.push(FakeWrite::Volume { index, value });
        let ceiling = state.volume_ceiling;
        state.volumes[index] =
            RawVolume::new(volume.left.min(ceiling), volume.right.min(ceiling)).pack();
        Ok(())
    }

    fn read_mute_mask(&self) -> Result<u32, MixerError> {
        let state = self.state.borrow();
        state.check("read_mute_mask")?;
        Ok(state.muted)
    }

    fn write_mute_mask(&mut self, mask: u32) -> Result<(), MixerError> {
        let mut state = self.state.borrow_mut();
        state.check("write_mute_mask")?;
        state.writes.push(FakeWrite::Mute(mask));
        state.muted = mask & state.devices;
        Ok(())
    }

    fn read_recsrc_mask(&self) -> Result<u32, MixerError> {
        let state = self.state.borrow();
        state.check("read_recsrc_mask")?;
        Ok(state.recsrc)
    }

    fn write_recsrc_mask(&mut self, mask: u32) -> Result<(), MixerError> {
        let mut state = self.state.borrow_mut();
        state.check("write_recsrc_mask")?;
        state.writes.push(FakeWrite::RecSrc(mask));
        state.recsrc = mask & state.recording & state.recsrc_allowed;
        Ok(())
    }

    fn mixer_count(&self) -> Result<u32, MixerError> {
        let state = self.state.borrow();
        state.check("mixer_count")?;
        Ok(state.mixer_count)
    }

    fn close(mut self) -> Result<(), MixerError> {
        self.release();
        let result = self.state.borrow().check("close");
        result
    }
}
