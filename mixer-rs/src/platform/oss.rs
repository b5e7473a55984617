//! OSS mixer ioctl bindings.
//!
//! Implements [`SoundSystem`] and [`MixerDevice`] on top of the kernel's
//! `/dev/mixerN` nodes. Channel levels use the legacy `MIXER_READ(i)` /
//! `MIXER_WRITE(i)` requests, masks use the reserved channel numbers at the
//! top of the `'M'` group, and identity queries use the OSS4 `'X'` group.

use std::fs::File;
use std::mem;
use std::os::fd::{AsRawFd, IntoRawFd};

use nix::errno::Errno;
use nix::libc;
use tracing::debug;

use super::sysctl;
use crate::audio::backend::{MixerDevice, SoundSystem};
use crate::audio::device::{CapabilityMasks, MixerError, MixerIdentity};
use crate::audio::volume::RawVolume;

const MIXER_MAGIC: u8 = b'M';
const SOUND_MIXER_MUTE: u8 = 28;
const SOUND_MIXER_RECMASK: u8 = 0xfd;
const SOUND_MIXER_DEVMASK: u8 = 0xfe;
const SOUND_MIXER_RECSRC: u8 = 0xff;

const INFO_MAGIC: u8 = b'X';
const SNDCTL_SYSINFO: u8 = 1;
const SNDCTL_MIXERINFO: u8 = 10;
const SNDCTL_CARDINFO: u8 = 11;

nix::ioctl_read!(oss_read_devmask, MIXER_MAGIC, SOUND_MIXER_DEVMASK, libc::c_int);
nix::ioctl_read!(oss_read_recmask, MIXER_MAGIC, SOUND_MIXER_RECMASK, libc::c_int);
nix::ioctl_read!(oss_read_recsrc, MIXER_MAGIC, SOUND_MIXER_RECSRC, libc::c_int);
nix::ioctl_readwrite!(oss_write_recsrc, MIXER_MAGIC, SOUND_MIXER_RECSRC, libc::c_int);
nix::ioctl_read!(oss_read_mute, MIXER_MAGIC, SOUND_MIXER_MUTE, libc::c_int);
nix::ioctl_readwrite!(oss_write_mute, MIXER_MAGIC, SOUND_MIXER_MUTE, libc::c_int);
nix::ioctl_read!(oss_sysinfo, INFO_MAGIC, SNDCTL_SYSINFO, OssSysInfo);
nix::ioctl_readwrite!(oss_mixerinfo, INFO_MAGIC, SNDCTL_MIXERINFO, OssMixerInfo);
nix::ioctl_readwrite!(oss_cardinfo, INFO_MAGIC, SNDCTL_CARDINFO, OssCardInfo);

/// `oss_sysinfo`
#[repr(C)]
pub struct OssSysInfo {
    pub product: [libc::c_char; 32],
    pub version: [libc::c_char; 32],
    pub versionnum: libc::c_int,
    pub options: [libc::c_char; 512],
    pub numaudios: libc::c_int,
    pub openedaudio: [libc::c_int; 8],
    pub numsynths: libc::c_int,
    pub nummidis: libc::c_int,
    pub numtimers: libc::c_int,
    pub nummixers: libc::c_int,
    pub openedmidi: [libc::c_int; 8],
    pub numcards: libc::c_int,
    pub numaudioengines: libc::c_int,
    pub license: [libc::c_char; 16],
    pub revision_info: [libc::c_char; 256],
    pub filler: [libc::c_int; 172],
}

/// `oss_mixerinfo`
#[repr(C)]
pub struct OssMixerInfo {
    pub dev: libc::c_int,
    pub id: [libc::c_char; 16],
    pub name: [libc::c_char; 32],
    pub modify_counter: libc::c_int,
    pub card_number: libc::c_int,
    pub port_number: libc::c_int,
    pub handle: [libc::c_char; 32],
    pub magic: libc::c_int,
    pub enabled: libc::c_int,
    pub caps: libc::c_int,
    pub flags: libc::c_int,
    pub nrext: libc::c_int,
    pub priority: libc::c_int,
    pub devnode: [libc::c_char; 32],
    pub legacy_device: libc::c_int,
    pub filler: [libc::c_int; 245],
}

/// `oss_card_info`
#[repr(C)]
pub struct OssCardInfo {
    pub card: libc::c_int,
    pub shortname: [libc::c_char; 16],
    pub longname: [libc::c_char; 128],
    pub flags: libc::c_int,
    pub hw_info: [libc::c_char; 400],
    pub intr_count: libc::c_int,
    pub ack_count: libc::c_int,
    pub filler: [libc::c_int; 154],
}

macro_rules! zeroed_default {
    ($($ty:ty),*) => {
        $(impl Default for $ty {
            fn default() -> Self {
                // SAFETY: plain C struct of integers and byte arrays.
                unsafe { mem::zeroed() }
            }
        })*
    };
}

zeroed_default!(OssSysInfo, OssMixerInfo, OssCardInfo);

/// Decode a fixed-size, NUL-padded kernel string.
pub fn c_chars_to_string(chars: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .map(|&c| c as u8)
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Unit number for a card, as the `'X'` info requests expect it.
fn unit_arg(unit: u32) -> Result<libc::c_int, MixerError> {
    libc::c_int::try_from(unit)
        .map_err(|_| MixerError::InvalidArgument(format!("unit number too large: {unit}")))
}

/// OSS sound system: opens `/dev/mixerN` nodes and manages the default unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct OssSystem;

impl SoundSystem for OssSystem {
    type Device = OssDevice;

    fn open_device(&self, path: &str) -> Result<OssDevice, MixerError> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| MixerError::Open {
                path: path.to_string(),
                source,
            })?;
        debug!(path, fd = file.as_raw_fd(), "opened mixer device");
        Ok(OssDevice {
            file,
            path: path.to_string(),
        })
    }

    fn default_unit(&self) -> Result<u32, MixerError> {
        sysctl::default_unit()
    }

    fn set_default_unit(&self, unit: u32) -> Result<(), MixerError> {
        sysctl::set_default_unit(unit)
    }
}

/// Open `/dev/mixerN` handle.
#[derive(Debug)]
pub struct OssDevice {
    file: File,
    path: String,
}

impl OssDevice {
    fn fd(&self) -> libc::c_int {
        self.file.as_raw_fd()
    }

    fn read_mask(
        &self,
        op: &'static str,
        read: unsafe fn(libc::c_int, *mut libc::c_int) -> nix::Result<libc::c_int>,
    ) -> Result<u32, MixerError> {
        let mut mask: libc::c_int = 0;
        // SAFETY: the request reads one int into `mask`.
        unsafe { read(self.fd(), &mut mask) }.map_err(|e| MixerError::device(op, e))?;
        Ok(mask as u32)
    }

    fn write_mask(
        &self,
        op: &'static str,
        write: unsafe fn(libc::c_int, *mut libc::c_int) -> nix::Result<libc::c_int>,
        mask: u32,
    ) -> Result<(), MixerError> {
        let mut value = mask as libc::c_int;
        // SAFETY: the request reads and writes back one int in `value`.
        unsafe { write(self.fd(), &mut value) }.map_err(|e| MixerError::device(op, e))?;
        Ok(())
    }
}

impl MixerDevice for OssDevice {
    fn identity(&self, unit: u32) -> Result<MixerIdentity, MixerError> {
        // The unit must be filled in before either request.
        let mut mi = OssMixerInfo {
            dev: unit_arg(unit)?,
            ..Default::default()
        };
        let mut ci = OssCardInfo {
            card: unit_arg(unit)?,
            ..Default::default()
        };
        // SAFETY: both requests fill the struct passed in.
        unsafe { oss_mixerinfo(self.fd(), &mut mi) }
            .map_err(|e| MixerError::device("SNDCTL_MIXERINFO", e))?;
        unsafe { oss_cardinfo(self.fd(), &mut ci) }
            .map_err(|e| MixerError::device("SNDCTL_CARDINFO", e))?;

        Ok(MixerIdentity {
            mixer_name: c_chars_to_string(&mi.name),
            card_long_name: c_chars_to_string(&ci.longname),
            card_hw_info: c_chars_to_string(&ci.hw_info),
        })
    }

    fn capability_masks(&self) -> Result<CapabilityMasks, MixerError> {
        let devices = self.read_mask("SOUND_MIXER_READ_DEVMASK", oss_read_devmask)?;
        let recording = self.read_mask("SOUND_MIXER_READ_RECMASK", oss_read_recmask)?;
        let recsrc = self.read_recsrc_mask()?;
        let muted = match self.read_mute_mask() {
            Ok(mask) => mask,
            Err(MixerError::Device { source, .. })
                if matches!(
                    Errno::from_raw(source.raw_os_error().unwrap_or(0)),
                    Errno::ENOTTY | Errno::EINVAL
                ) =>
            {
                // Older kernels have no mute request; mute state is unknown
                // and reported as unmuted.
                debug!(path = %self.path, "mute mask not supported, assuming unmuted");
                0
            }
            Err(e) => return Err(e),
        };
        debug!(
            path = %self.path,
            devices,
            recording,
            recsrc,
            muted,
            "read capability masks"
        );

        Ok(CapabilityMasks {
            devices,
            recording,
            recsrc,
            muted,
        })
    }

    fn read_volume(&self, index: usize) -> Result<RawVolume, MixerError> {
        let mut value: libc::c_int = 0;
        let request = nix::request_code_read!(MIXER_MAGIC, index, mem::size_of::<libc::c_int>());
        // SAFETY: MIXER_READ(index) writes one int into `value`.
        let res = unsafe {
            libc::ioctl(
                self.fd(),
                request as nix::sys::ioctl::ioctl_num_type,
                &mut value as *mut libc::c_int,
            )
        };
        Errno::result(res).map_err(|e| MixerError::device("MIXER_READ", e))?;
        Ok(RawVolume::unpack(value))
    }

    fn write_volume(&mut self, index: usize, volume: RawVolume) -> Result<(), MixerError> {
        let mut value = volume.pack();
        let request =
            nix::request_code_readwrite!(MIXER_MAGIC, index, mem::size_of::<libc::c_int>());
        // SAFETY: MIXER_WRITE(index) reads one int from `value` and may write it back.
        let res = unsafe {
            libc::ioctl(
                self.fd(),
                request as nix::sys::ioctl::ioctl_num_type,
                &mut value as *mut libc::c_int,
            )
        };
        Errno::result(res).map_err(|e| MixerError::device("MIXER_WRITE", e))?;
        debug!(path = %self.path, index, value, "wrote channel volume");
        Ok(())
    }

    fn read_mute_mask(&self) -> Result<u32, MixerError> {
        self.read_mask("SOUND_MIXER_READ_MUTE", oss_read_mute)
    }

    fn write_mute_mask(&mut self, mask: u32) -> Result<(), MixerError> {
        self.write_mask("SOUND_MIXER_WRITE_MUTE", oss_write_mute, mask)
    }

    fn read_recsrc_mask(&self) -> Result<u32, MixerError> {
        self.read_mask("SOUND_MIXER_READ_RECSRC", oss_read_recsrc)
    }

    fn write_recsrc_mask(&mut self, mask: u32) -> Result<(), MixerError> {
        self.write_mask("SOUND_MIXER_WRITE_RECSRC", oss_write_recsrc, mask)
    }

    fn mixer_count(&self) -> Result<u32, MixerError> {
        let mut si = OssSysInfo::default();
        // SAFETY: SNDCTL_SYSINFO fills `si`.
        unsafe { oss_sysinfo(self.fd(), &mut si) }
            .map_err(|e| MixerError::device("SNDCTL_SYSINFO", e))?;
        debug!(
            product = %c_chars_to_string(&si.product),
            nummixers = si.nummixers,
            "read sound system info"
        );
        Ok(si.nummixers.max(0) as u32)
    }

    fn close(self) -> Result<(), MixerError> {
        let path = self.path;
        let fd = self.file.into_raw_fd();
        // SAFETY: `fd` came from `into_raw_fd` and is closed exactly once here.
        let res = unsafe { libc::close(fd) };
        Errno::result(res).map_err(|e| MixerError::device("close", e))?;
        debug!(path = %path, "closed mixer device");
        Ok(())
    }
}
