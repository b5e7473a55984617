//! System default audio unit (`hw.snd.default_unit`).
//!
//! Only FreeBSD and DragonFly expose the setting. Elsewhere the default unit
//! is always 0 and cannot be changed.

use crate::audio::device::MixerError;

#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
mod imp {
    use std::ffi::{c_void, CStr};
    use std::mem;
    use std::ptr;

    use nix::errno::Errno;
    use nix::libc;
    use tracing::info;

    use crate::audio::device::MixerError;

    const DEFAULT_UNIT: &CStr = c"hw.snd.default_unit";

    pub fn default_unit() -> Result<u32, MixerError> {
        let mut unit: libc::c_int = 0;
        let mut size = mem::size_of::<libc::c_int>();
        // SAFETY: `unit` and `size` describe a valid int-sized output buffer.
        let res = unsafe {
            libc::sysctlbyname(
                DEFAULT_UNIT.as_ptr(),
                &mut unit as *mut libc::c_int as *mut c_void,
                &mut size,
                ptr::null(),
                0,
            )
        };
        Errno::result(res).map_err(|e| MixerError::device("sysctl hw.snd.default_unit", e))?;
        u32::try_from(unit).map_err(|_| {
            MixerError::InvalidArgument(format!("kernel reported a negative default unit: {unit}"))
        })
    }

    pub fn set_default_unit(unit: u32) -> Result<(), MixerError> {
        let value = libc::c_int::try_from(unit)
            .map_err(|_| MixerError::InvalidArgument(format!("unit number too large: {unit}")))?;
        // SAFETY: `value` is a valid int-sized input buffer; no output is requested.
        let res = unsafe {
            libc::sysctlbyname(
                DEFAULT_UNIT.as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
                &value as *const libc::c_int as *const c_void,
                mem::size_of::<libc::c_int>(),
            )
        };
        Errno::result(res).map_err(|e| MixerError::device("sysctl hw.snd.default_unit", e))?;
        info!(unit, "changed default audio unit");
        Ok(())
    }
}

#[cfg(not(any(target_os = "freebsd", target_os = "dragonfly")))]
mod imp {
    use std::io;

    use crate::audio::device::MixerError;

    pub fn default_unit() -> Result<u32, MixerError> {
        Ok(0)
    }

    pub fn set_default_unit(_unit: u32) -> Result<(), MixerError> {
        Err(MixerError::device(
            "sysctl hw.snd.default_unit",
            io::Error::from(io::ErrorKind::Unsupported),
        ))
    }
}

/// Current system default unit.
pub fn default_unit() -> Result<u32, MixerError> {
    imp::default_unit()
}

/// Make `unit` the system default.
pub fn set_default_unit(unit: u32) -> Result<(), MixerError> {
    imp::set_default_unit(unit)
}
