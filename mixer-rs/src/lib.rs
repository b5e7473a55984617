//! OSS Mixer Tools - Library
//!
//! Control of OSS audio mixers (`/dev/mixerN`) on FreeBSD-style systems.
//!
//! ## Features
//!
//! - Open a mixer by device node or the system default unit
//! - Read and set per-channel volume, balance and mute state
//! - Select recording sources
//! - Query and change the system default unit
//! - Enumerate every mixer in the system

pub mod app;
pub mod audio;
pub mod platform;
pub mod ui;

pub use app::{Command, Control, Request};
pub use audio::{
    enumerate_mixers, Channel, ErrorKind, Mixer, MixerEnumerator, MixerError, MixerSession,
    MixerSnapshot, MuteAction, RecSrcAction, Volume,
};
pub use platform::{OssDevice, OssSystem};
