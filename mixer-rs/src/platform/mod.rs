//! Platform-specific module for the OSS kernel interface.
//!
//! This module contains the ioctl bindings for mixer device nodes and
//! access to the system default unit.

pub mod oss;
pub mod sysctl;

pub use oss::{OssDevice, OssSystem};
