//! UI module for the `mixer` command's text output.
//!
//! This module renders mixer state, channel lines and change reports in the
//! default and terse layouts.

pub mod report;

pub use report::{mixer_report, recsrc_report};
