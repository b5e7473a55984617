//! mixer - set or display OSS sound mixer values
//!
//! Usage:
//! - `mixer [-f device] [-d unit] [-o] [-s] [command ...]`
//! - `mixer [-d unit] [-o] [-s] -a`
//!
//! Commands are `dev` (show a channel), `dev.ctrl` (show one control) and
//! `dev.ctrl=value` where ctrl is `volume`, `mute` or `recsrc` (`rec`).

use std::io::{self, BufWriter, Write};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mixer_rs::app::{self, Settings};
use mixer_rs::OssSystem;

#[derive(Parser)]
#[command(name = "mixer")]
#[command(about = "Set or display sound mixer values")]
#[command(version)]
struct Cli {
    /// Mixer device node (default: the system default unit)
    #[arg(short = 'f', value_name = "DEVICE", env = "MIXER_DEVICE")]
    device: Option<String>,

    /// Change the system default audio unit
    #[arg(short = 'd', value_name = "UNIT")]
    default_unit: Option<u32>,

    /// Print values in a format suitable for use as commands
    #[arg(short = 'o')]
    terse: bool,

    /// Only print recording sources
    #[arg(short = 's')]
    recsrc_only: bool,

    /// Print every mixer in the system (ignores -f)
    #[arg(short = 'a', conflicts_with = "commands")]
    all: bool,

    /// dev[.ctrl[=value]] commands, applied in order
    commands: Vec<String>,
}

impl From<Cli> for Settings {
    fn from(cli: Cli) -> Self {
        Settings {
            device: if cli.all { None } else { cli.device },
            default_unit: cli.default_unit,
            terse: cli.terse,
            recsrc_only: cli.recsrc_only,
            all: cli.all,
            commands: cli.commands,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let settings = Settings::from(Cli::parse());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    app::run(OssSystem, &settings, &mut out)?;
    out.flush()?;
    Ok(())
}
