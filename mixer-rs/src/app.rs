//! Command handling for the `mixer` program.
//!
//! Parses `dev[.ctrl[=value]]` commands, applies them to an open session and
//! drives a whole invocation (default unit change, commands, final report).

use std::io::Write;
use std::str::FromStr;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audio::{
    MixerEnumerator, MixerError, MixerSession, MuteAction, RecSrcAction, SoundSystem,
};
use crate::ui::report;

/// A per-channel control addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Volume,
    Mute,
    RecSrc,
}

impl Control {
    pub fn name(self) -> &'static str {
        match self {
            Control::Volume => "volume",
            Control::Mute => "mute",
            Control::RecSrc => "recsrc",
        }
    }
}

impl FromStr for Control {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "volume" => Ok(Control::Volume),
            "mute" => Ok(Control::Mute),
            "recsrc" | "rec" => Ok(Control::RecSrc),
            _ => Err(CommandError::UnknownControl(s.to_string())),
        }
    }
}

/// One side of a volume assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    Absolute(f32),
    /// Offset from the current level (`+0.1`, `-0.25`)
    Relative(f32),
}

impl Level {
    /// Target level given the current one, clamped to 0.0-1.0.
    pub fn resolve(self, current: f32) -> f32 {
        let level = match self {
            Level::Absolute(v) => v,
            Level::Relative(delta) => current + delta,
        };
        level.clamp(0.0, 1.0)
    }
}

impl FromStr for Level {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CommandError::InvalidValue {
            control: Control::Volume.name(),
            value: s.to_string(),
        };
        let value: f32 = s.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        if s.starts_with(['+', '-']) {
            Ok(Level::Relative(value))
        } else {
            Ok(Level::Absolute(value))
        }
    }
}

/// What a command asks of its channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    /// `dev`: print the channel
    Show,
    /// `dev.ctrl`: print one control
    Get(Control),
    SetVolume { left: Level, right: Level },
    SetMute(MuteAction),
    SetRecSrc(RecSrcAction),
}

/// A parsed `dev[.ctrl[=value]]` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub channel: String,
    pub request: Request,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid syntax: {0}")]
    Syntax(String),

    #[error("invalid control: {0}")]
    UnknownControl(String),

    #[error("invalid {control} value: {value}")]
    InvalidValue { control: &'static str, value: String },

    #[error(transparent)]
    Mixer(#[from] MixerError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, rest) = match s.split_once('.') {
            Some((channel, rest)) => (channel, Some(rest)),
            None => (s, None),
        };
        if channel.is_empty() || channel.contains('=') {
            return Err(CommandError::Syntax(s.to_string()));
        }

        let request = match rest {
            None => Request::Show,
            Some(rest) => match rest.split_once('=') {
                None => Request::Get(rest.parse()?),
                Some((control, value)) => parse_assignment(control.parse()?, value)?,
            },
        };

        Ok(Command {
            channel: channel.to_string(),
            request,
        })
    }
}

fn parse_assignment(control: Control, value: &str) -> Result<Request, CommandError> {
    let invalid = || CommandError::InvalidValue {
        control: control.name(),
        value: value.to_string(),
    };
    let request = match control {
        Control::Volume => {
            let (left, right) = match value.split_once(':') {
                Some((left, right)) => (left.parse()?, right.parse()?),
                None => {
                    let level: Level = value.parse()?;
                    (level, level)
                }
            };
            Request::SetVolume { left, right }
        }
        Control::Mute => Request::SetMute(match value {
            "0" => MuteAction::Unmute,
            "1" => MuteAction::Mute,
            "^" => MuteAction::Toggle,
            _ => return Err(invalid()),
        }),
        Control::RecSrc => Request::SetRecSrc(match value {
            "+" => RecSrcAction::Add,
            "-" => RecSrcAction::Remove,
            "=" => RecSrcAction::Set,
            "^" => RecSrcAction::Toggle,
            _ => return Err(invalid()),
        }),
    };
    Ok(request)
}

impl Command {
    /// Select the command's channel and carry out the request, returning the
    /// line to print.
    pub fn apply<S: SoundSystem>(
        &self,
        session: &mut MixerSession<S>,
    ) -> Result<String, CommandError> {
        let channel = session.select_by_name(&self.channel)?;
        let name = channel.name;

        let line = match self.request {
            Request::Show => report::channel_line(channel),
            Request::Get(control) => report::control_line(channel, control),
            Request::SetVolume { left, right } => {
                let old = channel.volume;
                let new = session.set_volume(left.resolve(old.left), right.resolve(old.right))?;
                report::volume_change(name, old, new)
            }
            Request::SetMute(action) => {
                let old = channel.is_muted;
                let new = session.set_mute(action)?;
                report::flag_change(name, Control::Mute, old, new)
            }
            Request::SetRecSrc(action) => {
                let old = channel.is_recsrc;
                let new = session.modify_recording_source(action)?;
                report::flag_change(name, Control::RecSrc, old, new)
            }
        };
        Ok(line)
    }
}

/// Options for one `mixer` invocation.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Device node; `None` means the default unit
    pub device: Option<String>,

    /// New system default unit
    pub default_unit: Option<u32>,

    /// Print `dev.ctrl=value` lines
    pub terse: bool,

    /// Print recording sources only
    pub recsrc_only: bool,

    /// Report every mixer in the system
    pub all: bool,

    pub commands: Vec<String>,
}

/// Run one invocation against `system`, writing the report to `out`.
///
/// Failing to open the mixer is fatal. Failures of individual commands and
/// of the default unit change are logged and skipped.
pub fn run<S, W>(system: S, settings: &Settings, out: &mut W) -> Result<()>
where
    S: SoundSystem + Clone,
    W: Write,
{
    if settings.all {
        return run_all(system, settings, out);
    }

    let device = settings.device.as_deref();
    let mut session = MixerSession::open_with(system, device)
        .with_context(|| format!("cannot open {}", device.unwrap_or("default mixer")))?;

    if let Some(unit) = settings.default_unit {
        match change_default_unit(&mut session, unit) {
            Ok(line) => writeln!(out, "{line}")?,
            Err(err) => warn!(unit, error = %err, "cannot set default unit"),
        }
    }

    if settings.recsrc_only {
        if let Some(text) = report::recsrc_report(&session.snapshot(), settings.terse) {
            write!(out, "{text}")?;
        }
        return session.close().context("cannot close mixer");
    }

    for arg in &settings.commands {
        debug!(command = %arg, "applying");
        match arg.parse::<Command>().and_then(|cmd| cmd.apply(&mut session)) {
            Ok(line) => writeln!(out, "{line}")?,
            Err(err) => warn!(command = %arg, "{err}"),
        }
    }

    write!(out, "{}", report::mixer_report(&session.snapshot(), settings.terse))?;
    session.close().context("cannot close mixer")
}

fn change_default_unit<S: SoundSystem>(
    session: &mut MixerSession<S>,
    unit: u32,
) -> Result<String, MixerError> {
    let old = session.default_unit()?;
    session.set_default_unit(unit)?;
    Ok(report::default_unit_change(old, unit))
}

fn run_all<S, W>(system: S, settings: &Settings, out: &mut W) -> Result<()>
where
    S: SoundSystem + Clone,
    W: Write,
{
    let enumerator = MixerEnumerator::with_system(system);

    if let Some(unit) = settings.default_unit {
        let changed = enumerator
            .default_unit()
            .and_then(|old| enumerator.set_default_unit(unit).map(|()| old));
        match changed {
            Ok(old) => writeln!(out, "{}", report::default_unit_change(old, unit))?,
            Err(err) => warn!(unit, error = %err, "cannot set default unit"),
        }
    }

    let mixers = enumerator.get_mixers().context("cannot enumerate mixers")?;
    for mixer in &mixers {
        if settings.recsrc_only {
            if let Some(text) = report::recsrc_report(mixer, settings.terse) {
                write!(out, "{text}")?;
            }
        } else {
            write!(out, "{}", report::mixer_report(mixer, settings.terse))?;
            if settings.terse {
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::{FakeSystem, FakeWrite};
    use approx::assert_relative_eq;

    fn mixer() -> FakeSystem {
        FakeSystem::with_channels(&[(0, 50, 50), (4, 75, 75), (7, 30, 30)], 1 << 7)
    }

    fn run_to_string(system: FakeSystem, settings: &Settings) -> String {
        let mut out = Vec::new();
        run(system, settings, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn parse(s: &str) -> Command {
        s.parse().unwrap()
    }

    #[test]
    fn parses_command_shapes() {
        assert_eq!(parse("vol").request, Request::Show);
        assert_eq!(parse("vol.volume").request, Request::Get(Control::Volume));
        assert_eq!(parse("mic.rec").request, Request::Get(Control::RecSrc));
        assert_eq!(
            parse("pcm.volume=0.5").request,
            Request::SetVolume {
                left: Level::Absolute(0.5),
                right: Level::Absolute(0.5)
            }
        );
        assert_eq!(
            parse("pcm.volume=+0.1:0.3").request,
            Request::SetVolume {
                left: Level::Relative(0.1),
                right: Level::Absolute(0.3)
            }
        );
        assert_eq!(parse("vol.mute=^").request, Request::SetMute(MuteAction::Toggle));
        assert_eq!(
            parse("mic.recsrc==").request,
            Request::SetRecSrc(RecSrcAction::Set)
        );
        assert_eq!(parse("mic.rec=-").channel, "mic");
    }

    #[test]
    fn rejects_bad_commands() {
        for bad in ["", ".volume", "vol=1", "vol.bogus", "vol.volume=", "vol.volume=loud",
            "vol.volume=inf", "vol.volume=0.5:", "vol.mute=2", "mic.recsrc=*"]
        {
            assert!(bad.parse::<Command>().is_err(), "{bad}");
        }
    }

    #[test]
    fn relative_levels_clamp() {
        assert_relative_eq!(Level::Relative(0.3).resolve(0.9), 1.0);
        assert_relative_eq!(Level::Relative(-0.5).resolve(0.2), 0.0);
        assert_relative_eq!(Level::Relative(-0.25).resolve(0.75), 0.5);
        assert_relative_eq!(Level::Absolute(1.5).resolve(0.1), 1.0);
    }

    #[test]
    fn applies_volume_and_reports_change() {
        let system = mixer();
        let mut session = MixerSession::open_with(system.clone(), None).unwrap();

        let line = parse("pcm.volume=-0.25:+0.1").apply(&mut session).unwrap();
        assert_eq!(line, "pcm.volume: 0.75:0.75 -> 0.50:0.85");
        assert_eq!(
            system.writes(),
            [FakeWrite::Volume { index: 4, value: 50 | 85 << 8 }]
        );
    }

    #[test]
    fn applies_mute_and_recsrc() {
        let system = mixer();
        let mut session = MixerSession::open_with(system.clone(), None).unwrap();

        assert_eq!(
            parse("vol.mute=1").apply(&mut session).unwrap(),
            "vol.mute: 0 -> 1"
        );
        assert_eq!(
            parse("mic.rec=+").apply(&mut session).unwrap(),
            "mic.recsrc: 0 -> 1"
        );
        assert_eq!(
            parse("mic.recsrc").apply(&mut session).unwrap(),
            "mic.recsrc=+"
        );
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let mut session = MixerSession::open_with(mixer(), None).unwrap();
        let err = parse("bass.volume=1").apply(&mut session).unwrap_err();
        assert!(matches!(err, CommandError::Mixer(MixerError::ChannelNotFound(_))));
    }

    #[test]
    fn run_applies_commands_then_prints_the_mixer() {
        let settings = Settings {
            terse: true,
            commands: vec![
                "vol.volume=0.8".to_string(),
                "nope.volume=1".to_string(),
                "pcm.mute=1".to_string(),
            ],
            ..Settings::default()
        };
        let out = run_to_string(mixer(), &settings);
        assert_eq!(
            out,
            "vol.volume: 0.50:0.50 -> 0.80:0.80\n\
             pcm.mute: 0 -> 1\n\
             vol.volume=0.80:0.80\n\
             vol.mute=0\n\
             pcm.volume=0.75:0.75\n\
             pcm.mute=1\n\
             mic.volume=0.30:0.30\n\
             mic.mute=0\n"
        );
    }

    #[test]
    fn run_sets_default_unit() {
        let system = mixer();
        let settings = Settings {
            device: Some("/dev/mixer1".to_string()),
            default_unit: Some(1),
            recsrc_only: true,
            terse: true,
            ..Settings::default()
        };
        let out = run_to_string(system.clone(), &settings);
        assert_eq!(out, "default_unit: 0 -> 1\n\n");
        assert_eq!(system.state().default_unit, 1);
    }

    #[test]
    fn run_fails_when_the_mixer_cannot_be_opened() {
        let settings = Settings {
            device: Some("/dev/mixer7".to_string()),
            ..Settings::default()
        };
        let mut out = Vec::new();
        let err = run(mixer(), &settings, &mut out).unwrap_err();
        assert!(err.to_string().contains("/dev/mixer7"));
        assert!(out.is_empty());
    }

    #[test]
    fn run_all_reports_every_mixer() {
        let system = mixer();
        system.state().mixer_count = 2;
        system.state().recsrc = 1 << 7;
        let settings = Settings {
            all: true,
            recsrc_only: true,
            ..Settings::default()
        };
        let out = run_to_string(system, &settings);
        let expected = "pcm0:mixer: <Fake HDA codec> at nid 0";
        assert_eq!(
            out,
            format!(
                "{expected} (default)\n    recording source(s): mic\n\
                 {expected}\n    recording source(s): mic\n"
            )
        );
    }
}
