//! Text rendering of mixer state for the `mixer` command.
//!
//! Two layouts: the default human-readable one and a terse one (`-o`) that
//! prints `dev.ctrl=value` lines which can be fed back as commands.

use crate::app::Control;
use crate::audio::{Channel, MixerSnapshot, Volume};

/// `pcm0:mixer: <card> hw_info (default)`
pub fn mixer_header(mixer: &MixerSnapshot) -> String {
    let id = &mixer.identity;
    let mut out = format!("{}: <{}> {}", id.mixer_name, id.card_long_name, id.card_hw_info);
    if mixer.is_default_unit {
        out.push_str(" (default)");
    }
    out
}

/// One channel in the default layout: name, levels, pan and flags.
pub fn channel_line(channel: &Channel) -> String {
    let mut out = format!(
        "    {:<11}= {}\t{:+.2}\t",
        channel.name,
        levels(channel.volume),
        channel.pan()
    );
    for (set, flag) in [
        (channel.is_playback, " pbk"),
        (channel.is_recording, " rec"),
        (channel.is_recsrc, " src"),
        (channel.is_muted, " mute"),
    ] {
        if set {
            out.push_str(flag);
        }
    }
    out
}

/// `dev.ctrl=value` for one control.
pub fn control_line(channel: &Channel, control: Control) -> String {
    let value = match control {
        Control::Volume => levels(channel.volume),
        Control::Mute => u8::from(channel.is_muted).to_string(),
        Control::RecSrc => (if channel.is_recsrc { "+" } else { "-" }).to_string(),
    };
    format!("{}.{}={}", channel.name, control.name(), value)
}

/// Terse lines for one channel. The recording-source line only appears for
/// active sources.
pub fn channel_terse(channel: &Channel) -> Vec<String> {
    let mut lines = vec![
        control_line(channel, Control::Volume),
        control_line(channel, Control::Mute),
    ];
    if channel.is_recsrc {
        lines.push(control_line(channel, Control::RecSrc));
    }
    lines
}

/// Whole mixer: header and one line per channel, or terse lines only.
pub fn mixer_report(mixer: &MixerSnapshot, terse: bool) -> String {
    let mut out = String::new();
    if !terse {
        out.push_str(&mixer_header(mixer));
        out.push('\n');
    }
    for channel in &mixer.channels {
        if terse {
            for line in channel_terse(channel) {
                out.push_str(&line);
                out.push('\n');
            }
        } else {
            out.push_str(&channel_line(channel));
            out.push('\n');
        }
    }
    out
}

/// Active recording sources, or `None` if the mixer cannot record at all.
pub fn recsrc_report(mixer: &MixerSnapshot, terse: bool) -> Option<String> {
    if mixer.masks.recording == 0 {
        return None;
    }
    let names: Vec<&str> = mixer.recording_sources().map(|c| c.name).collect();
    let mut out = String::new();
    if terse {
        out.push_str(&names.join(" "));
    } else {
        out.push_str(&format!(
            "{}\n    recording source(s): {}",
            mixer_header(mixer),
            names.join(", ")
        ));
    }
    out.push('\n');
    Some(out)
}

/// `dev.volume: 0.50:0.50 -> 0.80:0.80`
pub fn volume_change(name: &str, old: Volume, new: Volume) -> String {
    format!(
        "{}.{}: {} -> {}",
        name,
        Control::Volume.name(),
        levels(old),
        levels(new)
    )
}

/// `dev.mute: 0 -> 1`
pub fn flag_change(name: &str, control: Control, old: bool, new: bool) -> String {
    format!(
        "{}.{}: {} -> {}",
        name,
        control.name(),
        u8::from(old),
        u8::from(new)
    )
}

pub fn default_unit_change(old: u32, new: u32) -> String {
    format!("default_unit: {old} -> {new}")
}

fn levels(volume: Volume) -> String {
    format!("{:.2}:{:.2}", volume.left, volume.right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CapabilityMasks, MixerIdentity};

    fn snapshot(is_default_unit: bool) -> MixerSnapshot {
        let masks = CapabilityMasks {
            devices: 1 | 1 << 4,
            recording: 1 << 7,
            recsrc: 1 << 7,
            muted: 1 << 4,
        };
        let channels = vec![
            Channel::new(0, "vol", Volume::new(0.75, 0.75).unwrap(), &masks),
            Channel::new(4, "pcm", Volume::new(0.5, 0.6).unwrap(), &masks),
            Channel::new(7, "mic", Volume::new(0.3, 0.3).unwrap(), &masks),
        ];
        MixerSnapshot {
            unit: 0,
            path: "/dev/mixer0".to_string(),
            identity: MixerIdentity {
                mixer_name: "pcm0:mixer".to_string(),
                card_long_name: "Realtek ALC887".to_string(),
                card_hw_info: "at nid 20".to_string(),
            },
            is_default_unit,
            masks,
            channels,
            selected: Some(0),
        }
    }

    #[test]
    fn header_marks_the_default_unit() {
        assert_eq!(
            mixer_header(&snapshot(true)),
            "pcm0:mixer: <Realtek ALC887> at nid 20 (default)"
        );
        assert_eq!(
            mixer_header(&snapshot(false)),
            "pcm0:mixer: <Realtek ALC887> at nid 20"
        );
    }

    #[test]
    fn channel_lines() {
        let mixer = snapshot(false);
        assert_eq!(
            channel_line(&mixer.channels[0]),
            "    vol        = 0.75:0.75\t+0.00\t pbk"
        );
        assert_eq!(
            channel_line(&mixer.channels[1]),
            "    pcm        = 0.50:0.60\t+0.10\t pbk mute"
        );
        assert_eq!(
            channel_line(&mixer.channels[2]),
            "    mic        = 0.30:0.30\t+0.00\t rec src"
        );
    }

    #[test]
    fn terse_report_can_be_replayed() {
        let report = mixer_report(&snapshot(true), true);
        assert_eq!(
            report,
            "vol.volume=0.75:0.75\n\
             vol.mute=0\n\
             pcm.volume=0.50:0.60\n\
             pcm.mute=1\n\
             mic.volume=0.30:0.30\n\
             mic.mute=0\n\
             mic.recsrc=+\n"
        );
    }

    #[test]
    fn full_report_starts_with_header() {
        let report = mixer_report(&snapshot(false), false);
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("pcm0:mixer: "));
        assert!(lines[3].starts_with("    mic "));
    }

    #[test]
    fn recording_sources() {
        let mut mixer = snapshot(false);
        assert_eq!(
            recsrc_report(&mixer, false).unwrap(),
            "pcm0:mixer: <Realtek ALC887> at nid 20\n    recording source(s): mic\n"
        );
        assert_eq!(recsrc_report(&mixer, true).unwrap(), "mic\n");

        mixer.masks.recording = 0;
        assert_eq!(recsrc_report(&mixer, false), None);
    }

    #[test]
    fn change_lines() {
        let old = Volume::new(0.5, 0.5).unwrap();
        let new = Volume::new(0.8, 0.8).unwrap();
        assert_eq!(
            volume_change("vol", old, new),
            "vol.volume: 0.50:0.50 -> 0.80:0.80"
        );
        assert_eq!(
            flag_change("mic", Control::RecSrc, false, true),
            "mic.recsrc: 0 -> 1"
        );
        assert_eq!(default_unit_change(0, 2), "default_unit: 0 -> 2");
    }
}
