//! Audio source descriptors
//!
//! Builds the source half of the audio branch; the composer splices
//! it in front of the candidate's audio encode segment. Device
//! selection goes through the PulseAudio default aliases since mixer
//! enumeration lives outside this crate.

use serde::{Deserialize, Serialize};

/// Which audio ends up in the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    /// No audio branch at all
    #[default]
    None,
    /// Monitor of the default output (what the speakers play)
    Desktop,
    /// Default input device
    Mic,
    /// Desktop and mic mixed into one track
    Both,
}

/// Mixer latency for the dual-source path, in nanoseconds.
const MIXER_LATENCY_NS: u64 = 100_000_000;

fn pulse_source(device: &str, channels: u32) -> String {
    // Channels must be pinned so the right channel map is applied.
    format!(
        "pulsesrc device={device} provide-clock=false \
         ! capsfilter caps=audio/x-raw,channels={channels}"
    )
}

/// Pre-composed audio-source descriptor for the selected mode, or
/// `None` for silent recordings.
pub fn audio_input(mode: AudioMode, channels: u32) -> Option<String> {
    match mode {
        AudioMode::None => None,
        AudioMode::Desktop => Some(pulse_source("@DEFAULT_MONITOR@", channels)),
        AudioMode::Mic => Some(pulse_source("@DEFAULT_SOURCE@", channels)),
        AudioMode::Both => {
            let desktop = pulse_source("@DEFAULT_MONITOR@", channels);
            let mic = pulse_source("@DEFAULT_SOURCE@", channels);

            // Both sources feed one mixer; the mixer output is what
            // the encode segment gets linked to.
            Some(format!(
                "{desktop} ! audiomixer name=am latency={MIXER_LATENCY_NS} \
                 {mic} ! am. \
                 am. ! capsfilter caps=audio/x-raw,channels={channels}"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_has_no_descriptor() {
        assert_eq!(audio_input(AudioMode::None, 2), None);
    }

    #[test]
    fn test_desktop_uses_default_monitor() {
        let descriptor = audio_input(AudioMode::Desktop, 2).unwrap();
        assert_eq!(
            descriptor,
            "pulsesrc device=@DEFAULT_MONITOR@ provide-clock=false \
             ! capsfilter caps=audio/x-raw,channels=2"
        );
    }

    #[test]
    fn test_mic_uses_default_source() {
        let descriptor = audio_input(AudioMode::Mic, 1).unwrap();
        assert!(descriptor.starts_with("pulsesrc device=@DEFAULT_SOURCE@"));
        assert!(descriptor.ends_with("channels=1"));
    }

    #[test]
    fn test_both_mixes_through_one_mixer() {
        let descriptor = audio_input(AudioMode::Both, 2).unwrap();
        assert_eq!(descriptor.matches("pulsesrc").count(), 2);
        assert!(descriptor.contains("audiomixer name=am latency=100000000"));
        // Mic branch and mixer output both reference the mixer pad.
        assert_eq!(descriptor.matches("am.").count(), 2);
        assert!(descriptor.ends_with("capsfilter caps=audio/x-raw,channels=2"));
    }
}
