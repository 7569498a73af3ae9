//! Pipeline descriptor composition
//!
//! Builds the `gst-launch` style descriptor handed to the capture
//! host. The host prepends its video source to the first segment and
//! appends the file sink to the last one; audio, when present, joins
//! the video branch at a shared named muxer.

use crate::catalog::CandidateConfig;

/// Label joining the video and audio branches at the muxer.
const MUX_NAME: &str = "mux";

/// Compose the full descriptor for one candidate.
///
/// Deterministic: identical inputs always produce the identical
/// string. A `downsize_ratio` of exactly 1.0 keeps the native size
/// and omits the dimension caps; anything else scales both dimensions
/// down (floored) and prefers the candidate's downsize prep segment
/// when it has one.
pub fn compose(
    config: &CandidateConfig,
    width: u32,
    height: u32,
    downsize_ratio: f64,
    audio_source: Option<&str>,
) -> String {
    let video = &config.video_encode;
    let muxer = &config.muxer;

    let video_branch = if downsize_ratio != 1.0 {
        let prep = config
            .video_prep_downsize
            .as_deref()
            .unwrap_or(&config.video_prep);
        let downsize_width = (f64::from(width) * downsize_ratio).floor() as u32;
        let downsize_height = (f64::from(height) * downsize_ratio).floor() as u32;
        let caps = format!("video/x-raw(ANY),width={downsize_width},height={downsize_height}");

        format!("{prep} ! {caps} ! {video} ! {muxer} name={MUX_NAME}")
    } else {
        let prep = &config.video_prep;

        format!("{prep} ! {video} ! {muxer} name={MUX_NAME}")
    };

    match audio_source {
        None => video_branch,
        Some(audio_source) => {
            // Three space-separated segments: the host prepends the
            // video source to the first and appends the file sink to
            // the trailing mux reference.
            let audio = &config.audio_encode;
            let audio_branch = format!("{audio_source} ! {audio} ! {MUX_NAME}.");

            format!("{video_branch} {audio_branch} {MUX_NAME}.")
        }
    }
}
