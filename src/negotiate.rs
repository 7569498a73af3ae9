//! Pipeline negotiation
//!
//! Walks the filtered candidate list in order, handing each composed
//! descriptor to the capture host until one records. The cursor never
//! moves backwards: a candidate that failed once is not retried for
//! the lifetime of the session, and a later request resumes at the
//! candidate that last worked.

use std::path::{Path, PathBuf};

use crate::catalog::CandidateConfig;
use crate::compose::compose;
use crate::error::NegotiationError;
use crate::host::{CaptureHost, CaptureOptions};

/// One capture request: geometry, tuning and output location.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Width of the capture area in pixels
    pub width: u32,
    /// Height of the capture area in pixels
    pub height: u32,
    /// Downsize ratio in (0, 1]; 1.0 keeps the native size
    pub downsize_ratio: f64,
    /// Pre-composed audio source descriptor, if audio is recorded
    pub audio_source: Option<String>,
    /// Output path without extension
    pub output_stem: PathBuf,
    /// Frames per second
    pub framerate: u32,
    /// Whether the cursor is drawn into the recording
    pub draw_cursor: bool,
}

/// A finished capture, after path fixup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Whether the host reported the recording as started
    pub success: bool,
    /// Final path of the recording
    pub path: PathBuf,
    /// Id of the candidate that produced it
    pub config_id: String,
}

/// Session-scoped negotiation state machine.
///
/// One instance owns one session; concurrent recordings need
/// separate instances with independent state.
pub struct Negotiator<H: CaptureHost> {
    configs: Vec<CandidateConfig>,
    cursor: usize,
    host: H,
}

impl<H: CaptureHost> Negotiator<H> {
    /// Create a session over an already-filtered candidate list.
    pub fn new(configs: Vec<CandidateConfig>, host: H) -> Self {
        Self {
            configs,
            cursor: 0,
            host,
        }
    }

    /// Index of the next candidate to try.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Try to record, advancing through candidates on failure.
    ///
    /// Returns the first capture the host accepts, or
    /// [`NegotiationError::Exhausted`] once every candidate has
    /// failed. At most one capture call is in flight at a time; the
    /// session suspends inside the host call.
    pub async fn attempt(&mut self, request: &CaptureRequest) -> Result<Capture, NegotiationError> {
        let options = CaptureOptions {
            framerate: request.framerate,
            draw_cursor: request.draw_cursor,
        };

        while self.cursor < self.configs.len() {
            let config = &self.configs[self.cursor];
            let pipeline = compose(
                config,
                request.width,
                request.height,
                request.downsize_ratio,
                request.audio_source.as_deref(),
            );

            match self
                .host
                .capture(&pipeline, &request.output_stem, &options)
                .await
            {
                Ok(reply) => {
                    let path = if reply.success {
                        fix_extension(&reply.path, &config.container_ext)
                    } else {
                        reply.path
                    };
                    return Ok(Capture {
                        success: reply.success,
                        path,
                        config_id: config.id.clone(),
                    });
                }
                Err(err) => {
                    log::warn!("Tried configuration [{}] {}", self.cursor, config.id);
                    log::warn!("- video prep: {}", effective_prep(config, request.downsize_ratio));
                    log::warn!("- video: {}", config.video_encode);
                    log::warn!("- audio: {}", config.audio_encode);
                    log::warn!("- muxer: {}", config.muxer);
                    log::warn!("- error: {err}");
                    self.cursor += 1;
                }
            }
        }

        Err(NegotiationError::Exhausted {
            tried: self.configs.len(),
        })
    }
}

/// Prep segment the composer picks for this ratio.
fn effective_prep(config: &CandidateConfig, downsize_ratio: f64) -> &str {
    if downsize_ratio != 1.0 {
        config
            .video_prep_downsize
            .as_deref()
            .unwrap_or(&config.video_prep)
    } else {
        &config.video_prep
    }
}

/// Rename a capture so its extension matches the container that was
/// actually used (hosts may leave a `.unknown` placeholder).
///
/// Rename only, no re-encoding. A rename failure keeps the original
/// path; it never voids a successful capture.
pub fn fix_extension(path: &Path, extension: &str) -> PathBuf {
    let fixed = path.with_extension(extension);
    if fixed == path {
        return fixed;
    }

    log::info!("Fixing capture path: {} -> {}", path.display(), fixed.display());
    if let Err(err) = std::fs::rename(path, &fixed) {
        log::warn!("Failed to rename {}: {err}", path.display());
        return path.to_path_buf();
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::CaptureError;
    use crate::host::CaptureReply;

    /// Host scripted with one outcome per expected capture call.
    struct ScriptedHost {
        outcomes: Mutex<VecDeque<Result<CaptureReply, CaptureError>>>,
        pipelines: Mutex<Vec<String>>,
    }

    impl ScriptedHost {
        fn new(outcomes: Vec<Result<CaptureReply, CaptureError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                pipelines: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CaptureHost for ScriptedHost {
        async fn capture(
            &self,
            pipeline: &str,
            _output_stem: &Path,
            _options: &CaptureOptions,
        ) -> Result<CaptureReply, CaptureError> {
            self.pipelines.lock().unwrap().push(pipeline.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("capture host called more times than scripted")
        }
    }

    fn rejected() -> Result<CaptureReply, CaptureError> {
        Err(CaptureError::Rejected("pipeline failed to start".to_string()))
    }

    fn started(path: &Path) -> Result<CaptureReply, CaptureError> {
        Ok(CaptureReply {
            success: true,
            path: path.to_path_buf(),
        })
    }

    fn config(id: &str, video_encode: &str, container_ext: &str) -> CandidateConfig {
        CandidateConfig {
            id: id.to_string(),
            video_prep: "videoconvert ! queue".to_string(),
            video_prep_downsize: None,
            video_encode: video_encode.to_string(),
            audio_encode: "avenc_aac ! queue".to_string(),
            muxer: if container_ext == "webm" {
                "webmmux".to_string()
            } else {
                "mp4mux".to_string()
            },
            container_ext: container_ext.to_string(),
        }
    }

    fn request(stem: &Path) -> CaptureRequest {
        CaptureRequest {
            width: 1920,
            height: 1080,
            downsize_ratio: 1.0,
            audio_source: None,
            output_stem: stem.to_path_buf(),
            framerate: 30,
            draw_cursor: true,
        }
    }

    #[tokio::test]
    async fn test_first_candidate_success_keeps_cursor() {
        // Scenario A: Cfg-B succeeds immediately on a filtered list.
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("cast.unknown");
        std::fs::write(&raw, b"video").unwrap();

        let host = ScriptedHost::new(vec![started(&raw)]);
        let mut negotiator = Negotiator::new(
            vec![
                config("cfg-b", "vp8enc ! queue", "webm"),
                config("cfg-c", "x264enc ! queue", "mp4"),
            ],
            host,
        );

        let capture = negotiator.attempt(&request(dir.path())).await.unwrap();
        assert!(capture.success);
        assert_eq!(capture.config_id, "cfg-b");
        assert_eq!(capture.path, dir.path().join("cast.webm"));
        assert!(capture.path.exists());
        assert_eq!(negotiator.cursor(), 0);
    }

    #[tokio::test]
    async fn test_retry_advances_to_next_candidate() {
        // Scenario B: Cfg-B rejects, Cfg-C records.
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("cast.unknown");
        std::fs::write(&raw, b"video").unwrap();

        let host = ScriptedHost::new(vec![rejected(), started(&raw)]);
        let mut negotiator = Negotiator::new(
            vec![
                config("cfg-b", "vp8enc ! queue", "webm"),
                config("cfg-c", "x264enc ! queue", "mp4"),
            ],
            host,
        );

        let capture = negotiator.attempt(&request(dir.path())).await.unwrap();
        assert_eq!(capture.config_id, "cfg-c");
        assert_eq!(capture.path, dir.path().join("cast.mp4"));
        assert_eq!(negotiator.cursor(), 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_exhausted_without_host_calls() {
        // Scenario C: nothing to try. The scripted host panics if it
        // is called at all.
        let host = ScriptedHost::new(vec![]);
        let mut negotiator = Negotiator::new(vec![], host);

        let err = negotiator
            .attempt(&request(Path::new("/tmp/cast")))
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::Exhausted { tried: 0 }));
    }

    #[tokio::test]
    async fn test_all_failures_exhaust_and_stop_calling() {
        let host = ScriptedHost::new(vec![rejected(), rejected()]);
        let mut negotiator = Negotiator::new(
            vec![
                config("cfg-b", "vp8enc ! queue", "webm"),
                config("cfg-c", "x264enc ! queue", "mp4"),
            ],
            host,
        );

        let request = request(Path::new("/tmp/cast"));
        let err = negotiator.attempt(&request).await.unwrap_err();
        assert!(matches!(err, NegotiationError::Exhausted { tried: 2 }));
        assert_eq!(negotiator.cursor(), 2);

        // Exhausted sessions stay exhausted; no further host calls
        // (the scripted host would panic).
        let err = negotiator.attempt(&request).await.unwrap_err();
        assert!(matches!(err, NegotiationError::Exhausted { tried: 2 }));
    }

    #[tokio::test]
    async fn test_next_request_resumes_at_last_good_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.unknown");
        let second = dir.path().join("two.unknown");
        std::fs::write(&first, b"video").unwrap();
        std::fs::write(&second, b"video").unwrap();

        let host = ScriptedHost::new(vec![rejected(), started(&first), started(&second)]);
        let mut negotiator = Negotiator::new(
            vec![
                config("cfg-b", "vp8enc ! queue", "webm"),
                config("cfg-c", "x264enc ! queue", "mp4"),
            ],
            host,
        );

        let capture = negotiator.attempt(&request(dir.path())).await.unwrap();
        assert_eq!(capture.config_id, "cfg-c");
        assert_eq!(negotiator.cursor(), 1);

        // Second request starts straight at cfg-c, skipping cfg-b.
        let capture = negotiator.attempt(&request(dir.path())).await.unwrap();
        assert_eq!(capture.config_id, "cfg-c");
        assert_eq!(negotiator.cursor(), 1);

        let pipelines = negotiator.host.pipelines.lock().unwrap();
        assert_eq!(pipelines.len(), 3);
        assert!(pipelines[2].contains("x264enc"));
    }

    #[tokio::test]
    async fn test_host_reported_failure_returns_unfixed_path() {
        // success=false is a host answer, not a rejection: no retry,
        // no rename.
        let host = ScriptedHost::new(vec![Ok(CaptureReply {
            success: false,
            path: PathBuf::from("/tmp/cast.unknown"),
        })]);
        let mut negotiator = Negotiator::new(vec![config("cfg-b", "vp8enc ! queue", "webm")], host);

        let capture = negotiator
            .attempt(&request(Path::new("/tmp/cast")))
            .await
            .unwrap();
        assert!(!capture.success);
        assert_eq!(capture.path, PathBuf::from("/tmp/cast.unknown"));
        assert_eq!(negotiator.cursor(), 0);
    }

    #[test]
    fn test_fix_extension_renames_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("cast.unknown");
        std::fs::write(&raw, b"video").unwrap();

        let fixed = fix_extension(&raw, "mp4");
        assert_eq!(fixed, dir.path().join("cast.mp4"));
        assert!(fixed.exists());
        assert!(!raw.exists());
    }

    #[test]
    fn test_fix_extension_appends_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("cast");
        std::fs::write(&raw, b"video").unwrap();

        let fixed = fix_extension(&raw, "webm");
        assert_eq!(fixed, dir.path().join("cast.webm"));
        assert!(fixed.exists());
    }

    #[test]
    fn test_fix_extension_keeps_path_on_rename_failure() {
        let missing = Path::new("/nonexistent/cast.unknown");
        assert_eq!(fix_extension(missing, "mp4"), missing);
    }

    #[test]
    fn test_fix_extension_is_a_no_op_when_already_correct() {
        let path = Path::new("/tmp/cast.mp4");
        assert_eq!(fix_extension(path, "mp4"), path);
    }
}
