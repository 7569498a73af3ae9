//! Candidate pipeline configurations
//!
//! The catalog is an ordered list of encoding strategies, hardware
//! accelerated entries first. Order is priority: negotiation walks the
//! list front to back and never revisits an entry that failed.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Audio encode segment for Vorbis recordings.
const VORBIS_ENCODE: &str = "vorbisenc ! queue";

/// Audio encode segment for AAC recordings.
const AAC_ENCODE: &str = "avenc_aac ! queue";

const HWENC_DMABUF_PREP: &str = "vapostproc";

const SWENC_DMABUF_PREP: &str = "glupload ! glcolorconvert ! gldownload ! queue";

// glcolorscale needs RGBA input, so convert before and after scaling.
const SWENC_DMABUF_PREP_DOWNSIZE: &str =
    "glupload ! glcolorconvert ! glcolorscale ! glcolorconvert ! gldownload ! queue";

// `%T` is expanded to a thread count by the capture host.
const SWENC_MEMFD_PREP: &str = "videoconvert chroma-mode=none dither=none \
     matrix-mode=output-only n-threads=%T ! videoscale ! queue";

const MP4_MUXER: &str = "mp4mux fragment-duration=500 fragment-mode=first-moov-then-finalise";

const NVENC_H264_ENCODE: &str = "nvh264enc ! queue ! h264parse";

const OPENH264_ENCODE: &str = "openh264enc deblocking=off background-detection=false \
     complexity=low adaptive-quantization=false qp-max=26 qp-min=26 multi-thread=%T \
     slice-mode=auto ! queue ! h264parse";

const VP8_ENCODE: &str = "vp8enc cpu-used=16 max-quantizer=17 deadline=1 \
     keyframe-mode=disabled threads=%T static-threshold=1000 buffer-size=20000 ! queue";

/// One named encoding strategy: prep, encode and mux stages plus the
/// container format they produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateConfig {
    /// Unique name, used in logs and diagnostics
    pub id: String,
    /// Video preparation segment (upload, colorspace conversion)
    pub video_prep: String,
    /// Preparation override used only when downsizing is active
    #[serde(default)]
    pub video_prep_downsize: Option<String>,
    /// Video encode segment
    pub video_encode: String,
    /// Audio encode segment
    pub audio_encode: String,
    /// Muxer segment; the composer attaches the shared `mux` label
    pub muxer: String,
    /// File extension of the produced container
    pub container_ext: String,
}

/// Catalog format version accepted by [`Catalog::load`].
pub const CATALOG_VERSION: u32 = 1;

/// Ordered, versioned list of candidate configurations.
///
/// Loaded explicitly rather than kept as global state, so independent
/// sessions (and tests) can run against independent data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub configs: Vec<CandidateConfig>,
}

impl Catalog {
    /// Built-in candidates, mirroring the encoders GNOME Shell's
    /// screencast service ships pipelines for. Hardware paths first.
    pub fn builtin() -> Self {
        Self {
            version: CATALOG_VERSION,
            configs: vec![
                candidate(
                    "hwenc-cuda-h264-nvenc",
                    "cudaupload ! cudaconvert",
                    Some("cudaupload ! cudaconvertscale"),
                    NVENC_H264_ENCODE,
                    AAC_ENCODE,
                    MP4_MUXER,
                    "mp4",
                ),
                candidate(
                    "hwenc-gl-h264-nvenc",
                    // Prefer cudaupload to the gl pipeline.
                    "cudaupload",
                    Some("glupload ! glcolorconvert ! glcolorscale"),
                    NVENC_H264_ENCODE,
                    AAC_ENCODE,
                    MP4_MUXER,
                    "mp4",
                ),
                candidate(
                    "hwenc-dmabuf-h264-vaapi-lp",
                    HWENC_DMABUF_PREP,
                    None,
                    "vah264lpenc ! queue ! h264parse",
                    AAC_ENCODE,
                    MP4_MUXER,
                    "mp4",
                ),
                candidate(
                    "hwenc-dmabuf-h264-vaapi",
                    HWENC_DMABUF_PREP,
                    None,
                    "vah264enc ! queue ! h264parse",
                    AAC_ENCODE,
                    MP4_MUXER,
                    "mp4",
                ),
                candidate(
                    "swenc-dmabuf-h264-openh264",
                    SWENC_DMABUF_PREP,
                    Some(SWENC_DMABUF_PREP_DOWNSIZE),
                    OPENH264_ENCODE,
                    AAC_ENCODE,
                    MP4_MUXER,
                    "mp4",
                ),
                candidate(
                    "swenc-memfd-h264-openh264",
                    SWENC_MEMFD_PREP,
                    None,
                    OPENH264_ENCODE,
                    AAC_ENCODE,
                    MP4_MUXER,
                    "mp4",
                ),
                candidate(
                    "swenc-dmabuf-vp8-vp8enc",
                    SWENC_DMABUF_PREP,
                    Some(SWENC_DMABUF_PREP_DOWNSIZE),
                    VP8_ENCODE,
                    VORBIS_ENCODE,
                    "webmmux",
                    "webm",
                ),
                candidate(
                    "swenc-memfd-vp8-vp8enc",
                    SWENC_MEMFD_PREP,
                    None,
                    VP8_ENCODE,
                    VORBIS_ENCODE,
                    "webmmux",
                    "webm",
                ),
            ],
        }
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Catalog = serde_json::from_str(&json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.version != CATALOG_VERSION {
            return Err(CatalogError::Version {
                found: self.version,
                expected: CATALOG_VERSION,
            });
        }

        let mut seen = HashSet::new();
        for config in &self.configs {
            if !seen.insert(config.id.as_str()) {
                return Err(CatalogError::DuplicateId(config.id.clone()));
            }
        }
        Ok(())
    }
}

fn candidate(
    id: &str,
    video_prep: &str,
    video_prep_downsize: Option<&str>,
    video_encode: &str,
    audio_encode: &str,
    muxer: &str,
    container_ext: &str,
) -> CandidateConfig {
    CandidateConfig {
        id: id.to_string(),
        video_prep: video_prep.to_string(),
        video_prep_downsize: video_prep_downsize.map(str::to_string),
        video_encode: video_encode.to_string(),
        audio_encode: audio_encode.to_string(),
        muxer: muxer.to_string(),
        container_ext: container_ext.to_string(),
    }
}
