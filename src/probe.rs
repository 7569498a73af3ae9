//! Element availability probing and catalog filtering
//!
//! Probing only orders work ahead of time: it never blocks a
//! recording. Every element the catalog mentions is checked once, all
//! checks in flight concurrently, and a checker failure makes the
//! filter fall back to the whole catalog.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::future;

use crate::catalog::{CandidateConfig, Catalog};
use crate::error::ProbeError;

/// Existence check for a single GStreamer element.
///
/// Existence only: an element may still fail at runtime (missing GPU,
/// busy device), which is what the negotiation retry loop is for.
#[async_trait]
pub trait ElementChecker {
    /// Whether the named element exists in the host environment.
    async fn check_element(&self, element: &str) -> Result<bool, ProbeError>;
}

/// Checker backed by the `gst-inspect-1.0 --exists` subprocess.
///
/// Probing out of process keeps GStreamer initialization out of the
/// calling process entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct GstInspectChecker;

#[async_trait]
impl ElementChecker for GstInspectChecker {
    async fn check_element(&self, element: &str) -> Result<bool, ProbeError> {
        let status = tokio::process::Command::new("gst-inspect-1.0")
            .arg("--exists")
            .arg(element)
            .status()
            .await
            .map_err(|source| ProbeError::Launch {
                element: element.to_string(),
                source,
            })?;
        Ok(status.success())
    }
}

/// Checker backed by the in-process GStreamer registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct GstRegistryChecker;

#[async_trait]
impl ElementChecker for GstRegistryChecker {
    async fn check_element(&self, element: &str) -> Result<bool, ProbeError> {
        gstreamer::init().map_err(|err| ProbeError::Init(err.to_string()))?;
        Ok(gstreamer::ElementFactory::find(element).is_some())
    }
}

/// Element tokens of a segment: everything that is not a pad/object
/// reference (`mux.`), a property assignment (`key=value`), or the
/// `!` link operator.
fn segment_elements(segment: &str) -> impl Iterator<Item = &str> {
    segment
        .split_whitespace()
        .filter(|word| !word.contains('.') && !word.contains('=') && !word.contains('!'))
}

/// Memoized element availability, built by one concurrent sweep.
///
/// Read-only after construction; the environment is assumed static
/// for the session's lifetime.
#[derive(Debug, Clone, Default)]
pub struct Availability {
    elements: HashMap<String, bool>,
}

impl Availability {
    /// Probe every element the catalog needs.
    ///
    /// Names are deduplicated across all candidates so each element
    /// is checked exactly once, with all checks dispatched
    /// concurrently. Completion order does not matter; only the
    /// outcome per name does.
    pub async fn probe<C: ElementChecker>(
        checker: &C,
        catalog: &Catalog,
    ) -> Result<Self, ProbeError> {
        let mut names: Vec<&str> = Vec::new();
        let mut seen = HashSet::new();
        for config in &catalog.configs {
            for segment in [
                &config.video_prep,
                &config.video_encode,
                &config.audio_encode,
                &config.muxer,
            ] {
                for element in segment_elements(segment) {
                    if seen.insert(element) {
                        names.push(element);
                    }
                }
            }
        }

        let checks = future::join_all(names.iter().map(|name| checker.check_element(name))).await;

        let mut elements = HashMap::new();
        for (name, available) in names.into_iter().zip(checks) {
            elements.insert(name.to_string(), available?);
        }
        Ok(Self { elements })
    }

    /// Whether a single element was probed available.
    pub fn element(&self, name: &str) -> bool {
        self.elements.get(name).copied().unwrap_or(false)
    }

    /// Whether every element of a segment is available.
    pub fn segment(&self, segment: &str) -> bool {
        segment_elements(segment).all(|element| self.element(element))
    }

    /// Whether a whole candidate is available.
    ///
    /// The downsize prep variant is not consulted; a candidate is
    /// judged on the segments every recording uses.
    pub fn config(&self, config: &CandidateConfig) -> bool {
        self.segment(&config.video_prep)
            && self.segment(&config.video_encode)
            && self.segment(&config.audio_encode)
            && self.segment(&config.muxer)
    }
}

/// Keep the catalog subsequence whose candidates are fully available,
/// preserving catalog order.
///
/// Fail-open: any probe error falls back to the entire unfiltered
/// catalog, so a broken checker can cost retries but never a
/// recording.
pub async fn filter_catalog<C: ElementChecker>(
    checker: &C,
    catalog: &Catalog,
) -> Vec<CandidateConfig> {
    match Availability::probe(checker, catalog).await {
        Ok(availability) => {
            let configs: Vec<CandidateConfig> = catalog
                .configs
                .iter()
                .filter(|config| availability.config(config))
                .cloned()
                .collect();

            log::info!(
                "Using {} of {} pipeline configurations:",
                configs.len(),
                catalog.configs.len()
            );
            for config in &configs {
                log::info!("- {}", config.id);
            }
            configs
        }
        Err(err) => {
            log::warn!("Configuration filtering failed: {err}");
            log::warn!("Falling back to the full catalog");
            catalog.configs.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::catalog::CATALOG_VERSION;

    /// Checker scripted from a fixed set of available element names.
    struct MapChecker {
        available: HashSet<&'static str>,
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MapChecker {
        fn new(available: &[&'static str]) -> Self {
            Self {
                available: available.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                available: HashSet::new(),
                calls: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl ElementChecker for MapChecker {
        async fn check_element(&self, element: &str) -> Result<bool, ProbeError> {
            self.calls.lock().unwrap().push(element.to_string());
            if self.fail {
                return Err(ProbeError::Init("registry unavailable".to_string()));
            }
            Ok(self.available.contains(element))
        }
    }

    fn config(id: &str, video_encode: &str) -> CandidateConfig {
        CandidateConfig {
            id: id.to_string(),
            video_prep: "videoconvert ! queue".to_string(),
            video_prep_downsize: Some("missing-downsize-element".to_string()),
            video_encode: video_encode.to_string(),
            audio_encode: "vorbisenc ! queue".to_string(),
            muxer: "webmmux".to_string(),
            container_ext: "webm".to_string(),
        }
    }

    fn catalog(configs: Vec<CandidateConfig>) -> Catalog {
        Catalog {
            version: CATALOG_VERSION,
            configs,
        }
    }

    #[test]
    fn test_segment_elements_skip_non_stage_tokens() {
        let elements: Vec<&str> =
            segment_elements("vp8enc deadline=1 threads=%T ! queue ! mux. webmmux").collect();
        assert_eq!(elements, vec!["vp8enc", "queue", "webmmux"]);
    }

    #[tokio::test]
    async fn test_filter_preserves_catalog_order() {
        let checker = MapChecker::new(&["videoconvert", "queue", "vorbisenc", "webmmux", "vp8enc"]);
        let catalog = catalog(vec![
            config("cfg-a", "nvh264enc ! queue"),
            config("cfg-b", "vp8enc ! queue"),
            config("cfg-c", "queue"),
        ]);

        let filtered = filter_catalog(&checker, &catalog).await;
        let ids: Vec<&str> = filtered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cfg-b", "cfg-c"]);
    }

    #[tokio::test]
    async fn test_probe_checks_each_element_once() {
        let checker = MapChecker::new(&["videoconvert", "queue", "vorbisenc", "webmmux"]);
        let catalog = catalog(vec![
            config("cfg-a", "vp8enc ! queue"),
            config("cfg-b", "vp8enc ! queue"),
        ]);

        Availability::probe(&checker, &catalog).await.unwrap();

        let calls = checker.calls.lock().unwrap();
        let mut unique: Vec<&str> = calls.iter().map(String::as_str).collect();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(calls.len(), unique.len(), "duplicate checks: {calls:?}");
    }

    #[tokio::test]
    async fn test_probe_skips_downsize_prep_segment() {
        let checker = MapChecker::new(&["videoconvert", "queue", "vorbisenc", "webmmux", "vp8enc"]);
        let catalog = catalog(vec![config("cfg-a", "vp8enc ! queue")]);

        let filtered = filter_catalog(&checker, &catalog).await;
        assert_eq!(filtered.len(), 1);

        let calls = checker.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c == "missing-downsize-element"));
    }

    #[tokio::test]
    async fn test_filter_fails_open_on_checker_error() {
        let checker = MapChecker::failing();
        let catalog = catalog(vec![
            config("cfg-a", "nvh264enc ! queue"),
            config("cfg-b", "vp8enc ! queue"),
        ]);

        let filtered = filter_catalog(&checker, &catalog).await;
        assert_eq!(filtered, catalog.configs);
    }

    #[tokio::test]
    async fn test_unprobed_elements_count_as_missing() {
        let checker = MapChecker::new(&[]);
        let catalog = catalog(vec![config("cfg-a", "vp8enc ! queue")]);

        let availability = Availability::probe(&checker, &catalog).await.unwrap();
        assert!(!availability.element("never-probed"));
        assert!(!availability.config(&catalog.configs[0]));
    }
}
