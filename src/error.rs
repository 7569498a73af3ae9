//! Error types for pipeline negotiation

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while probing element availability.
///
/// Probing is advisory: the config filter converts these into a
/// fail-open fallback instead of surfacing them.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The existence check could not be launched at all
    #[error("failed to launch element check for `{element}`: {source}")]
    Launch {
        element: String,
        #[source]
        source: std::io::Error,
    },

    /// GStreamer registry initialization failed
    #[error("GStreamer initialization failed: {0}")]
    Init(String),
}

/// A single capture attempt was rejected by the capture host.
///
/// Caught inside the negotiation loop, where it advances the cursor;
/// never surfaced to callers directly.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// D-Bus level failure talking to the capture service
    #[error("screencast call failed: {0}")]
    Bus(#[from] zbus::Error),

    /// The host refused the request outright
    #[error("capture host rejected the request: {0}")]
    Rejected(String),
}

/// Terminal negotiation failure, the only error surfaced to callers.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Every filtered candidate was tried and failed
    #[error("tried all {tried} pipeline configurations and failed")]
    Exhausted {
        /// Number of candidates the session had to begin with
        tried: usize,
    },
}

/// Failures while explicitly loading a candidate catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported catalog version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("duplicate candidate id `{0}`")]
    DuplicateId(String),
}
