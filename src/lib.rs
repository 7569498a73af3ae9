//! Screencast pipeline negotiation and fallback
//!
//! Selects the first usable encoding configuration from an ordered
//! catalog, composes a GStreamer descriptor for it, and retries with
//! the next candidate when the capture host rejects one. Element
//! probing is advisory and fail-open; negotiation itself is strictly
//! sequential because the capture stream is an exclusive resource.

pub mod audio;
pub mod catalog;
pub mod compose;
pub mod error;
pub mod host;
pub mod negotiate;
pub mod probe;
pub mod settings;

pub use catalog::{CandidateConfig, Catalog};
pub use compose::compose;
pub use error::{CaptureError, CatalogError, NegotiationError, ProbeError};
pub use host::{CaptureArea, CaptureHost, CaptureOptions, CaptureReply, ShellScreencastHost};
pub use negotiate::{Capture, CaptureRequest, Negotiator};
pub use probe::{Availability, ElementChecker, GstInspectChecker, GstRegistryChecker, filter_catalog};
