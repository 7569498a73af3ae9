//! Capture host integration
//!
//! The negotiator drives an injected [`CaptureHost`]; the real
//! implementation talks to GNOME Shell's screencast service over the
//! session bus.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use zbus::zvariant::Value;

use crate::error::CaptureError;

const SCREENCAST_NAME: &str = "org.gnome.Shell.Screencast";
const SCREENCAST_PATH: &str = "/org/gnome/Shell/Screencast";
const SCREENCAST_INTERFACE: &str = "org.gnome.Shell.Screencast";

/// Options forwarded with every capture call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Frames per second
    pub framerate: u32,
    /// Whether the cursor is drawn into the recording
    pub draw_cursor: bool,
}

/// Region of the screen to record, in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureArea {
    /// The whole screen
    FullScreen,
    /// A rectangle within the screen
    Region {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
}

/// What the capture host reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReply {
    pub success: bool,
    /// Path of the produced file; the extension may be a placeholder
    pub path: PathBuf,
}

/// Screen capture executor, injected into the negotiator.
///
/// The capture stream is an exclusive resource, so implementations
/// are only ever driven one call at a time.
#[async_trait]
pub trait CaptureHost {
    /// Run one capture with the composed pipeline descriptor.
    ///
    /// Resolves once the host has started (or refused) the recording;
    /// timeouts and cancellation are the host's responsibility. An
    /// `Err` marks the candidate as failed and moves negotiation to
    /// the next one.
    async fn capture(
        &self,
        pipeline: &str,
        output_stem: &Path,
        options: &CaptureOptions,
    ) -> Result<CaptureReply, CaptureError>;
}

/// Capture host backed by `org.gnome.Shell.Screencast`.
///
/// The shell prepends its screen source to the first descriptor
/// segment and appends the file sink to the last one.
#[derive(Debug, Clone)]
pub struct ShellScreencastHost {
    connection: zbus::Connection,
    area: CaptureArea,
}

impl ShellScreencastHost {
    /// Connect to the session bus.
    pub async fn new(area: CaptureArea) -> Result<Self, CaptureError> {
        let connection = zbus::Connection::session().await?;
        Ok(Self { connection, area })
    }

    /// Ask the shell to stop the running screencast.
    pub async fn stop(&self) -> Result<bool, CaptureError> {
        let reply = self
            .connection
            .call_method(
                Some(SCREENCAST_NAME),
                SCREENCAST_PATH,
                Some(SCREENCAST_INTERFACE),
                "StopScreencast",
                &(),
            )
            .await?;
        Ok(reply.body().deserialize()?)
    }
}

#[async_trait]
impl CaptureHost for ShellScreencastHost {
    async fn capture(
        &self,
        pipeline: &str,
        output_stem: &Path,
        options: &CaptureOptions,
    ) -> Result<CaptureReply, CaptureError> {
        let file_template = output_stem.to_string_lossy();

        let mut call_options: HashMap<&str, Value> = HashMap::new();
        call_options.insert("framerate", Value::from(options.framerate as i32));
        call_options.insert("pipeline", Value::from(pipeline));
        call_options.insert("draw-cursor", Value::from(options.draw_cursor));

        let reply = match self.area {
            CaptureArea::FullScreen => {
                self.connection
                    .call_method(
                        Some(SCREENCAST_NAME),
                        SCREENCAST_PATH,
                        Some(SCREENCAST_INTERFACE),
                        "Screencast",
                        &(file_template.as_ref(), call_options),
                    )
                    .await?
            }
            CaptureArea::Region {
                x,
                y,
                width,
                height,
            } => {
                self.connection
                    .call_method(
                        Some(SCREENCAST_NAME),
                        SCREENCAST_PATH,
                        Some(SCREENCAST_INTERFACE),
                        "ScreencastArea",
                        &(
                            x,
                            y,
                            width as i32,
                            height as i32,
                            file_template.as_ref(),
                            call_options,
                        ),
                    )
                    .await?
            }
        };

        let (success, path): (bool, String) = reply.body().deserialize()?;
        Ok(CaptureReply {
            success,
            path: PathBuf::from(path),
        })
    }
}
