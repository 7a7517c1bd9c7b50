//! Capture-side error types.
//!
//! Setup failures are fatal for the whole process; capture failures are
//! recovered by the loop and retried on the next interval.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while bringing a camera from device path to streaming.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no video device matches camera '{camera}'")]
    DeviceNotFound { camera: String },

    #[error("failed to enumerate video devices: {0}")]
    Catalog(#[source] io::Error),

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} does not support video capture: {reason}", path.display())]
    UnsupportedDevice { path: PathBuf, reason: String },

    #[error("format rejected: {reason}")]
    FormatRejected { reason: String },

    #[error("failed to set up capture buffer: {0}")]
    Buffer(#[source] io::Error),

    #[error("failed to start streaming: {0}")]
    StreamStart(#[source] io::Error),
}

/// Errors raised by a single capture cycle.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("timeout getting frame for '{camera}' after {}s", timeout.as_secs())]
    Timeout { camera: String, timeout: Duration },

    #[error("camera '{camera}' is not streaming")]
    NotStreaming { camera: String },

    #[error("capture failed for '{camera}': {source}")]
    Io {
        camera: String,
        #[source]
        source: io::Error,
    },

    #[error("device reported {bytes_used} bytes used in a {capacity} byte buffer")]
    BadLength { bytes_used: usize, capacity: usize },
}

impl CaptureError {
    /// Returns true if the device simply did not produce a frame in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CaptureError::Timeout { .. })
    }
}
