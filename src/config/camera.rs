//! Per-camera settings.

use crate::capture::Resolution;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use std::path::PathBuf;

/// Snapshot endpoint used when a camera does not configure one.
pub const DEFAULT_ENDPOINT: &str = "https://connect.prusa3d.com/c/snapshot";

/// Length of a derived fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Validated settings for one camera. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Human-readable name, also used to find the device.
    pub name: String,
    /// Explicit device node; bypasses name resolution.
    pub device: Option<PathBuf>,
    /// Requested capture size.
    pub resolution: Option<Resolution>,
    /// Upload endpoint.
    pub endpoint: String,
    /// Secret token sent with every upload.
    pub token: String,
    /// Identifier sent with every upload.
    pub fingerprint: String,
}

impl CameraConfig {
    /// Creates a config with defaults for everything but name and token.
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            fingerprint: default_fingerprint(&name),
            name,
            device: None,
            resolution: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: token.into(),
        }
    }

    /// Sets an explicit device node.
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Requests a capture size.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Overrides the upload endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Overrides the derived fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }
}

/// Derives a fingerprint from a camera name.
///
/// The base64 encoding of the name is padded on the right with `.` up to
/// [`FINGERPRINT_LEN`] characters, or cut down to that length.
pub fn default_fingerprint(name: &str) -> String {
    let mut fingerprint = BASE64_STANDARD.encode(name.as_bytes());
    if fingerprint.len() < FINGERPRINT_LEN {
        let padding = FINGERPRINT_LEN - fingerprint.len();
        fingerprint.extend(std::iter::repeat('.').take(padding));
    } else {
        fingerprint.truncate(FINGERPRINT_LEN);
    }
    fingerprint
}
