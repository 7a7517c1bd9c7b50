//! Prometheus metrics for capture and upload activity.
//!
//! Every series carries a `camera` label.
//!
//! # Metrics Exposed
//!
//! ## Capture Metrics
//! - `camsnap_captures_total` - Frames captured
//! - `camsnap_capture_failures_total` - Capture cycles that produced no frame
//! - `camsnap_capture_timeouts_total` - Captures that timed out waiting for the device
//!
//! ## Upload Metrics
//! - `camsnap_uploads_total` - Frames uploaded
//! - `camsnap_upload_failures_total` - Failed uploads
//! - `camsnap_upload_bytes_total` - Frame bytes uploaded
//! - `camsnap_last_upload_timestamp_seconds` - Unix time of the last successful upload
//!
//! With the `metrics` feature the registry can be served over HTTP by
//! [`MetricsServer`].
//!
//! # Example
//!
//! ```
//! use camsnap::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let camera = registry.camera("printer");
//! camera.record_capture();
//! camera.record_upload(4096);
//!
//! assert!(registry.encode().unwrap().contains("camsnap_uploads_total"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{CameraMetrics, MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
