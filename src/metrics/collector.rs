//! Metrics collection and registry.

use crate::capture::CaptureError;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

const CAMERA_LABEL: &str = "camera";

/// Prometheus registry holding the per-camera capture and upload series.
///
/// Cloning is cheap; clones share the same series.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Capture metrics
    captures: IntCounterVec,
    capture_failures: IntCounterVec,
    capture_timeouts: IntCounterVec,

    // Upload metrics
    uploads: IntCounterVec,
    upload_failures: IntCounterVec,
    upload_bytes: IntCounterVec,
    last_upload: GaugeVec,
}

fn counter(name: &str, help: &str) -> Result<IntCounterVec, MetricsError> {
    Ok(IntCounterVec::new(Opts::new(name, help), &[CAMERA_LABEL])?)
}

impl MetricsRegistry {
    /// Creates a new registry with all camera metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let captures = counter("camsnap_captures_total", "Frames captured")?;
        let capture_failures = counter(
            "camsnap_capture_failures_total",
            "Capture cycles that produced no frame",
        )?;
        let capture_timeouts = counter(
            "camsnap_capture_timeouts_total",
            "Captures that timed out waiting for the device",
        )?;

        let uploads = counter("camsnap_uploads_total", "Frames uploaded")?;
        let upload_failures = counter("camsnap_upload_failures_total", "Failed uploads")?;
        let upload_bytes = counter("camsnap_upload_bytes_total", "Frame bytes uploaded")?;
        let last_upload = GaugeVec::new(
            Opts::new(
                "camsnap_last_upload_timestamp_seconds",
                "Unix time of the last successful upload",
            ),
            &[CAMERA_LABEL],
        )?;

        registry.register(Box::new(captures.clone()))?;
        registry.register(Box::new(capture_failures.clone()))?;
        registry.register(Box::new(capture_timeouts.clone()))?;
        registry.register(Box::new(uploads.clone()))?;
        registry.register(Box::new(upload_failures.clone()))?;
        registry.register(Box::new(upload_bytes.clone()))?;
        registry.register(Box::new(last_upload.clone()))?;

        Ok(Self {
            registry,
            captures,
            capture_failures,
            capture_timeouts,
            uploads,
            upload_failures,
            upload_bytes,
            last_upload,
        })
    }

    /// Returns the series handle for one camera.
    pub fn camera(&self, name: &str) -> CameraMetrics {
        let labels = [name];
        CameraMetrics {
            captures: self.captures.with_label_values(&labels),
            capture_failures: self.capture_failures.with_label_values(&labels),
            capture_timeouts: self.capture_timeouts.with_label_values(&labels),
            uploads: self.uploads.with_label_values(&labels),
            upload_failures: self.upload_failures.with_label_values(&labels),
            upload_bytes: self.upload_bytes.with_label_values(&labels),
            last_upload: self.last_upload.with_label_values(&labels),
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Series of a single camera, handed to its capture loop.
#[derive(Clone)]
pub struct CameraMetrics {
    captures: IntCounter,
    capture_failures: IntCounter,
    capture_timeouts: IntCounter,
    uploads: IntCounter,
    upload_failures: IntCounter,
    upload_bytes: IntCounter,
    last_upload: Gauge,
}

impl CameraMetrics {
    /// Counts a captured frame.
    pub fn record_capture(&self) {
        self.captures.inc();
    }

    /// Counts a failed capture, and a timeout if it was one.
    pub fn record_capture_failure(&self, error: &CaptureError) {
        self.capture_failures.inc();
        if error.is_timeout() {
            self.capture_timeouts.inc();
        }
    }

    /// Counts a successful upload of `bytes` and stamps the time.
    pub fn record_upload(&self, bytes: usize) {
        self.uploads.inc();
        self.upload_bytes.inc_by(bytes as u64);
        let now = chrono::Utc::now();
        self.last_upload.set(now.timestamp_millis() as f64 / 1000.0);
    }

    /// Counts a failed upload.
    pub fn record_upload_failure(&self) {
        self.upload_failures.inc();
    }

    /// Frames captured so far.
    pub fn captures(&self) -> u64 {
        self.captures.get()
    }

    /// Successful uploads so far.
    pub fn uploads(&self) -> u64 {
        self.uploads.get()
    }

    /// Failed uploads so far.
    pub fn upload_failures(&self) -> u64 {
        self.upload_failures.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_camera_series_are_separate() {
        let registry = MetricsRegistry::new().unwrap();
        let front = registry.camera("front");
        let back = registry.camera("back");

        front.record_capture();
        front.record_upload(100);
        back.record_capture();
        back.record_upload_failure();

        assert_eq!(front.uploads(), 1);
        assert_eq!(back.uploads(), 0);
        assert_eq!(back.upload_failures(), 1);

        // Handles for the same camera share their series.
        assert_eq!(registry.camera("front").captures(), 1);
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let camera = registry.camera("cam1");

        camera.record_capture();
        camera.record_upload(2048);
        camera.record_capture_failure(&CaptureError::Timeout {
            camera: "cam1".to_string(),
            timeout: Duration::from_secs(10),
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("camsnap_captures_total{camera=\"cam1\"} 1"));
        assert!(output.contains("camsnap_upload_bytes_total{camera=\"cam1\"} 2048"));
        assert!(output.contains("camsnap_capture_timeouts_total{camera=\"cam1\"} 1"));
        assert!(output.contains("camsnap_last_upload_timestamp_seconds"));
    }
}
