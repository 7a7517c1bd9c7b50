//! One enqueue, wait, dequeue cycle against a ready session.

use super::device::{CaptureDevice, Dequeued};
use super::error::CaptureError;
use super::frame::FrameView;
use super::session::CaptureSession;
use std::time::Duration;

/// How long a capture waits for the device to fill the buffer.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives single-frame captures.
#[derive(Debug, Clone, Copy)]
pub struct FrameAcquirer {
    timeout: Duration,
}

impl Default for FrameAcquirer {
    fn default() -> Self {
        Self {
            timeout: CAPTURE_TIMEOUT,
        }
    }
}

impl FrameAcquirer {
    /// Creates an acquirer with the default [`CAPTURE_TIMEOUT`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom wait timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the wait timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Captures one frame.
    ///
    /// A timed out or failed wait leaves the session streaming with the
    /// buffer still held by the driver. The next call restarts the stream
    /// before queueing again, so a frame that arrives late is dropped
    /// rather than uploaded a whole interval after it was taken.
    pub fn capture<'s, D: CaptureDevice>(
        &self,
        session: &'s mut CaptureSession<D>,
    ) -> Result<FrameView<'s>, CaptureError> {
        let format = match session.format() {
            Some(format) if session.is_streaming() => format,
            _ => {
                return Err(CaptureError::NotStreaming {
                    camera: session.camera().to_string(),
                })
            }
        };
        let camera = session.camera().to_string();

        if session.needs_restart {
            session
                .device
                .restart_stream()
                .map_err(|source| CaptureError::Io {
                    camera: camera.clone(),
                    source,
                })?;
            session.needs_restart = false;
            tracing::debug!(camera = %camera, "Restarted stream after failed capture");
        }

        // Cleared once the driver hands the buffer back.
        session.needs_restart = true;
        let dequeued = match session.device.next_frame(self.timeout) {
            Ok(Some(dequeued)) => dequeued,
            Ok(None) => {
                return Err(CaptureError::Timeout {
                    camera,
                    timeout: self.timeout,
                })
            }
            Err(source) => return Err(CaptureError::Io { camera, source }),
        };
        session.needs_restart = false;

        let Dequeued { buffer, bytes_used } = dequeued;
        if bytes_used > buffer.len() {
            return Err(CaptureError::BadLength {
                bytes_used,
                capacity: buffer.len(),
            });
        }

        tracing::debug!(camera = %camera, bytes = bytes_used, "Captured frame");
        Ok(FrameView::new(&buffer[..bytes_used], format))
    }
}
