//! A single capture followed by its upload.

use crate::capture::{CaptureDevice, CaptureError, CaptureSession, FrameAcquirer, FrameView};
use crate::config::CameraConfig;
use crate::metrics::CameraMetrics;
use crate::upload::{UploadError, UploadHeaders, Uploader};
use thiserror::Error;

/// A failed cycle. Never fatal: the loop logs it and carries on.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Streams `frame` to the camera's endpoint with its credentials.
pub fn upload_frame<U>(
    frame: &FrameView<'_>,
    config: &CameraConfig,
    uploader: &U,
) -> Result<(), UploadError>
where
    U: Uploader + ?Sized,
{
    let headers = UploadHeaders {
        content_type: frame.content_type(),
        fingerprint: &config.fingerprint,
        token: &config.token,
    };
    let mut body = frame.reader();
    uploader.upload(&mut body, frame.len(), &headers, &config.endpoint)
}

/// Captures one frame and uploads it. Returns the number of bytes sent.
pub fn capture_and_upload<D, U>(
    acquirer: &FrameAcquirer,
    session: &mut CaptureSession<D>,
    config: &CameraConfig,
    uploader: &U,
) -> Result<usize, CycleError>
where
    D: CaptureDevice,
    U: Uploader + ?Sized,
{
    let frame = acquirer.capture(session)?;
    upload_frame(&frame, config, uploader)?;
    Ok(frame.len())
}

/// Updates a camera's counters from the outcome of one cycle.
pub(crate) fn record_outcome(metrics: &CameraMetrics, outcome: &Result<usize, CycleError>) {
    match outcome {
        Ok(bytes) => {
            metrics.record_capture();
            metrics.record_upload(*bytes);
        }
        Err(CycleError::Capture(e)) => metrics.record_capture_failure(e),
        // The frame itself was captured.
        Err(CycleError::Upload(_)) => {
            metrics.record_capture();
            metrics.record_upload_failure();
        }
    }
}
