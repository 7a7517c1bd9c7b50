//! Delivery of captured frames to a snapshot endpoint.
//!
//! The capture loop only sees the [`Uploader`] trait. The body is handed
//! over as a reader together with its length so that implementations can
//! stream it straight out of the mapped capture buffer; the buffer is
//! reused as soon as `upload` returns.

mod http;
mod mock;

pub use http::{HttpUploader, DEFAULT_UPLOAD_TIMEOUT};
pub use mock::{MockUploader, RecordedUpload};

use std::io::Read;
use thiserror::Error;

/// Upload failures. All of them are recoverable.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("endpoint {endpoint} answered with status {status}")]
    Status { status: u16, endpoint: String },

    #[error("upload transport failed: {0}")]
    Transport(String),
}

/// Per-upload metadata sent alongside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadHeaders<'a> {
    /// MIME type of the body.
    pub content_type: &'a str,
    /// Camera fingerprint.
    pub fingerprint: &'a str,
    /// Camera token.
    pub token: &'a str,
}

/// Blocking frame delivery.
pub trait Uploader: Send + Sync {
    /// Sends `length` bytes read from `body` to `endpoint`.
    ///
    /// Anything other than a 2xx answer is an error.
    fn upload(
        &self,
        body: &mut dyn Read,
        length: usize,
        headers: &UploadHeaders<'_>,
        endpoint: &str,
    ) -> Result<(), UploadError>;
}

impl<U: Uploader + ?Sized> Uploader for &U {
    fn upload(
        &self,
        body: &mut dyn Read,
        length: usize,
        headers: &UploadHeaders<'_>,
        endpoint: &str,
    ) -> Result<(), UploadError> {
        (**self).upload(body, length, headers, endpoint)
    }
}
