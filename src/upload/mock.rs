//! In-memory uploader that records what it was given.

use super::{UploadError, UploadHeaders, Uploader};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// One upload as seen by [`MockUploader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    /// Target endpoint.
    pub endpoint: String,
    /// `Content-Type` header value.
    pub content_type: String,
    /// `Fingerprint` header value.
    pub fingerprint: String,
    /// `Token` header value.
    pub token: String,
    /// Bytes read from the body.
    pub body: Vec<u8>,
}

/// Records uploads and fails on request.
#[derive(Debug, Default)]
pub struct MockUploader {
    uploads: Mutex<Vec<RecordedUpload>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    always_fail: bool,
}

impl MockUploader {
    /// Creates an uploader that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every upload with a 503.
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Fails the next `count` uploads, then succeeds.
    pub fn failing_first(count: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    /// Number of calls to `upload`, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successful uploads in arrival order.
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn should_fail(&self) -> bool {
        self.always_fail
            || self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }
}

impl Uploader for MockUploader {
    fn upload(
        &self,
        body: &mut dyn Read,
        length: usize,
        headers: &UploadHeaders<'_>,
        endpoint: &str,
    ) -> Result<(), UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut bytes = Vec::with_capacity(length);
        Read::take(body, length as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        if self.should_fail() {
            return Err(UploadError::Status {
                status: 503,
                endpoint: endpoint.to_string(),
            });
        }

        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedUpload {
                endpoint: endpoint.to_string(),
                content_type: headers.content_type.to_string(),
                fingerprint: headers.fingerprint.to_string(),
                token: headers.token.to_string(),
                body: bytes,
            });
        Ok(())
    }
}
