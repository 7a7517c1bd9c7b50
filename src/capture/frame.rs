//! Borrowed view of a captured frame.

use super::format::{NegotiatedFormat, PixelFormat, Resolution};
use std::fmt;

/// Read-only view of the bytes the device wrote into the mapped buffer.
///
/// The view borrows the session mutably, so it cannot outlive the cycle
/// that produced it: the next capture requires the borrow to end first.
#[derive(Clone, Copy)]
pub struct FrameView<'s> {
    data: &'s [u8],
    format: NegotiatedFormat,
}

impl<'s> FrameView<'s> {
    pub(crate) fn new(data: &'s [u8], format: NegotiatedFormat) -> Self {
        Self { data, format }
    }

    /// The frame bytes, `bytes_used` long.
    #[inline]
    pub fn as_bytes(&self) -> &'s [u8] {
        self.data
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the device reported no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A reader over the frame bytes for streaming uploads.
    pub fn reader(&self) -> &'s [u8] {
        self.data
    }

    /// Pixel encoding of the frame.
    pub fn pixel_format(&self) -> PixelFormat {
        self.format.pixel_format
    }

    /// Negotiated frame size.
    pub fn resolution(&self) -> Resolution {
        self.format.resolution()
    }

    /// MIME type of the frame bytes.
    pub fn content_type(&self) -> &'static str {
        self.format.pixel_format.content_type()
    }
}

impl AsRef<[u8]> for FrameView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

impl fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameView")
            .field("format", &self.format.pixel_format)
            .field("resolution", &self.format.resolution())
            .field("bytes", &self.data.len())
            .finish()
    }
}
