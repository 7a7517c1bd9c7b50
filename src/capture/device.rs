//! Hardware abstraction for a single capture device.
//!
//! A [`CaptureDevice`] exposes the individual steps of the single-buffer
//! streaming protocol so that [`CaptureSession`](super::CaptureSession)
//! and [`FrameAcquirer`](super::FrameAcquirer) can drive them in order.
//! The V4L2 backend talks to the kernel; [`MockDevice`](super::MockDevice)
//! scripts the same protocol for tests.

use super::format::{FrameSize, NegotiatedFormat, PixelFormat};
use std::io;
use std::path::Path;
use std::time::Duration;

/// The single kernel buffer backing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureBuffer {
    /// Buffer index as known to the driver.
    pub index: u32,
    /// Length of the buffer in bytes.
    pub length: usize,
}

/// A filled buffer handed back by the driver.
///
/// `buffer` is the whole mapped region; only the first `bytes_used`
/// bytes belong to the frame.
#[derive(Debug, Clone, Copy)]
pub struct Dequeued<'a> {
    /// The mapped buffer.
    pub buffer: &'a [u8],
    /// Bytes written by the driver, as reported on dequeue.
    pub bytes_used: usize,
}

/// The steps of the capture protocol.
///
/// Implementations are used by exactly one session at a time and are
/// never shared between threads while in use.
pub trait CaptureDevice {
    /// Returns whether the device reports video-capture capability.
    fn supports_video_capture(&mut self) -> io::Result<bool>;

    /// Enumerates frame sizes for `pixel_format` in device index order.
    fn frame_sizes(&mut self, pixel_format: PixelFormat) -> io::Result<Vec<FrameSize>>;

    /// Applies the chosen format to the device.
    fn apply_format(&mut self, format: &NegotiatedFormat) -> io::Result<()>;

    /// Requests exactly one buffer and maps it into process memory.
    fn map_buffer(&mut self) -> io::Result<CaptureBuffer>;

    /// Enables the capture stream.
    fn stream_on(&mut self) -> io::Result<()>;

    /// Queues the buffer, waits up to `timeout` for the driver to fill it
    /// and dequeues it.
    ///
    /// Returns `Ok(None)` if the wait timed out. The buffer is then still
    /// queued and must be reclaimed with
    /// [`restart_stream`](Self::restart_stream) before the next call.
    fn next_frame(&mut self, timeout: Duration) -> io::Result<Option<Dequeued<'_>>>;

    /// Turns the stream off and on again, taking back a buffer left with
    /// the driver and dropping whatever it held.
    fn restart_stream(&mut self) -> io::Result<()>;

    /// Unmaps the buffer and closes the device. Safe to call repeatedly.
    fn release(&mut self);
}

/// Opens capture devices by path.
pub trait DeviceOpener {
    /// The device type produced.
    type Device: CaptureDevice;

    /// Opens `path` for read/write.
    fn open(&self, path: &Path) -> io::Result<Self::Device>;
}
