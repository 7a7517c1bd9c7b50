//! Scripted capture device for tests and dry runs.
//!
//! [`MockDevice`] follows the same buffer rules as a real driver: the
//! buffer can only be queued while streaming and cannot be queued again
//! while a failed wait left it with the driver; only a stream restart
//! takes it back. Frames are scripted up front; once the script runs out
//! every wait yields a small fake JPEG.

use super::device::{CaptureBuffer, CaptureDevice, Dequeued, DeviceOpener};
use super::format::{FrameSize, NegotiatedFormat, PixelFormat, Resolution};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const DEFAULT_BUFFER_LEN: usize = 64 * 1024;

/// JPEG start/end markers, enough for anything that sniffs the payload.
const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

/// One scripted outcome of a wait.
#[derive(Debug, Clone)]
pub enum MockFrame {
    /// A frame with these bytes arrives.
    Data(Vec<u8>),
    /// Nothing arrives before the timeout.
    Timeout,
    /// The wait itself fails.
    Error,
}

/// Counters shared between a mock device and the test observing it.
#[derive(Debug, Default)]
pub struct MockProbe {
    enqueues: AtomicUsize,
    dequeues: AtomicUsize,
    restarts: AtomicUsize,
    releases: AtomicUsize,
}

impl MockProbe {
    /// Number of successful enqueues.
    pub fn enqueues(&self) -> usize {
        self.enqueues.load(Ordering::SeqCst)
    }

    /// Number of successful dequeues.
    pub fn dequeues(&self) -> usize {
        self.dequeues.load(Ordering::SeqCst)
    }

    /// Number of stream restarts.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Number of times the device went from open to released.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Scripted in-memory capture device.
#[derive(Debug)]
pub struct MockDevice {
    capture_capable: bool,
    fail_query: bool,
    frame_sizes: Vec<FrameSize>,
    reject_format: bool,
    fail_map: bool,
    fail_stream: bool,
    buffer_len: usize,
    script: VecDeque<MockFrame>,

    applied: Option<NegotiatedFormat>,
    buffer: Vec<u8>,
    streaming: bool,
    queued: bool,
    released: bool,
    probe: Arc<MockProbe>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            capture_capable: true,
            fail_query: false,
            frame_sizes: vec![
                FrameSize::Discrete(Resolution::new(640, 480)),
                FrameSize::Discrete(Resolution::new(1280, 720)),
            ],
            reject_format: false,
            fail_map: false,
            fail_stream: false,
            buffer_len: DEFAULT_BUFFER_LEN,
            script: VecDeque::new(),
            applied: None,
            buffer: Vec::new(),
            streaming: false,
            queued: false,
            released: false,
            probe: Arc::new(MockProbe::default()),
        }
    }
}

impl MockDevice {
    /// Creates a capture-capable device offering 640x480 and 1280x720.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the enumerated frame sizes.
    pub fn with_frame_sizes(mut self, sizes: impl IntoIterator<Item = FrameSize>) -> Self {
        self.frame_sizes = sizes.into_iter().collect();
        self
    }

    /// Makes the device report no video-capture capability.
    pub fn without_capture(mut self) -> Self {
        self.capture_capable = false;
        self
    }

    /// Makes the capability query itself fail, as on a non-V4L2 node.
    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    /// Makes `apply_format` fail.
    pub fn rejecting_format(mut self) -> Self {
        self.reject_format = true;
        self
    }

    /// Makes `map_buffer` fail.
    pub fn failing_map(mut self) -> Self {
        self.fail_map = true;
        self
    }

    /// Makes `stream_on` fail.
    pub fn failing_stream(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    /// Appends outcomes to the frame script.
    pub fn with_script(mut self, frames: impl IntoIterator<Item = MockFrame>) -> Self {
        self.script.extend(frames);
        self
    }

    /// Shared counters, usable after the device has been moved away.
    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }

    /// Format applied by the last `apply_format`.
    pub fn applied_format(&self) -> Option<NegotiatedFormat> {
        self.applied
    }

    /// Returns true between `stream_on` and `release`.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Returns true once `release` has run.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

impl CaptureDevice for MockDevice {
    fn supports_video_capture(&mut self) -> io::Result<bool> {
        if self.fail_query {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "inappropriate ioctl"));
        }
        Ok(self.capture_capable)
    }

    fn frame_sizes(&mut self, pixel_format: PixelFormat) -> io::Result<Vec<FrameSize>> {
        match pixel_format {
            PixelFormat::Mjpeg => Ok(self.frame_sizes.clone()),
        }
    }

    fn apply_format(&mut self, format: &NegotiatedFormat) -> io::Result<()> {
        if self.reject_format {
            return Err(invalid("format not accepted"));
        }
        self.applied = Some(*format);
        Ok(())
    }

    fn map_buffer(&mut self) -> io::Result<CaptureBuffer> {
        if self.fail_map {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "cannot allocate buffer"));
        }
        self.buffer = vec![0; self.buffer_len];
        Ok(CaptureBuffer {
            index: 0,
            length: self.buffer_len,
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        if self.fail_stream {
            return Err(invalid("stream refused"));
        }
        self.streaming = true;
        Ok(())
    }

    fn next_frame(&mut self, _timeout: Duration) -> io::Result<Option<Dequeued<'_>>> {
        if !self.streaming {
            return Err(invalid("not streaming"));
        }
        if self.queued {
            return Err(invalid("buffer already queued"));
        }
        self.queued = true;
        self.probe.enqueues.fetch_add(1, Ordering::SeqCst);

        let frame = self
            .script
            .pop_front()
            .unwrap_or_else(|| MockFrame::Data(FAKE_JPEG.to_vec()));

        match frame {
            MockFrame::Data(bytes) => {
                let len = bytes.len().min(self.buffer.len());
                self.buffer[..len].copy_from_slice(&bytes[..len]);
                self.queued = false;
                self.probe.dequeues.fetch_add(1, Ordering::SeqCst);
                Ok(Some(Dequeued {
                    buffer: &self.buffer,
                    bytes_used: bytes.len(),
                }))
            }
            MockFrame::Timeout => Ok(None),
            MockFrame::Error => Err(io::Error::new(io::ErrorKind::Other, "device lost")),
        }
    }

    fn restart_stream(&mut self) -> io::Result<()> {
        if !self.streaming {
            return Err(invalid("not streaming"));
        }
        self.queued = false;
        self.probe.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.streaming = false;
        self.queued = false;
        self.buffer = Vec::new();
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out pre-built mock devices by path.
#[derive(Debug, Default)]
pub struct MockOpener {
    devices: Mutex<HashMap<PathBuf, MockDevice>>,
}

impl MockOpener {
    /// Creates an opener with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the device returned for `path`. Each path opens once.
    pub fn insert(&self, path: impl Into<PathBuf>, device: MockDevice) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), device);
    }
}

impl DeviceOpener for MockOpener {
    type Device = MockDevice;

    fn open(&self, path: &Path) -> io::Result<MockDevice> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))
    }
}
