//! Capture session setup and teardown.
//!
//! A session owns one opened device for its whole life. Setup runs in a
//! fixed order (capability check, format negotiation, buffer mapping,
//! stream start) and any failure along the way drops the session, which
//! releases the device.

use super::device::{CaptureBuffer, CaptureDevice, DeviceOpener};
use super::error::SetupError;
use super::format::{select_frame_size, NegotiatedFormat, PixelFormat, Resolution};
use crate::config::CameraConfig;
use std::io;
use std::path::{Path, PathBuf};

/// Pixel encoding every session negotiates.
pub const CAPTURE_PIXEL_FORMAT: PixelFormat = PixelFormat::Mjpeg;

/// Lifecycle state of a [`CaptureSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Device opened, nothing configured yet.
    Opened,
    /// Format applied.
    Negotiated,
    /// Buffer requested and mapped.
    Mapped,
    /// Streaming; captures are allowed.
    Ready,
    /// Device released.
    Closed,
}

/// One camera device with its negotiated format and mapped buffer.
pub struct CaptureSession<D: CaptureDevice> {
    camera: String,
    path: PathBuf,
    pub(super) device: D,
    format: Option<NegotiatedFormat>,
    buffer: Option<CaptureBuffer>,
    state: SessionState,
    /// The last capture left the buffer with the driver.
    pub(super) needs_restart: bool,
}

impl<D: CaptureDevice> CaptureSession<D> {
    /// Opens `path` through `opener`.
    pub fn open<O>(opener: &O, camera: &str, path: &Path) -> Result<Self, SetupError>
    where
        O: DeviceOpener<Device = D> + ?Sized,
    {
        let device = opener.open(path).map_err(|source| SetupError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(camera = %camera, path = %path.display(), "Opened device");
        Ok(Self::from_device(camera, path, device))
    }

    /// Wraps an already opened device.
    pub fn from_device(camera: &str, path: impl Into<PathBuf>, device: D) -> Self {
        Self {
            camera: camera.to_string(),
            path: path.into(),
            device,
            format: None,
            buffer: None,
            state: SessionState::Opened,
            needs_restart: false,
        }
    }

    /// Runs the whole setup sequence up to streaming.
    pub fn initialize<O>(opener: &O, config: &CameraConfig, path: &Path) -> Result<Self, SetupError>
    where
        O: DeviceOpener<Device = D> + ?Sized,
    {
        tracing::debug!(camera = %config.name, path = %path.display(), "Initializing camera");
        let mut session = Self::open(opener, &config.name, path)?;
        session.query_capability()?;
        session.negotiate_format(config.resolution)?;
        session.allocate_and_map_buffer()?;
        session.start_streaming()?;
        Ok(session)
    }

    /// Fails unless the device can capture video.
    ///
    /// A node that cannot even answer the capability query is treated
    /// the same as one that lacks capture support.
    pub fn query_capability(&mut self) -> Result<(), SetupError> {
        let unsupported = |reason: String| SetupError::UnsupportedDevice {
            path: self.path.clone(),
            reason,
        };

        match self.device.supports_video_capture() {
            Ok(true) => Ok(()),
            Ok(false) => Err(unsupported("no video capture capability".to_string())),
            Err(e) => Err(unsupported(format!("capability query failed: {}", e))),
        }
    }

    /// Chooses and applies a frame size for [`CAPTURE_PIXEL_FORMAT`].
    ///
    /// A requested size that the device does not offer is not an error:
    /// a warning is logged and the largest offered size is used.
    pub fn negotiate_format(
        &mut self,
        requested: Option<Resolution>,
    ) -> Result<NegotiatedFormat, SetupError> {
        if !matches!(self.state, SessionState::Opened | SessionState::Negotiated) {
            return Err(SetupError::FormatRejected {
                reason: "format cannot change once the buffer is mapped".to_string(),
            });
        }

        let sizes = self
            .device
            .frame_sizes(CAPTURE_PIXEL_FORMAT)
            .map_err(|e| SetupError::FormatRejected {
                reason: format!("cannot enumerate {} frame sizes: {}", CAPTURE_PIXEL_FORMAT, e),
            })?;
        tracing::trace!(camera = %self.camera, ?sizes, "Enumerated frame sizes");

        let selection =
            select_frame_size(sizes, requested).ok_or_else(|| SetupError::FormatRejected {
                reason: format!("device offers no discrete {} frame sizes", CAPTURE_PIXEL_FORMAT),
            })?;

        if let Some(requested) = requested {
            if !selection.exact_match {
                tracing::warn!(
                    camera = %self.camera,
                    requested = %requested,
                    "Resolution '{}' not supported by '{}', using max instead",
                    requested,
                    self.camera
                );
            }
        }

        let format = NegotiatedFormat {
            pixel_format: CAPTURE_PIXEL_FORMAT,
            width: selection.resolution.width,
            height: selection.resolution.height,
        };
        tracing::debug!(
            camera = %self.camera,
            resolution = %selection.resolution,
            "Setting resolution"
        );

        self.device
            .apply_format(&format)
            .map_err(|e| SetupError::FormatRejected {
                reason: format!("{} {}: {}", CAPTURE_PIXEL_FORMAT, selection.resolution, e),
            })?;

        self.format = Some(format);
        self.state = SessionState::Negotiated;
        Ok(format)
    }

    /// Requests the single capture buffer and maps it.
    ///
    /// The format must have been negotiated first.
    pub fn allocate_and_map_buffer(&mut self) -> Result<CaptureBuffer, SetupError> {
        match self.state {
            SessionState::Negotiated => {}
            SessionState::Mapped | SessionState::Ready => {
                return Err(SetupError::Buffer(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "capture buffer already mapped",
                )));
            }
            SessionState::Opened | SessionState::Closed => {
                return Err(SetupError::Buffer(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "format not negotiated",
                )));
            }
        }

        let buffer = self.device.map_buffer().map_err(SetupError::Buffer)?;
        tracing::debug!(
            camera = %self.camera,
            index = buffer.index,
            length = buffer.length,
            "Mapped capture buffer"
        );

        self.buffer = Some(buffer);
        self.state = SessionState::Mapped;
        Ok(buffer)
    }

    /// Enables the stream. The session is `Ready` afterwards.
    pub fn start_streaming(&mut self) -> Result<(), SetupError> {
        if self.state != SessionState::Mapped {
            return Err(SetupError::StreamStart(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no capture buffer mapped",
            )));
        }

        self.device.stream_on().map_err(SetupError::StreamStart)?;
        self.state = SessionState::Ready;
        tracing::info!(camera = %self.camera, path = %self.path.display(), "Camera ready");
        Ok(())
    }

    /// Releases the device and its mapping. Repeated calls do nothing.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.device.release();
        self.needs_restart = false;
        self.state = SessionState::Closed;
        tracing::debug!(camera = %self.camera, "Closed device");
    }

    /// Camera name used in logs and errors.
    pub fn camera(&self) -> &str {
        &self.camera
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while captures are allowed.
    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The negotiated format, once set.
    pub fn format(&self) -> Option<NegotiatedFormat> {
        self.format
    }

    /// The mapped buffer, once allocated.
    pub fn buffer(&self) -> Option<CaptureBuffer> {
        self.buffer
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.close();
    }
}
