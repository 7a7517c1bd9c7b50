//! Video4Linux2 backend.
//!
//! Built on the `v4l` crate: capability and frame size queries go through
//! [`Device`], and the single capture buffer is an MMAP [`Stream`] holding
//! exactly one buffer.

use super::device::{CaptureBuffer, CaptureDevice, Dequeued, DeviceOpener};
use super::format::{FrameSize, NegotiatedFormat, PixelFormat, Resolution};
use std::io;
use std::path::Path;
use std::time::Duration;
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::{CaptureStream, Stream as StreamControl};
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Buffers requested from the driver.
const BUFFER_COUNT: u32 = 1;

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "device closed")
}

fn not_mapped() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "no buffer mapped")
}

/// A V4L2 device node opened read/write.
pub struct V4l2Device {
    // Declared before `device` so the buffer is unmapped first.
    stream: Option<Stream<'static>>,
    device: Option<Device>,
    image_size: usize,
}

impl V4l2Device {
    /// Opens the device node at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            stream: None,
            device: Some(Device::with_path(path)?),
            image_size: 0,
        })
    }

    fn device(&self) -> io::Result<&Device> {
        self.device.as_ref().ok_or_else(closed)
    }

    fn stream(&mut self) -> io::Result<&mut Stream<'static>> {
        self.stream.as_mut().ok_or_else(not_mapped)
    }
}

impl CaptureDevice for V4l2Device {
    fn supports_video_capture(&mut self) -> io::Result<bool> {
        let caps = self.device()?.query_caps()?;
        tracing::debug!(card = %caps.card, driver = %caps.driver, "Queried device");
        Ok(caps.capabilities.contains(Flags::VIDEO_CAPTURE))
    }

    fn frame_sizes(&mut self, pixel_format: PixelFormat) -> io::Result<Vec<FrameSize>> {
        let fourcc = FourCC::new(&pixel_format.fourcc());
        let sizes = self.device()?.enum_framesizes(fourcc)?;

        Ok(sizes
            .into_iter()
            .map(|entry| match entry.size {
                FrameSizeEnum::Discrete(size) => {
                    FrameSize::Discrete(Resolution::new(size.width, size.height))
                }
                FrameSizeEnum::Stepwise(_) => FrameSize::Stepwise,
            })
            .collect())
    }

    fn apply_format(&mut self, format: &NegotiatedFormat) -> io::Result<()> {
        let fourcc = FourCC::new(&format.pixel_format.fourcc());
        let requested = Format::new(format.width, format.height, fourcc);
        let applied = self.device()?.set_format(&requested)?;

        if applied.fourcc != fourcc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("driver does not accept {}", format.pixel_format),
            ));
        }
        if (applied.width, applied.height) != (format.width, format.height) {
            tracing::debug!(
                width = applied.width,
                height = applied.height,
                "Driver adjusted frame size"
            );
        }
        self.image_size = applied.size as usize;
        Ok(())
    }

    fn map_buffer(&mut self) -> io::Result<CaptureBuffer> {
        let stream = Stream::with_buffers(self.device()?, Type::VideoCapture, BUFFER_COUNT)?;
        self.stream = Some(stream);
        Ok(CaptureBuffer {
            index: 0,
            length: self.image_size,
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        self.stream()?.start()
    }

    fn next_frame(&mut self, timeout: Duration) -> io::Result<Option<Dequeued<'_>>> {
        let stream = self.stream.as_mut().ok_or_else(not_mapped)?;
        stream.set_timeout(timeout);

        match CaptureStream::next(stream) {
            Ok((buffer, meta)) => Ok(Some(Dequeued {
                buffer,
                bytes_used: meta.bytesused as usize,
            })),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn restart_stream(&mut self) -> io::Result<()> {
        let stream = self.stream()?;
        // STREAMOFF hands every queued buffer back to userspace.
        stream.stop()?;
        stream.start()
    }

    fn release(&mut self) {
        self.stream = None;
        // Closing the node also stops the stream.
        self.device = None;
    }
}

/// Opens V4L2 device nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Opener;

impl DeviceOpener for V4l2Opener {
    type Device = V4l2Device;

    fn open(&self, path: &Path) -> io::Result<V4l2Device> {
        V4l2Device::open(path)
    }
}
