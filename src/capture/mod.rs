//! Camera discovery, setup and frame capture.
//!
//! A camera goes through three stages: its name is resolved to a device
//! node ([`DeviceResolver`]), the node is brought to streaming with a
//! single mapped buffer ([`CaptureSession`]), and frames are then pulled
//! one at a time ([`FrameAcquirer`]). The device itself sits behind the
//! [`CaptureDevice`] trait so the same session logic drives the V4L2
//! backend and [`MockDevice`].

mod acquire;
mod device;
mod error;
mod format;
mod frame;
mod mock;
mod resolver;
mod session;

#[cfg(all(feature = "camera", target_os = "linux"))]
mod v4l2;

pub use acquire::{FrameAcquirer, CAPTURE_TIMEOUT};
pub use device::{CaptureBuffer, CaptureDevice, Dequeued, DeviceOpener};
pub use error::{CaptureError, SetupError};
pub use format::{
    select_frame_size, FrameSize, NegotiatedFormat, ParseResolutionError, PixelFormat,
    Resolution, SizeSelection,
};
pub use frame::FrameView;
pub use mock::{MockDevice, MockFrame, MockOpener, MockProbe};
pub use resolver::{
    select_device, DeviceCatalog, DeviceEntry, DeviceResolver, SysfsCatalog, SYSFS_VIDEO_CLASS,
};
pub use session::{CaptureSession, SessionState, CAPTURE_PIXEL_FORMAT};

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use v4l2::{V4l2Device, V4l2Opener};
