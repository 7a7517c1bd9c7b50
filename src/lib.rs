//! Camera Snapshot Uploader Library
//!
//! Periodically grabs still frames from Video4Linux2 cameras and uploads
//! each one to a snapshot endpoint together with the camera's token and
//! fingerprint.
//!
//! # Architecture
//!
//! ```text
//! config → capture (resolve → session → acquire) → upload
//!                          ↑
//!        runtime (oneshot | one loop per camera, stop signal)
//! ```
//!
//! # Design Principles
//!
//! - **All or nothing startup**: every camera is brought to streaming
//!   before any capture runs; one failure aborts the process
//! - **Never give up at runtime**: capture and upload failures are logged
//!   and retried on the next interval
//! - **Zero-copy frames**: uploads stream straight out of the mapped
//!   kernel buffer
//!
//! # Example
//!
//! ```
//! use camsnap::{
//!     capture::{MockDevice, MockOpener, SysfsCatalog},
//!     config::Config,
//!     runtime::Runner,
//!     upload::MockUploader,
//! };
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     [[camera]]
//!     name = "printer"
//!     dev = "/dev/video0"
//!     token = "secret"
//!     "#,
//! )
//! .unwrap();
//!
//! let opener = MockOpener::new();
//! opener.insert("/dev/video0", MockDevice::new());
//! let uploader = MockUploader::new();
//!
//! let report = Runner::new(&config, &opener, &SysfsCatalog::default(), &uploader)
//!     .run_oneshot()
//!     .unwrap();
//! assert!(report.all_succeeded());
//! assert_eq!(uploader.uploads().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod metrics;
pub mod runtime;
pub mod upload;

// Re-export commonly used types at crate root
pub use capture::{CaptureSession, DeviceResolver, FrameAcquirer, FrameView, SysfsCatalog};
pub use config::{CameraConfig, Config};
pub use runtime::{CaptureLoop, RunError, Runner, StopSignal, Supervisor};
pub use upload::{HttpUploader, Uploader};

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use capture::V4l2Opener;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
