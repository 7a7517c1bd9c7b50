//! Running the cameras.
//!
//! All cameras are initialized up front on the calling thread; one
//! failure aborts startup before any loop runs. After that either every
//! camera captures once ([`Runner::run_oneshot`]) or each camera gets its
//! own [`CaptureLoop`] under a [`Supervisor`] until the shared
//! [`StopSignal`] fires.

mod capture_loop;
mod cycle;
mod fleet;
mod stop;

pub use capture_loop::{CaptureLoop, LoopReport, LoopState};
pub use cycle::{capture_and_upload, upload_frame, CycleError};
pub use fleet::{
    initialize, run_oneshot, CameraOutcome, CameraUnit, OneshotReport, Runner, Supervisor,
};
pub use stop::StopSignal;

use crate::capture::SetupError;
use crate::config::ConfigError;
use thiserror::Error;

/// Errors that end the process.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize camera '{camera}': {source}")]
    Init {
        camera: String,
        #[source]
        source: SetupError,
    },

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
