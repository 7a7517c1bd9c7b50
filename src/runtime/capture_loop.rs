//! Per-camera steady-state loop.

use super::cycle::{record_outcome, upload_frame, CycleError};
use super::stop::StopSignal;
use crate::capture::{CaptureDevice, CaptureSession, FrameAcquirer};
use crate::config::CameraConfig;
use crate::metrics::CameraMetrics;
use crate::upload::Uploader;
use std::time::Duration;

/// Where a [`CaptureLoop`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Between cycles, waiting for the interval.
    Idle,
    /// Waiting on the device for a frame.
    Capturing,
    /// Streaming the frame to the uploader.
    Uploading,
    /// Terminal. The session has been closed.
    Stopped,
}

/// Counts gathered by a loop over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    /// Camera the loop ran for.
    pub camera: String,
    /// Cycles run: the startup snapshot plus one per completed wait.
    pub cycles: u64,
    /// Frames uploaded.
    pub uploads: u64,
    /// Cycles that produced no frame.
    pub capture_failures: u64,
    /// Frames captured but not delivered.
    pub upload_failures: u64,
}

/// Captures and uploads one camera's frames until stopped.
///
/// A snapshot is taken as soon as the loop starts, then one per interval.
/// Failures never end the loop. The stop signal is only looked at while
/// waiting for the next interval, so a capture or upload in progress
/// always runs to completion.
pub struct CaptureLoop<'u, D: CaptureDevice, U: Uploader + ?Sized> {
    session: CaptureSession<D>,
    config: CameraConfig,
    uploader: &'u U,
    acquirer: FrameAcquirer,
    interval: Duration,
    stop: StopSignal,
    metrics: Option<CameraMetrics>,
    state: LoopState,
    report: LoopReport,
}

impl<'u, D, U> CaptureLoop<'u, D, U>
where
    D: CaptureDevice,
    U: Uploader + ?Sized,
{
    /// Creates a loop over a ready session.
    pub fn new(
        session: CaptureSession<D>,
        config: CameraConfig,
        uploader: &'u U,
        interval: Duration,
        stop: StopSignal,
    ) -> Self {
        let report = LoopReport {
            camera: config.name.clone(),
            ..LoopReport::default()
        };
        Self {
            session,
            config,
            uploader,
            acquirer: FrameAcquirer::new(),
            interval,
            stop,
            metrics: None,
            state: LoopState::Idle,
            report,
        }
    }

    /// Replaces the frame acquirer.
    pub fn with_acquirer(mut self, acquirer: FrameAcquirer) -> Self {
        self.acquirer = acquirer;
        self
    }

    /// Records every cycle into `metrics`.
    pub fn with_metrics(mut self, metrics: CameraMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counts so far.
    pub fn report(&self) -> &LoopReport {
        &self.report
    }

    /// The session being captured from.
    pub fn session(&self) -> &CaptureSession<D> {
        &self.session
    }

    /// Runs one capture and upload without waiting, updating the report.
    pub fn run_cycle(&mut self) -> Result<usize, CycleError> {
        let outcome = self.cycle();
        self.state = LoopState::Idle;
        self.report.cycles += 1;

        match &outcome {
            Ok(bytes) => {
                self.report.uploads += 1;
                tracing::debug!(camera = %self.config.name, bytes, "Frame updated");
            }
            Err(CycleError::Capture(e)) => {
                self.report.capture_failures += 1;
                tracing::warn!(camera = %self.config.name, error = %e, "Capture failed");
            }
            Err(CycleError::Upload(e)) => {
                self.report.upload_failures += 1;
                tracing::warn!(camera = %self.config.name, error = %e, "Upload failed");
            }
        }
        if let Some(metrics) = &self.metrics {
            record_outcome(metrics, &outcome);
        }
        outcome
    }

    fn cycle(&mut self) -> Result<usize, CycleError> {
        self.state = LoopState::Capturing;
        let frame = self.acquirer.capture(&mut self.session)?;

        self.state = LoopState::Uploading;
        upload_frame(&frame, &self.config, self.uploader)?;
        Ok(frame.len())
    }

    /// Uploads a first snapshot, then loops until the stop signal fires
    /// and closes the session.
    pub fn run(mut self) -> LoopReport {
        tracing::info!(
            camera = %self.config.name,
            interval_secs = self.interval.as_secs(),
            "Capture loop started"
        );

        // Failures are already logged and counted.
        let _ = self.run_cycle();
        while !self.stop.wait_timeout(self.interval) {
            let _ = self.run_cycle();
        }

        self.state = LoopState::Stopped;
        self.session.close();
        tracing::info!(
            camera = %self.config.name,
            cycles = self.report.cycles,
            uploads = self.report.uploads,
            "Capture loop stopped"
        );
        std::mem::take(&mut self.report)
    }
}
