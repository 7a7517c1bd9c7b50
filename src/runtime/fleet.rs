//! Bringing up every configured camera and running them together.

use super::capture_loop::{CaptureLoop, LoopReport};
use super::cycle::{capture_and_upload, record_outcome, CycleError};
use super::stop::StopSignal;
use super::RunError;
use crate::capture::{
    CaptureDevice, CaptureSession, DeviceCatalog, DeviceOpener, DeviceResolver, FrameAcquirer,
};
use crate::config::{CameraConfig, Config};
use crate::metrics::MetricsRegistry;
use crate::upload::Uploader;
use std::thread;
use std::time::Duration;

/// A camera whose session is streaming.
pub struct CameraUnit<D: CaptureDevice> {
    /// Settings the camera was initialized with.
    pub config: CameraConfig,
    /// Streaming session.
    pub session: CaptureSession<D>,
}

/// Resolves and initializes every camera in order.
///
/// The first failure aborts the whole startup. Sessions opened before it
/// are closed when the partial list is dropped.
pub fn initialize<O>(
    cameras: &[CameraConfig],
    opener: &O,
    catalog: &dyn DeviceCatalog,
) -> Result<Vec<CameraUnit<O::Device>>, RunError>
where
    O: DeviceOpener + ?Sized,
{
    let resolver = DeviceResolver::new(catalog);
    let mut units = Vec::with_capacity(cameras.len());

    for config in cameras {
        let session = resolver
            .device_path(config)
            .and_then(|path| CaptureSession::initialize(opener, config, &path))
            .map_err(|source| RunError::Init {
                camera: config.name.clone(),
                source,
            })?;
        units.push(CameraUnit {
            config: config.clone(),
            session,
        });
    }

    tracing::debug!(cameras = units.len(), "All cameras initialized");
    Ok(units)
}

/// Result of one camera's oneshot cycle.
#[derive(Debug)]
pub struct CameraOutcome {
    /// Camera name.
    pub camera: String,
    /// Bytes uploaded, or why the cycle failed.
    pub result: Result<usize, CycleError>,
}

/// Results of a oneshot run, in camera order.
#[derive(Debug, Default)]
pub struct OneshotReport {
    /// One entry per camera.
    pub outcomes: Vec<CameraOutcome>,
}

impl OneshotReport {
    /// Number of cameras whose cycle failed.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Returns true if every camera uploaded a frame.
    pub fn all_succeeded(&self) -> bool {
        self.failures() == 0
    }
}

/// Runs exactly one capture and upload per camera, then closes them all.
pub fn run_oneshot<D, U>(
    units: Vec<CameraUnit<D>>,
    uploader: &U,
    acquirer: &FrameAcquirer,
    metrics: Option<&MetricsRegistry>,
) -> OneshotReport
where
    D: CaptureDevice,
    U: Uploader + ?Sized,
{
    let mut report = OneshotReport::default();

    for mut unit in units {
        let result = capture_and_upload(acquirer, &mut unit.session, &unit.config, uploader);
        match &result {
            Ok(bytes) => {
                tracing::debug!(camera = %unit.config.name, bytes, "Frame updated")
            }
            Err(e) => {
                tracing::warn!(camera = %unit.config.name, error = %e, "Oneshot capture failed")
            }
        }
        if let Some(registry) = metrics {
            record_outcome(&registry.camera(&unit.config.name), &result);
        }
        unit.session.close();

        report.outcomes.push(CameraOutcome {
            camera: unit.config.name,
            result,
        });
    }

    report
}

/// Runs one [`CaptureLoop`] per camera on its own thread and joins them.
pub struct Supervisor<'u, U: Uploader + ?Sized> {
    interval: Duration,
    stop: StopSignal,
    uploader: &'u U,
    acquirer: FrameAcquirer,
    metrics: Option<MetricsRegistry>,
}

impl<'u, U: Uploader + ?Sized> Supervisor<'u, U> {
    /// Creates a supervisor sharing `stop` and `uploader` with every loop.
    pub fn new(interval: Duration, stop: StopSignal, uploader: &'u U) -> Self {
        Self {
            interval,
            stop,
            uploader,
            acquirer: FrameAcquirer::new(),
            metrics: None,
        }
    }

    /// Replaces the frame acquirer used by every camera.
    pub fn with_acquirer(mut self, acquirer: FrameAcquirer) -> Self {
        self.acquirer = acquirer;
        self
    }

    /// Records per-camera counters into `metrics`.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Blocks until every loop has stopped and returns their reports.
    ///
    /// A loop that panics is logged and left out of the reports.
    pub fn run<D>(&self, units: Vec<CameraUnit<D>>) -> Vec<LoopReport>
    where
        D: CaptureDevice + Send,
    {
        thread::scope(|scope| {
            let handles: Vec<_> = units
                .into_iter()
                .map(|unit| {
                    let camera = unit.config.name.clone();
                    let mut capture_loop = CaptureLoop::new(
                        unit.session,
                        unit.config,
                        self.uploader,
                        self.interval,
                        self.stop.clone(),
                    )
                    .with_acquirer(self.acquirer);
                    if let Some(registry) = &self.metrics {
                        capture_loop = capture_loop.with_metrics(registry.camera(&camera));
                    }
                    (camera, scope.spawn(move || capture_loop.run()))
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|(camera, handle)| match handle.join() {
                    Ok(report) => Some(report),
                    Err(_) => {
                        tracing::error!(camera = %camera, "Capture loop panicked");
                        None
                    }
                })
                .collect()
        })
    }
}

/// Wires configuration, devices and uploader together for both run modes.
pub struct Runner<'a, O: DeviceOpener + ?Sized, U: Uploader + ?Sized> {
    config: &'a Config,
    opener: &'a O,
    catalog: &'a dyn DeviceCatalog,
    uploader: &'a U,
    acquirer: FrameAcquirer,
    metrics: Option<MetricsRegistry>,
}

impl<'a, O, U> Runner<'a, O, U>
where
    O: DeviceOpener + ?Sized,
    U: Uploader + ?Sized,
{
    /// Creates a runner with the default acquirer and no metrics.
    pub fn new(
        config: &'a Config,
        opener: &'a O,
        catalog: &'a dyn DeviceCatalog,
        uploader: &'a U,
    ) -> Self {
        Self {
            config,
            opener,
            catalog,
            uploader,
            acquirer: FrameAcquirer::new(),
            metrics: None,
        }
    }

    /// Replaces the frame acquirer used by every camera.
    pub fn with_acquirer(mut self, acquirer: FrameAcquirer) -> Self {
        self.acquirer = acquirer;
        self
    }

    /// Records per-camera counters into `metrics`.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Initializes every camera, then captures and uploads once each.
    pub fn run_oneshot(&self) -> Result<OneshotReport, RunError> {
        let units = initialize(&self.config.cameras, self.opener, self.catalog)?;
        Ok(run_oneshot(
            units,
            self.uploader,
            &self.acquirer,
            self.metrics.as_ref(),
        ))
    }

    /// Initializes every camera, then loops until `stop` fires.
    ///
    /// No loop starts unless every camera initialized.
    pub fn run_continuous(&self, stop: &StopSignal) -> Result<Vec<LoopReport>, RunError>
    where
        O::Device: Send,
    {
        let units = initialize(&self.config.cameras, self.opener, self.catalog)?;

        let mut supervisor = Supervisor::new(self.config.refresh_rate, stop.clone(), self.uploader)
            .with_acquirer(self.acquirer);
        if let Some(registry) = &self.metrics {
            supervisor = supervisor.with_metrics(registry.clone());
        }
        Ok(supervisor.run(units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceEntry, MockDevice, MockFrame, MockOpener, SetupError};
    use crate::upload::MockUploader;
    use std::io;
    use std::path::PathBuf;

    struct Catalog(Vec<DeviceEntry>);

    impl DeviceCatalog for Catalog {
        fn entries(&self) -> io::Result<Vec<DeviceEntry>> {
            Ok(self.0.clone())
        }
    }

    fn catalog(names: &[(&str, &str)]) -> Catalog {
        Catalog(
            names
                .iter()
                .map(|&(id, name)| DeviceEntry {
                    id: id.to_string(),
                    name: name.to_string(),
                    path: PathBuf::from("/dev").join(id),
                })
                .collect(),
        )
    }

    #[test]
    fn test_initialize_resolves_names_and_explicit_paths() {
        let opener = MockOpener::new();
        opener.insert("/dev/video2", MockDevice::new());
        opener.insert("/dev/custom", MockDevice::new());
        let cameras = vec![
            CameraConfig::new("Logitech", "t"),
            CameraConfig::new("Other", "t").with_device("/dev/custom"),
        ];

        let catalog = catalog(&[("video2", "Logitech C920")]);
        let units = initialize(&cameras, &opener, &catalog).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].session.path(), PathBuf::from("/dev/video2"));
        assert_eq!(units[1].session.path(), PathBuf::from("/dev/custom"));
    }

    #[test]
    fn test_initialize_failure_closes_earlier_sessions() {
        let first = MockDevice::new();
        let probe = first.probe();
        let opener = MockOpener::new();
        opener.insert("/dev/video0", first);

        let cameras = vec![
            CameraConfig::new("good", "t").with_device("/dev/video0"),
            CameraConfig::new("missing", "t"),
        ];
        let result = initialize(&cameras, &opener, &catalog(&[]));

        match result {
            Err(RunError::Init { camera, source }) => {
                assert_eq!(camera, "missing");
                assert!(matches!(source, SetupError::DeviceNotFound { .. }));
            }
            _ => panic!("expected init failure"),
        }
        assert_eq!(probe.releases(), 1);
    }

    #[test]
    fn test_oneshot_reports_each_camera() {
        let opener = MockOpener::new();
        opener.insert("/dev/a", MockDevice::new());
        opener.insert("/dev/b", MockDevice::new().with_script([MockFrame::Error]));
        let cameras = vec![
            CameraConfig::new("a", "t").with_device("/dev/a"),
            CameraConfig::new("b", "t").with_device("/dev/b"),
        ];
        let units = initialize(&cameras, &opener, &catalog(&[])).unwrap();
        let uploader = MockUploader::new();

        let report = run_oneshot(units, &uploader, &FrameAcquirer::new(), None);

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].result.is_ok());
        assert!(report.outcomes[1].result.is_err());
        assert_eq!(report.failures(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(uploader.attempts(), 1);
    }
}
