//! End-to-end runs against mock devices and a mock uploader.

use camsnap::capture::{MockDevice, MockFrame, MockOpener, SetupError, SysfsCatalog};
use camsnap::config::{default_fingerprint, CameraConfig, Config};
use camsnap::metrics::MetricsRegistry;
use camsnap::runtime::{RunError, Runner, StopSignal};
use camsnap::upload::MockUploader;
use camsnap::FrameAcquirer;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A sysfs-shaped tree: `<root>/class/<id>/name` plus a `<root>/dev` prefix.
fn fake_sysfs(devices: &[(&str, &str)]) -> (TempDir, SysfsCatalog) {
    let root = tempfile::tempdir().unwrap();
    for (id, name) in devices {
        let dir = root.path().join("class").join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{name}\n")).unwrap();
    }
    fs::create_dir_all(root.path().join("class")).unwrap();
    let catalog = SysfsCatalog::new(root.path().join("class"), root.path().join("dev"));
    (root, catalog)
}

fn dev(root: &Path, id: &str) -> PathBuf {
    root.join("dev").join(id)
}

fn config(interval: Duration, cameras: Vec<CameraConfig>) -> Config {
    Config {
        refresh_rate: interval,
        cameras,
    }
}

/// Stops `stop` once `done` holds or after a generous deadline.
fn stop_when(stop: &StopSignal, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    stop.stop();
}

#[test]
fn test_one_failed_camera_prevents_every_loop() {
    let (root, catalog) = fake_sysfs(&[("video0", "Printer Cam")]);
    let good = MockDevice::new();
    let good_probe = good.probe();
    let opener = MockOpener::new();
    opener.insert(dev(root.path(), "video0"), good);

    let config = config(
        Duration::from_millis(5),
        vec![
            CameraConfig::new("Printer", "t1"),
            CameraConfig::new("Nozzle", "t2"),
        ],
    );
    let uploader = MockUploader::new();
    let stop = StopSignal::new();

    let result = Runner::new(&config, &opener, &catalog, &uploader).run_continuous(&stop);

    match result {
        Err(RunError::Init { camera, source }) => {
            assert_eq!(camera, "Nozzle");
            assert!(matches!(source, SetupError::DeviceNotFound { .. }));
        }
        other => panic!("expected init failure, got {:?}", other.map(|r| r.len())),
    }
    assert_eq!(uploader.attempts(), 0);
    assert_eq!(good_probe.enqueues(), 0);
    assert_eq!(good_probe.releases(), 1);
}

#[test]
fn test_oneshot_captures_and_uploads_once_per_camera() {
    let (root, catalog) = fake_sysfs(&[
        ("video0", "Printer Cam"),
        ("video1", "Printer Cam"),
        ("video2", "Nozzle Cam"),
    ]);
    let printer = MockDevice::new().with_script([MockFrame::Data(vec![1; 10])]);
    let nozzle = MockDevice::new().with_script([MockFrame::Data(vec![2; 20])]);
    let (printer_probe, nozzle_probe) = (printer.probe(), nozzle.probe());
    let opener = MockOpener::new();
    opener.insert(dev(root.path(), "video0"), printer);
    opener.insert(dev(root.path(), "video2"), nozzle);

    let config = config(
        Duration::from_secs(30),
        vec![
            CameraConfig::new("Printer", "t1"),
            CameraConfig::new("Nozzle", "t2").with_endpoint("http://example.invalid/n"),
        ],
    );
    let uploader = MockUploader::new();
    let registry = MetricsRegistry::new().unwrap();

    let report = Runner::new(&config, &opener, &catalog, &uploader)
        .with_metrics(registry.clone())
        .run_oneshot()
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.outcomes.len(), 2);
    for probe in [&printer_probe, &nozzle_probe] {
        assert_eq!(probe.enqueues(), 1);
        assert_eq!(probe.dequeues(), 1);
        assert_eq!(probe.releases(), 1);
    }

    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].body, vec![1; 10]);
    assert_eq!(uploads[0].token, "t1");
    assert_eq!(uploads[0].fingerprint, default_fingerprint("Printer"));
    assert_eq!(uploads[1].body, vec![2; 20]);
    assert_eq!(uploads[1].endpoint, "http://example.invalid/n");
    assert_eq!(registry.camera("Nozzle").uploads(), 1);
}

#[test]
fn test_oneshot_failure_is_reported_not_fatal() {
    let (root, catalog) = fake_sysfs(&[("video0", "A"), ("video1", "B")]);
    let opener = MockOpener::new();
    opener.insert(dev(root.path(), "video0"), MockDevice::new().with_script([MockFrame::Timeout]));
    opener.insert(dev(root.path(), "video1"), MockDevice::new());

    let config = config(
        Duration::from_secs(30),
        vec![CameraConfig::new("A", "t"), CameraConfig::new("B", "t")],
    );
    let uploader = MockUploader::new();

    let report = Runner::new(&config, &opener, &catalog, &uploader)
        .with_acquirer(FrameAcquirer::with_timeout(Duration::from_millis(1)))
        .run_oneshot()
        .unwrap();

    assert_eq!(report.failures(), 1);
    assert_eq!(report.outcomes[0].camera, "A");
    assert!(report.outcomes[1].result.is_ok());
    assert_eq!(uploader.uploads().len(), 1);
}

#[test]
fn test_loops_survive_failures_until_stopped() {
    let (root, catalog) = fake_sysfs(&[("video0", "Printer Cam"), ("video3", "Nozzle Cam")]);
    let printer = MockDevice::new().with_script([MockFrame::Timeout, MockFrame::Error]);
    let nozzle = MockDevice::new();
    let (printer_probe, nozzle_probe) = (printer.probe(), nozzle.probe());
    let opener = MockOpener::new();
    opener.insert(dev(root.path(), "video0"), printer);
    opener.insert(dev(root.path(), "video3"), nozzle);

    let config = config(
        Duration::from_millis(5),
        vec![
            CameraConfig::new("Printer", "t1"),
            CameraConfig::new("Nozzle", "t2"),
        ],
    );
    let uploader = MockUploader::failing_first(3);
    let stop = StopSignal::new();

    let reports = thread::scope(|scope| {
        scope.spawn(|| stop_when(&stop, || uploader.uploads().len() >= 6));
        Runner::new(&config, &opener, &catalog, &uploader)
            .with_acquirer(FrameAcquirer::with_timeout(Duration::from_millis(1)))
            .run_continuous(&stop)
            .unwrap()
    });

    assert_eq!(reports.len(), 2);
    let printer = reports.iter().find(|r| r.camera == "Printer").unwrap();
    assert_eq!(printer.capture_failures, 2);

    let upload_failures: u64 = reports.iter().map(|r| r.upload_failures).sum();
    let uploads: u64 = reports.iter().map(|r| r.uploads).sum();
    assert_eq!(upload_failures, 3);
    assert!(uploads >= 6);

    assert_eq!(printer_probe.releases(), 1);
    assert_eq!(nozzle_probe.releases(), 1);
}

#[test]
fn test_stop_before_start_still_uploads_startup_snapshot() {
    let (root, catalog) = fake_sysfs(&[("video0", "Cam")]);
    let device = MockDevice::new();
    let probe = device.probe();
    let opener = MockOpener::new();
    opener.insert(dev(root.path(), "video0"), device);

    let config = config(Duration::from_secs(30), vec![CameraConfig::new("Cam", "t")]);
    let uploader = MockUploader::new();
    let stop = StopSignal::new();
    stop.stop();

    let reports = Runner::new(&config, &opener, &catalog, &uploader)
        .run_continuous(&stop)
        .unwrap();

    assert_eq!(reports[0].cycles, 1);
    assert_eq!(uploader.attempts(), 1);
    assert_eq!(probe.releases(), 1);
}

#[test]
fn test_continuous_run_uploads_at_startup_without_waiting_an_interval() {
    let (root, catalog) = fake_sysfs(&[("video0", "Printer Cam"), ("video1", "Nozzle Cam")]);
    let opener = MockOpener::new();
    opener.insert(dev(root.path(), "video0"), MockDevice::new());
    opener.insert(dev(root.path(), "video1"), MockDevice::new());

    let config = config(
        Duration::from_secs(30),
        vec![
            CameraConfig::new("Printer", "t1"),
            CameraConfig::new("Nozzle", "t2"),
        ],
    );
    let uploader = MockUploader::new();
    let stop = StopSignal::new();
    let started = Instant::now();

    let reports = thread::scope(|scope| {
        scope.spawn(|| stop_when(&stop, || uploader.uploads().len() >= 2));
        Runner::new(&config, &opener, &catalog, &uploader)
            .run_continuous(&stop)
            .unwrap()
    });

    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(uploader.uploads().len(), 2);
    for report in &reports {
        assert_eq!(report.cycles, 1);
        assert_eq!(report.uploads, 1);
    }
    let mut tokens: Vec<_> = uploader.uploads().into_iter().map(|u| u.token).collect();
    tokens.sort();
    assert_eq!(tokens, ["t1", "t2"]);
}
