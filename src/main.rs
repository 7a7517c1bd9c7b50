//! camsnap CLI
//!
//! Loads the config, brings every camera up and then either uploads one
//! frame per camera (`--oneshot`) or keeps uploading on the configured
//! interval until SIGINT/SIGTERM.

use camsnap::{
    capture::{DeviceOpener, SysfsCatalog},
    config::Config,
    metrics::MetricsRegistry,
    runtime::{RunError, Runner, StopSignal},
    upload::HttpUploader,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camsnap")]
#[command(version, about = "Capture still frames from V4L2 cameras and upload them")]
struct Cli {
    /// Enable diagnostic logging
    #[arg(short, long)]
    verbose: bool,

    /// Capture and upload one frame per camera, then exit
    #[arg(short, long)]
    oneshot: bool,

    /// Serve Prometheus metrics on this port while looping
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Config file [default: config.toml next to the executable]
    config: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("camsnap v{}", camsnap::VERSION);

    #[cfg(all(feature = "camera", target_os = "linux"))]
    let result = run(&cli, &camsnap::capture::V4l2Opener);
    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    let result: Result<bool, RunError> = {
        error!("camsnap was built without camera support");
        Ok(false)
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the run finished but some camera failed.
#[cfg_attr(not(all(feature = "camera", target_os = "linux")), allow(dead_code))]
fn run<O>(cli: &Cli, opener: &O) -> Result<bool, RunError>
where
    O: DeviceOpener,
    O::Device: Send,
{
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    debug!(path = %path.display(), "Using config");
    let config = Config::load(&path)?;

    let catalog = SysfsCatalog::default();
    let uploader = HttpUploader::new();
    let mut runner = Runner::new(&config, opener, &catalog, &uploader);

    let metrics = match MetricsRegistry::new() {
        Ok(registry) => Some(registry),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };
    if let Some(registry) = &metrics {
        runner = runner.with_metrics(registry.clone());
    }

    if cli.oneshot {
        let report = runner.run_oneshot()?;
        if !report.all_succeeded() {
            error!(
                failed = report.failures(),
                cameras = report.outcomes.len(),
                "Oneshot finished with failures"
            );
        }
        return Ok(report.all_succeeded());
    }

    start_metrics_server(cli, metrics.as_ref());

    let stop = StopSignal::new();
    stop.install_handler()?;

    let reports = runner.run_continuous(&stop)?;
    for report in &reports {
        info!(
            camera = %report.camera,
            cycles = report.cycles,
            uploads = report.uploads,
            capture_failures = report.capture_failures,
            upload_failures = report.upload_failures,
            "Loop summary"
        );
    }
    Ok(true)
}

#[cfg(feature = "metrics")]
fn start_metrics_server(cli: &Cli, metrics: Option<&MetricsRegistry>) {
    use camsnap::metrics::{MetricsServer, MetricsServerConfig};

    if let (Some(port), Some(registry)) = (cli.metrics_port, metrics) {
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry.clone());
        if let Err(e) = server.spawn() {
            warn!(error = %e, port, "Metrics server not started");
        }
    }
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(_cli: &Cli, _metrics: Option<&MetricsRegistry>) {}
