//! Rover autonomy daemon entry point.

mod config;
mod supervisor;

use anyhow::Result;
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Args, FileConfig, RuntimeConfig};
use supervisor::Supervisor;

const STATUS_BUS_CAPACITY: usize = 256;
const CONTROL_QUEUE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // The scan worker re-exec bypasses clap entirely: it isn't a declared
    // subcommand, just a recognized leading argument to this same binary.
    let mut raw_args = std::env::args();
    let exe = raw_args.next();
    if raw_args.next().as_deref() == Some(scan_source::WORKER_ARG) {
        let port = raw_args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
        let baud: u32 = raw_args.next().and_then(|s| s.parse().ok()).unwrap_or(115200);
        let _ = exe;
        scan_source::run_worker(&port, baud);
        return Ok(());
    }

    let args = Args::parse();

    // The _guard must be held for the program's lifetime so logs flush.
    let _log_guard = init_logging(&args.log_dir, &args.log_level)?;

    let file_config = FileConfig::load(&args.config)?;
    info!(path = %args.config.display(), "loaded config");

    let runtime_config = RuntimeConfig::merge(&args, &file_config);
    info!(
        lidar_port = %runtime_config.lidar_port,
        grid_size_m = runtime_config.grid_size_m,
        "starting roverd"
    );

    let (status_tx, _status_rx) = broadcast::channel(STATUS_BUS_CAPACITY);
    // The transport that would feed real ControlEvents into `control_tx`
    // (a websocket/IPC server) is outside this system's scope; holding the
    // sender here just keeps the channel open so the supervisor runs.
    let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
    let _control_tx = control_tx;

    let mut supervisor = Supervisor::new(runtime_config, status_tx)?;
    match supervisor.start_scan_source() {
        Ok(true) => info!("scan source online"),
        Ok(false) => tracing::warn!("scan source failed to start; lidar-dependent modes disabled"),
        Err(e) => tracing::warn!(?e, "scan source failed to spawn"),
    }

    supervisor.run(control_rx).await;
    Ok(())
}

/// Initialize logging with stdout and rolling file output.
///
/// Returns a guard that must be held for the lifetime of the program to
/// ensure logs are properly flushed on shutdown.
fn init_logging(
    log_dir: &std::path::Path,
    level: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "roverd.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roverd={level}")));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
