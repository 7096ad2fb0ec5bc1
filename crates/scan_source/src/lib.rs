//! Parent-side handle to the isolated LiDAR worker process.
//!
//! The worker is the same compiled binary, re-invoked with a hidden
//! `--scan-worker` subcommand (see [`run_worker`]); driver crashes land
//! in that child, never in this process.

pub mod driver;
pub mod protocol;
pub mod worker;

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use types::ScanFrame;

use protocol::WorkerMessage;

/// Hidden subcommand argument recognized by [`run_worker`]'s caller.
pub const WORKER_ARG: &str = "--scan-worker";

const STARTED_TIMEOUT: Duration = Duration::from_secs(15);
const KILL_ESCALATION: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ScanSourceError {
    #[error("failed to spawn scan worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("scan worker handshake timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct ScanSourceConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for ScanSourceConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115200,
        }
    }
}

/// Parent-side handle. Spawns and supervises the worker child process
/// and exposes a non-blocking "latest frame" view.
pub struct ScanSource {
    config: ScanSourceConfig,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    latest: Arc<Mutex<Option<ScanFrame>>>,
    available: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl ScanSource {
    pub fn new(config: ScanSourceConfig) -> Self {
        Self {
            config,
            child: None,
            reader: None,
            latest: Arc::new(Mutex::new(None)),
            available: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the worker and block for up to 15s for its `started`
    /// handshake. Returns `Err(ScanSourceError::Timeout)` (with full
    /// cleanup) if the handshake doesn't arrive in time, or `Ok(false)`
    /// on early child exit.
    pub fn start(&mut self) -> Result<bool, ScanSourceError> {
        let exe = std::env::current_exe()?;
        let mut child = Command::new(exe)
            .arg(WORKER_ARG)
            .arg(&self.config.port)
            .arg(self.config.baud_rate.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdout = child.stdout.take().expect("piped stdout");
        let (started_tx, started_rx) = sync_channel::<()>(8);

        let latest = Arc::clone(&self.latest);
        let available = Arc::clone(&self.available);
        let last_error = Arc::clone(&self.last_error);
        let reader = std::thread::spawn(move || {
            reader_loop(stdout, latest, available, last_error, started_tx);
        });

        match started_rx.recv_timeout(STARTED_TIMEOUT) {
            Ok(()) => {
                self.available.store(true, Ordering::SeqCst);
                self.child = Some(child);
                self.reader = Some(reader);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("scan worker handshake timed out");
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                Err(ScanSourceError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("scan worker exited before handshake");
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                Ok(false)
            }
        }
    }

    /// Terminate the worker (SIGTERM, escalating to SIGKILL after 2s),
    /// join the reader, and reset all handles.
    pub fn stop(&mut self) {
        self.available.store(false, Ordering::SeqCst);
        if let Some(mut child) = self.child.take() {
            let pid = child.id() as i32;
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
            let deadline = Instant::now() + KILL_ESCALATION;
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() >= deadline => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                    Err(_) => break,
                }
            }
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        *self.latest.lock().unwrap() = None;
        info!("scan source stopped");
    }

    /// Most recent completed frame, if any has arrived since the worker
    /// started (or since the last call, if the caller wants edge-style
    /// consumption it should track staleness itself via the frame's own
    /// timestamp).
    pub fn latest_frame(&self) -> Option<ScanFrame> {
        self.latest.lock().unwrap().clone()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

impl Drop for ScanSource {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.stop();
        }
    }
}

fn reader_loop(
    stdout: std::process::ChildStdout,
    latest: Arc<Mutex<Option<ScanFrame>>>,
    available: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    started_tx: SyncSender<()>,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(Ok(line)) = lines.next() {
        let Ok(msg) = serde_json::from_str::<WorkerMessage>(&line) else {
            continue;
        };
        match msg {
            WorkerMessage::Started => {
                let _ = started_tx.try_send(());
            }
            WorkerMessage::Scan { .. } => {
                if let Some(frame) = msg.into_frame() {
                    *latest.lock().unwrap() = Some(frame);
                }
            }
            WorkerMessage::Error { msg } => {
                warn!(%msg, "scan worker reported fatal error");
                *last_error.lock().unwrap() = Some(msg);
                available.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// Entry point for the hidden `--scan-worker` subcommand. The host
/// binary's `main` should check `std::env::args()` for [`WORKER_ARG`]
/// and call this instead of running the supervisor.
pub fn run_worker(port: &str, baud_rate: u32) {
    worker::run(port, baud_rate);
}
