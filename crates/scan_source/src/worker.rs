//! Child-process entry point: owns the serial handle and driver state,
//! emits NDJSON frames on stdout. Run only inside the re-exec'd
//! `--scan-worker` subprocess, never in the parent.

use std::io::Write;

use tracing::{error, info};

use crate::driver;
use crate::protocol::WorkerMessage;

/// Blocks for the lifetime of the worker process. Returns only on fatal
/// driver error (after emitting an `error` frame); normal shutdown is by
/// the parent killing this process, not by this function returning.
pub fn run(port: &str, baud_rate: u32) {
    // Only the supervisor (parent) may stop this process; swallow SIGINT
    // so an interactive terminal's Ctrl-C doesn't kill the worker out
    // from under a backgrounded supervisor.
    let _ = ctrlc::set_handler(|| {});

    let stdout = std::io::stdout();
    info!(port, baud_rate, "scan worker starting");

    let result = driver::run(
        port,
        baud_rate,
        || {
            send(&stdout, &WorkerMessage::Started);
            info!(port, baud_rate, "scan worker started");
        },
        |frame| {
            if frame.is_usable() {
                send(&stdout, &WorkerMessage::scan(&frame));
            }
        },
        || false,
    );

    if let Err(e) = result {
        error!(?e, "scan worker fatal error");
        send(
            &stdout,
            &WorkerMessage::Error {
                msg: e.to_string(),
            },
        );
    }
}

fn send(stdout: &std::io::Stdout, msg: &WorkerMessage) {
    let Ok(line) = serde_json::to_string(msg) else {
        return;
    };
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{line}");
    let _ = handle.flush();
}
