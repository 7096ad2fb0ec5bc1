//! RPLidar A1 serial protocol, adapted to emit [`types::ScanFrame`]s
//! directly rather than a dense per-degree array.

use std::io::{Read, Write};
use std::time::Duration;

use tokio_serial::SerialPort;
use tracing::{debug, error, trace};
use types::{ScanFrame, ScanPoint};

const CMD_SCAN: [u8; 2] = [0xA5, 0x20];
const CMD_STOP: [u8; 2] = [0xA5, 0x25];
const CMD_RESET: [u8; 2] = [0xA5, 0x40];
const PACKET_SIZE: usize = 5;

#[derive(Debug, Clone, Copy)]
struct MeasurementPoint {
    start: bool,
    quality: u8,
    angle_deg: f64,
    distance_m: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("serial port error: {0}")]
    Serial(String),
}

/// Blocking read loop. Calls `on_frame` once per completed revolution
/// with at least one valid point; returns on fatal I/O error.
pub fn run(
    port: &str,
    baud_rate: u32,
    on_started: impl FnOnce(),
    mut on_frame: impl FnMut(ScanFrame),
    should_stop: impl Fn() -> bool,
) -> Result<(), DriverError> {
    let mut serial = tokio_serial::new(port, baud_rate)
        .timeout(Duration::from_secs(2))
        .open_native()
        .map_err(|e| DriverError::Serial(e.to_string()))?;

    serial
        .write_all(&CMD_RESET)
        .map_err(|e| DriverError::Serial(e.to_string()))?;
    std::thread::sleep(Duration::from_millis(100));
    let _ = serial.clear(tokio_serial::ClearBuffer::All);

    serial
        .write_all(&CMD_SCAN)
        .map_err(|e| DriverError::Serial(e.to_string()))?;
    serial.flush().map_err(|e| DriverError::Serial(e.to_string()))?;

    // Port is open and scanning is turned on; safe to report success now.
    on_started();

    let mut packet_buf = [0u8; PACKET_SIZE];
    let mut accumulated: Vec<MeasurementPoint> = Vec::with_capacity(360);
    let mut frame_start_secs = now_secs();

    while !should_stop() {
        match serial.read_exact(&mut packet_buf) {
            Ok(()) => match parse_packet(&packet_buf) {
                Ok(point) => {
                    if point.start && !accumulated.is_empty() {
                        let frame = build_frame(std::mem::take(&mut accumulated), frame_start_secs);
                        debug!(points = frame.points.len(), "completed scan frame");
                        on_frame(frame);
                        frame_start_secs = now_secs();
                    }
                    if point.distance_m > 0.0 && point.quality > 0 {
                        accumulated.push(point);
                    }
                }
                Err(e) => trace!(?e, "failed to parse packet"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                error!(?e, "lidar read error");
                let _ = serial.write_all(&CMD_STOP);
                return Err(DriverError::Serial(e.to_string()));
            }
        }
    }

    let _ = serial.write_all(&CMD_STOP);
    Ok(())
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Byte 0: quality (bits 7-2), start flag (bit 0).
/// Bytes 1-2: angle in 1/64 degree increments.
/// Bytes 3-4: distance in 1/4 mm increments.
fn parse_packet(packet: &[u8; PACKET_SIZE]) -> Result<MeasurementPoint, DriverError> {
    let start = (packet[0] & 0x01) != 0;
    let quality = (packet[0] >> 2) & 0x3F;

    let angle_raw = (packet[2] as u16) << 8 | packet[1] as u16;
    let angle_deg = (angle_raw as f64) / 64.0;

    let distance_raw = (packet[4] as u16) << 8 | packet[3] as u16;
    let distance_m = (distance_raw as f64) / 4000.0;

    Ok(MeasurementPoint {
        start,
        quality,
        angle_deg,
        distance_m,
    })
}

fn build_frame(points: Vec<MeasurementPoint>, timestamp: f64) -> ScanFrame {
    let mut points: Vec<ScanPoint> = points
        .into_iter()
        .map(|p| {
            let normalized = if p.angle_deg > 180.0 {
                p.angle_deg - 360.0
            } else {
                p.angle_deg
            };
            let rad = normalized.to_radians();
            ScanPoint {
                angle_deg: normalized,
                distance_m: p.distance_m,
                x_m: p.distance_m * rad.cos(),
                y_m: p.distance_m * rad.sin(),
            }
        })
        .collect();
    points.sort_by(|a, b| a.angle_deg.partial_cmp(&b.angle_deg).unwrap());
    ScanFrame { timestamp, points }
}
