//! NDJSON messages exchanged between the scan-source child and its
//! parent handle over the child's stdout.

use serde::{Deserialize, Serialize};
use types::ScanFrame;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Started,
    Scan {
        timestamp: f64,
        point_count: usize,
        points: Vec<types::ScanPoint>,
    },
    Error {
        msg: String,
    },
}

impl WorkerMessage {
    pub fn scan(frame: &ScanFrame) -> Self {
        WorkerMessage::Scan {
            timestamp: frame.timestamp,
            point_count: frame.points.len(),
            points: frame.points.clone(),
        }
    }

    pub fn into_frame(self) -> Option<ScanFrame> {
        match self {
            WorkerMessage::Scan {
                timestamp, points, ..
            } => Some(ScanFrame { timestamp, points }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_roundtrip() {
        let line = serde_json::to_string(&WorkerMessage::Started).unwrap();
        assert_eq!(line, r#"{"type":"started"}"#);
        let back: WorkerMessage = serde_json::from_str(&line).unwrap();
        assert!(matches!(back, WorkerMessage::Started));
    }

    #[test]
    fn test_scan_roundtrip() {
        let frame = ScanFrame {
            timestamp: 1.5,
            points: vec![types::ScanPoint {
                angle_deg: 0.0,
                distance_m: 1.0,
                x_m: 1.0,
                y_m: 0.0,
            }],
        };
        let msg = WorkerMessage::scan(&frame);
        let line = serde_json::to_string(&msg).unwrap();
        let back: WorkerMessage = serde_json::from_str(&line).unwrap();
        let back_frame = back.into_frame().unwrap();
        assert_eq!(back_frame.points.len(), 1);
        assert_eq!(back_frame.timestamp, 1.5);
    }

    #[test]
    fn test_error_roundtrip() {
        let msg = WorkerMessage::Error {
            msg: "serial disconnected".into(),
        };
        let line = serde_json::to_string(&msg).unwrap();
        let back: WorkerMessage = serde_json::from_str(&line).unwrap();
        assert!(matches!(back, WorkerMessage::Error { .. }));
    }
}
