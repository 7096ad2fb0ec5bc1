//! Shared types and message definitions for the rover autonomy stack.

use serde::{Deserialize, Serialize};

/// A single range measurement within a scan revolution, already converted
/// to a world-relative offset at the time the frame was built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Angle in degrees, normalized to [-180, 180].
    pub angle_deg: f64,
    /// Range in meters.
    pub distance_m: f64,
    /// Cartesian offset from the sensor, x axis.
    pub x_m: f64,
    /// Cartesian offset from the sensor, y axis.
    pub y_m: f64,
}

/// One full revolution of range data from the Scan Source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanFrame {
    /// Monotonic timestamp in seconds.
    pub timestamp: f64,
    pub points: Vec<ScanPoint>,
}

impl ScanFrame {
    /// Frames with fewer than this many points are not worth integrating.
    pub const MIN_POINTS: usize = 5;

    pub fn is_usable(&self) -> bool {
        self.points.len() >= Self::MIN_POINTS
    }
}

/// 2D pose in the world frame (meters, radians).
///
/// x is rightward, y is forward; heading 0 faces +y, positive is
/// counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

/// A target point in the world frame held by the exploration planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

/// Rotation sense of one drive side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
    #[default]
    Stop,
}

impl Direction {
    /// Direction implied by the sign of a signed command value.
    pub fn from_signed(v: i32) -> Self {
        match v.cmp(&0) {
            std::cmp::Ordering::Greater => Direction::Forward,
            std::cmp::Ordering::Less => Direction::Backward,
            std::cmp::Ordering::Equal => Direction::Stop,
        }
    }
}

/// Commanded state of one drive side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub direction: Direction,
    /// 0..=100
    pub speed: u8,
}

impl MotorState {
    pub fn stopped() -> Self {
        Self::default()
    }
}

/// Both drive sides, as sent to the external actuator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: MotorState,
    pub right: MotorState,
}

/// Supervisor operating mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Idle,
    Manual,
    Mapping,
    Navigation,
    Exploration,
}

/// Exploration strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExploreMode {
    #[default]
    Explore,
    Coverage,
    Boundary,
    Corners,
    Return,
}

/// Short scripted motion run directly through the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SpinLeft,
    SpinRight,
    Wiggle,
    Spin360,
    Spin180,
}

/// Summary of a saved map, as held in its sidecar metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSummary {
    pub name: String,
    pub filename: String,
    pub saved: String,
    pub stats: GridStats,
    pub room_bounds: Option<RoomBounds>,
}

/// Snapshot of occupancy-grid coverage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    pub free_cells: usize,
    pub occupied_cells: usize,
    pub unknown_cells: usize,
    pub explored_pct: f64,
    pub resolution_m: f64,
    pub size_m: f64,
    pub wall_count: usize,
    pub corner_count: usize,
}

/// World-frame bounding box of all occupied cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// An axis-aligned run of occupied cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// A point shared by a horizontal and a vertical wall run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub x: f64,
    pub y: f64,
}

/// A clustered frontier (boundary between explored and unknown space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frontier {
    pub x: f64,
    pub y: f64,
    pub size: usize,
}

/// Events accepted from a remote UI/operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    Joystick { x: f64, y: f64 },
    EmergencyStop,
    StartAction { action: ActionType },
    StopAction,
    StartMapping,
    StopMapping,
    StartNavigation,
    StopNavigation,
    StartExploration { mode: ExploreMode },
    StopExploration,
    SetExploreMode { mode: ExploreMode },
    ReturnToStart,
    SaveMap { name: String },
    LoadMap { name: String },
    DeleteMap { name: String },
    ListMaps,
}

/// Events published to remote UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    MotorStatus {
        motor_a: MotorState,
        motor_b: MotorState,
    },
    MapData {
        points: Vec<ScanPoint>,
        point_count: usize,
        timestamp: f64,
    },
    GridUpdate {
        grid: Vec<u8>,
        resolution: f64,
        size_m: f64,
        origin: usize,
        stats: GridStats,
        pose: Pose,
        path: Vec<Waypoint>,
    },
    LidarState {
        mapping: bool,
        navigating: bool,
        exploring: bool,
        available: bool,
    },
    NavStatus {
        action: String,
        speed: i32,
        steering: i32,
        sector_distances: Vec<u32>,
        best_sector: Option<usize>,
    },
    ExploreStatus {
        mode: ExploreMode,
        complete: bool,
        explored_pct: f64,
        scan_count: u64,
        waypoints_total: usize,
        waypoints_done: usize,
        wall_count: usize,
        corner_count: usize,
    },
    MapSaved {
        name: String,
    },
    MapLoaded {
        name: String,
    },
    MapDeleted {
        name: String,
    },
    MapList {
        maps: Vec<MapSummary>,
    },
    Error {
        message: String,
    },
}
