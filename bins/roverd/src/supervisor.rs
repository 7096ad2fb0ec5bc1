//! Owns all mode transitions, runs the per-mode control loop, publishes
//! status events, and enforces the manual-mode safety watchdog.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use control::ActuatorMapper;
use localization::{Kinematics, PoseEstimator};
use occupancy::{MapStore, OccupancyGrid};
use planner::{
    command_to_joystick, ExploreAction, ExploreConfig, ExplorePlanner, ReactiveConfig,
    ReactivePlanner,
};
use scan_source::{ScanSource, ScanSourceConfig};
use state::{Event as ModeEvent, StateMachine};
use types::{ControlEvent, ExploreMode, Mode, MotorCommand, Pose, StatusEvent, Waypoint};

use crate::config::RuntimeConfig;

const CONTROL_PERIOD: Duration = Duration::from_millis(150);
/// Publish the full grid/pose snapshot roughly every 2 seconds, per the
/// cadence-tick resolution of the `timestamp % 2` trigger in the source.
const GRID_PUBLISH_EVERY_TICKS: u64 = 13;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub struct Supervisor {
    config: RuntimeConfig,
    state: StateMachine,
    pose: PoseEstimator,
    grid: OccupancyGrid,
    map_store: MapStore,
    reactive: ReactivePlanner,
    explore: Option<ExplorePlanner>,
    pending_explore_mode: ExploreMode,
    actuator: ActuatorMapper,
    scan: ScanSource,
    motor: MotorCommand,
    last_joystick_secs: Option<f64>,
    watchdog_applied: bool,
    action_was_active: bool,
    tick_counter: u64,
    bus_tx: broadcast::Sender<StatusEvent>,
}

impl Supervisor {
    pub fn new(config: RuntimeConfig, bus_tx: broadcast::Sender<StatusEvent>) -> anyhow::Result<Self> {
        let grid = OccupancyGrid::new(config.grid_size_m, config.grid_resolution);
        let map_store = MapStore::new(config.maps_dir.clone())?;
        let kinematics = Kinematics {
            wheel_base_m: config.wheel_base,
            max_speed_mps: config.max_speed_mps,
            motor_max_pwm: 100.0,
        };
        let reactive = ReactivePlanner::new(ReactiveConfig {
            sector_count: config.nav_sector_count,
            obstacle_threshold: config.nav_obstacle_threshold,
            speed: config.nav_speed,
            front_half: config.nav_front_sector_half,
        });
        let scan = ScanSource::new(ScanSourceConfig {
            port: config.lidar_port.clone(),
            baud_rate: config.lidar_baudrate,
        });

        Ok(Self {
            config,
            state: StateMachine::new(),
            pose: PoseEstimator::new(kinematics),
            grid,
            map_store,
            reactive,
            explore: None,
            pending_explore_mode: ExploreMode::default(),
            actuator: ActuatorMapper::new(),
            scan,
            motor: MotorCommand::default(),
            last_joystick_secs: None,
            watchdog_applied: false,
            action_was_active: false,
            tick_counter: 0,
            bus_tx,
        })
    }

    pub fn start_scan_source(&mut self) -> anyhow::Result<bool> {
        let ok = self.scan.start()?;
        self.publish_lidar_state(ok);
        Ok(ok)
    }

    /// Main event/tick loop. Runs until `control_rx` is closed.
    pub async fn run(mut self, mut control_rx: mpsc::Receiver<ControlEvent>) {
        let mut interval = tokio::time::interval(CONTROL_PERIOD);
        loop {
            tokio::select! {
                maybe_event = control_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("control channel closed, shutting down supervisor");
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
        self.scan.stop();
    }

    fn publish(&self, event: StatusEvent) {
        let _ = self.bus_tx.send(event);
    }

    fn publish_lidar_state(&self, available: bool) {
        self.publish(StatusEvent::LidarState {
            mapping: self.state.is_mapping(),
            navigating: self.state.is_navigating(),
            exploring: self.state.is_exploring(),
            available,
        });
    }

    fn zero_motors(&mut self) {
        self.motor = MotorCommand::default();
        self.publish(StatusEvent::MotorStatus {
            motor_a: self.motor.left,
            motor_b: self.motor.right,
        });
    }

    fn actuate(&mut self, cmd: MotorCommand) {
        self.motor = cmd;
        self.publish(StatusEvent::MotorStatus {
            motor_a: cmd.left,
            motor_b: cmd.right,
        });
        self.pose.update(
            cmd.left.speed,
            cmd.left.direction,
            cmd.right.speed,
            cmd.right.direction,
            now_secs(),
        );
    }

    fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Joystick { x, y } => {
                self.last_joystick_secs = Some(now_secs());
                self.watchdog_applied = false;
                if self.state.mode() == Mode::Idle {
                    self.state.transition(ModeEvent::Joystick);
                }
                if self.state.mode() == Mode::Manual {
                    if self.actuator.is_action_active() {
                        self.actuator.stop_action();
                    }
                    let cmd = ActuatorMapper::joystick_to_motors(x, y);
                    self.actuate(cmd);
                }
            }
            ControlEvent::EmergencyStop => {
                self.state.emergency_stop();
                self.actuator.stop_action();
                self.zero_motors();
            }
            ControlEvent::StartAction { action } => {
                if self.state.mode() == Mode::Idle || self.state.mode() == Mode::Manual {
                    self.actuator.start_action(action, now_secs());
                }
            }
            ControlEvent::StopAction => {
                let cmd = self.actuator.stop_action();
                self.actuate(cmd);
            }
            ControlEvent::StartMapping => {
                if self.state.transition(ModeEvent::StartMapping) == Mode::Mapping {
                    info!("entering mapping mode");
                }
            }
            ControlEvent::StopMapping => {
                if self.state.is_mapping() {
                    self.state.transition(ModeEvent::Stop);
                    self.zero_motors();
                }
            }
            ControlEvent::StartNavigation => {
                self.state.transition(ModeEvent::StartNavigation);
            }
            ControlEvent::StopNavigation => {
                if self.state.is_navigating() {
                    self.state.transition(ModeEvent::Stop);
                    self.zero_motors();
                }
            }
            ControlEvent::StartExploration { mode } => {
                self.pending_explore_mode = mode;
                if self.state.transition(ModeEvent::StartExploration) == Mode::Exploration {
                    self.explore = Some(ExplorePlanner::new(
                        ExploreConfig {
                            speed: self.config.explore_speed,
                            frontier_min_dist_m: self.config.explore_frontier_min_dist,
                            complete_pct: self.config.explore_complete_pct,
                        },
                        mode,
                        Waypoint { x: 0.0, y: 0.0 },
                    ));
                }
            }
            ControlEvent::StopExploration => {
                if self.state.is_exploring() {
                    self.state.transition(ModeEvent::Stop);
                    self.explore = None;
                    self.zero_motors();
                }
            }
            ControlEvent::SetExploreMode { mode } => {
                self.pending_explore_mode = mode;
                if let Some(explore) = self.explore.as_mut() {
                    explore.set_mode(mode);
                }
            }
            ControlEvent::ReturnToStart => {
                if self.state.is_exploring() {
                    if let Some(explore) = self.explore.as_mut() {
                        explore.set_mode(ExploreMode::Return);
                    }
                }
            }
            ControlEvent::SaveMap { name } => self.handle_save_map(name),
            ControlEvent::LoadMap { name } => self.handle_load_map(name),
            ControlEvent::DeleteMap { name } => self.handle_delete_map(name),
            ControlEvent::ListMaps => self.handle_list_maps(),
        }
    }

    fn handle_save_map(&mut self, name: String) {
        let saved_at = chrono_like_timestamp();
        match self.map_store.save(&mut self.grid, &name, &saved_at) {
            Ok(()) => self.publish(StatusEvent::MapSaved { name }),
            Err(e) => self.publish(StatusEvent::Error {
                message: format!("save_map failed: {e}"),
            }),
        }
    }

    fn handle_load_map(&mut self, name: String) {
        match self.map_store.load(&name) {
            Ok(grid) => {
                self.grid = grid;
                self.publish(StatusEvent::MapLoaded { name });
            }
            Err(e) => self.publish(StatusEvent::Error {
                message: format!("load_map failed: {e}"),
            }),
        }
    }

    fn handle_delete_map(&mut self, name: String) {
        match self.map_store.delete(&name) {
            Ok(_) => self.publish(StatusEvent::MapDeleted { name }),
            Err(e) => self.publish(StatusEvent::Error {
                message: format!("delete_map failed: {e}"),
            }),
        }
    }

    fn handle_list_maps(&mut self) {
        match self.map_store.list() {
            Ok(maps) => self.publish(StatusEvent::MapList { maps }),
            Err(e) => self.publish(StatusEvent::Error {
                message: format!("list_maps failed: {e}"),
            }),
        }
    }

    fn tick(&mut self) {
        self.tick_counter += 1;
        self.check_watchdog();

        match self.state.mode() {
            Mode::Idle | Mode::Manual => self.tick_action(),
            Mode::Mapping => self.tick_mapping(),
            Mode::Navigation => self.tick_navigation(),
            Mode::Exploration => self.tick_exploration(),
        }
    }

    /// Advance any in-flight named action. `ActuatorMapper` clears its
    /// active action the tick it finishes, so zeroing the motors happens
    /// one tick later, the first tick where nothing is active anymore.
    fn tick_action(&mut self) {
        let active_before = self.actuator.is_action_active();
        if active_before {
            if let Some((cmd, _finished)) = self.actuator.step_action(now_secs()) {
                self.actuate(cmd);
            }
        } else if self.action_was_active {
            self.zero_motors();
        }
        self.action_was_active = active_before;
    }

    fn check_watchdog(&mut self) {
        if self.state.mode() != Mode::Manual || self.watchdog_applied {
            return;
        }
        let Some(last) = self.last_joystick_secs else {
            return;
        };
        if now_secs() - last >= self.config.safety_timeout {
            warn!("manual-mode watchdog timeout, stopping");
            self.zero_motors();
            self.watchdog_applied = true;
        }
    }

    /// Pull the latest frame and integrate it into the grid and pose. A
    /// `None` frame or an unavailable scan source disables LiDAR-using
    /// modes; returns `None` in that case.
    fn ingest_scan(&mut self) -> Option<types::ScanFrame> {
        if !self.scan.is_available() {
            self.state.emergency_stop();
            self.zero_motors();
            self.publish_lidar_state(false);
            return None;
        }
        let frame = self.scan.latest_frame()?;
        if !frame.is_usable() {
            return None;
        }
        let pose = self.pose.pose();
        self.grid.update_from_scan(
            pose.x,
            pose.y,
            pose.theta,
            &frame,
            self.config.lidar_min_range,
            self.config.lidar_max_range,
        );
        self.pose.correct_from_scan(&self.grid, &frame);
        Some(frame)
    }

    fn maybe_publish_grid(&mut self) {
        if self.tick_counter % GRID_PUBLISH_EVERY_TICKS != 0 {
            return;
        }
        self.grid.detect_walls_and_corners();
        let pose = self.pose.pose();
        self.publish(StatusEvent::GridUpdate {
            grid: self.grid.cells_raw().to_vec(),
            resolution: self.grid.resolution,
            size_m: self.grid.size_m,
            origin: self.grid.origin,
            stats: self.grid.stats(),
            pose,
            path: self
                .pose
                .path()
                .iter()
                .map(|p: &Pose| Waypoint { x: p.x, y: p.y })
                .collect(),
        });
    }

    fn tick_mapping(&mut self) {
        let Some(frame) = self.ingest_scan() else {
            return;
        };
        self.publish(StatusEvent::MapData {
            point_count: frame.points.len(),
            timestamp: frame.timestamp,
            points: frame.points,
        });
        self.maybe_publish_grid();
    }

    fn tick_navigation(&mut self) {
        let Some(frame) = self.ingest_scan() else {
            return;
        };
        let cmd = self.reactive.plan_step(&frame.points);
        let (x, y) = command_to_joystick(&cmd);
        let motor_cmd = ActuatorMapper::joystick_to_motors(x, y);
        self.actuate(motor_cmd);
        self.publish(StatusEvent::NavStatus {
            action: cmd.action.as_str().to_string(),
            speed: cmd.speed,
            steering: cmd.steering,
            sector_distances: cmd
                .sector_distances
                .iter()
                .map(|d| (*d * 1000.0).round() as u32)
                .collect(),
            best_sector: cmd.best_sector,
        });
        self.maybe_publish_grid();
    }

    fn tick_exploration(&mut self) {
        let Some(frame) = self.ingest_scan() else {
            return;
        };
        let pose = self.pose.pose();
        let grid = &self.grid;
        let Some(explore) = self.explore.as_mut() else {
            return;
        };
        let cmd = explore.step(grid, pose.x, pose.y, pose.theta, &frame.points);
        let (x, y) = match cmd.action {
            ExploreAction::Forward => (0.0, self.config.explore_speed as f64),
            ExploreAction::TurnLeft | ExploreAction::TurnRight => {
                (cmd.steering as f64, cmd.speed as f64 * 0.5)
            }
            ExploreAction::Stop | ExploreAction::Complete => (0.0, 0.0),
        };
        let motor_cmd = ActuatorMapper::joystick_to_motors(x, y);
        self.actuate(motor_cmd);

        let complete = matches!(cmd.action, ExploreAction::Complete);
        let stats = self.grid.stats();
        self.publish(StatusEvent::ExploreStatus {
            mode: self.explore.as_ref().map(|e| e.mode()).unwrap_or(self.pending_explore_mode),
            complete,
            explored_pct: stats.explored_pct,
            scan_count: self.grid.scan_count,
            waypoints_total: 1,
            waypoints_done: usize::from(complete),
            wall_count: stats.wall_count,
            corner_count: stats.corner_count,
        });

        if complete {
            self.state.transition(ModeEvent::Stop);
            self.explore = None;
            self.zero_motors();
        }
        self.maybe_publish_grid();
    }
}

/// Matches the `MapStore::save`'s need for an opaque save timestamp
/// string; kept dependency-free rather than pulling `chrono` for one
/// ISO-ish stamp.
fn chrono_like_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("epoch:{secs}")
}
