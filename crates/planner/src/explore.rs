//! Waypoint-following exploration planner: picks targets under one of
//! five modes and falls back to the reactive planner for safety.

use occupancy::{heading_to, OccupancyGrid};
use transforms::normalize_angle;
use types::{ExploreMode, ScanPoint, Waypoint};

use crate::astar::{astar, downsample};
use crate::reactive::{Action, ReactiveConfig, ReactivePlanner};

/// Euclidean distance under which a waypoint counts as reached.
const WAYPOINT_REACHED_M: f64 = 0.20;
/// Heading error beyond which we turn in place rather than drive forward.
const HEADING_TURN_THRESHOLD_RAD: f64 = 0.4;
/// Line spacing for the coverage boustrophedon sweep.
const COVERAGE_SPACING_M: f64 = 0.30;

#[derive(Debug, Clone, Copy)]
pub struct ExploreConfig {
    pub speed: i32,
    pub frontier_min_dist_m: f64,
    pub complete_pct: f64,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            speed: 35,
            frontier_min_dist_m: 0.3,
            complete_pct: 85.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExploreAction {
    Forward,
    TurnLeft,
    TurnRight,
    Stop,
    Complete,
}

#[derive(Debug, Clone)]
pub struct ExploreCommand {
    pub action: ExploreAction,
    pub speed: i32,
    pub steering: i32,
    pub waypoint: Option<Waypoint>,
}

fn stop_command() -> ExploreCommand {
    ExploreCommand {
        action: ExploreAction::Stop,
        speed: 0,
        steering: 0,
        waypoint: None,
    }
}

fn complete_command() -> ExploreCommand {
    ExploreCommand {
        action: ExploreAction::Complete,
        speed: 0,
        steering: 0,
        waypoint: None,
    }
}

/// Drives a sequence of waypoints toward exploring, covering, or mapping
/// the boundary/corners of a grid, or returning to the start pose.
pub struct ExplorePlanner {
    config: ExploreConfig,
    mode: ExploreMode,
    waypoints: Vec<Waypoint>,
    cursor: usize,
    start: Waypoint,
    reactive: ReactivePlanner,
    complete: bool,
}

impl ExplorePlanner {
    pub fn new(config: ExploreConfig, mode: ExploreMode, start: Waypoint) -> Self {
        Self {
            config,
            mode,
            waypoints: Vec::new(),
            cursor: 0,
            start,
            reactive: ReactivePlanner::new(ReactiveConfig::default()),
            complete: false,
        }
    }

    pub fn mode(&self) -> ExploreMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExploreMode) {
        if mode != self.mode {
            self.mode = mode;
            self.waypoints.clear();
            self.cursor = 0;
            self.complete = false;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn current_waypoint(&self) -> Option<Waypoint> {
        self.waypoints.get(self.cursor).copied()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn regenerate(&mut self, grid: &OccupancyGrid, px: f64, py: f64) {
        self.cursor = 0;
        self.waypoints = match self.mode {
            ExploreMode::Explore => self.frontier_targets(grid, px, py),
            ExploreMode::Coverage => self.coverage_targets(grid),
            ExploreMode::Boundary => self.boundary_targets(grid, px, py),
            ExploreMode::Corners => self.corner_targets(grid, px, py),
            ExploreMode::Return => self.return_targets(grid, px, py),
        };
    }

    fn frontier_targets(&self, grid: &OccupancyGrid, px: f64, py: f64) -> Vec<Waypoint> {
        grid.get_frontiers()
            .into_iter()
            .find(|f| ((f.x - px).powi(2) + (f.y - py).powi(2)).sqrt() >= self.config.frontier_min_dist_m)
            .map(|f| vec![Waypoint { x: f.x, y: f.y }])
            .unwrap_or_default()
    }

    fn coverage_targets(&self, grid: &OccupancyGrid) -> Vec<Waypoint> {
        let Some(bounds) = grid.room_bounds() else {
            return Vec::new();
        };
        let mut waypoints = Vec::new();
        let mut x = bounds.x_min;
        let mut forward = true;
        while x <= bounds.x_max {
            let (y_start, y_end) = if forward {
                (bounds.y_min, bounds.y_max)
            } else {
                (bounds.y_max, bounds.y_min)
            };
            waypoints.push(Waypoint { x, y: y_start });
            waypoints.push(Waypoint { x, y: y_end });
            x += COVERAGE_SPACING_M;
            forward = !forward;
        }
        waypoints
    }

    fn boundary_targets(&self, grid: &OccupancyGrid, px: f64, py: f64) -> Vec<Waypoint> {
        if grid.walls.is_empty() {
            return self.frontier_targets(grid, px, py);
        }
        let mut points: Vec<(f64, f64)> = Vec::new();
        for wall in &grid.walls {
            points.push((wall.x1, wall.y1));
            points.push((wall.x2, wall.y2));
        }
        let cx = points.iter().map(|p| p.0).sum::<f64>() / points.len() as f64;
        let cy = points.iter().map(|p| p.1).sum::<f64>() / points.len() as f64;
        points.sort_by(|a, b| {
            let angle_a = (a.1 - cy).atan2(a.0 - cx);
            let angle_b = (b.1 - cy).atan2(b.0 - cx);
            angle_a.partial_cmp(&angle_b).unwrap()
        });
        points.into_iter().map(|(x, y)| Waypoint { x, y }).collect()
    }

    fn corner_targets(&self, grid: &OccupancyGrid, px: f64, py: f64) -> Vec<Waypoint> {
        let mut corners: Vec<(f64, f64, f64)> = grid
            .corners
            .iter()
            .map(|c| {
                let d = ((c.x - px).powi(2) + (c.y - py).powi(2)).sqrt();
                (d, c.x, c.y)
            })
            .collect();
        corners.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let mut waypoints: Vec<Waypoint> =
            corners.into_iter().map(|(_, x, y)| Waypoint { x, y }).collect();
        for f in grid.get_frontiers() {
            waypoints.push(Waypoint { x: f.x, y: f.y });
        }
        waypoints
    }

    fn return_targets(&self, grid: &OccupancyGrid, px: f64, py: f64) -> Vec<Waypoint> {
        let start_cell = grid.world_to_cell(self.start.x, self.start.y);
        let current_cell = grid.world_to_cell(px, py);
        let Some(path) = astar(grid, current_cell, start_cell) else {
            return Vec::new();
        };
        downsample(&path)
            .into_iter()
            .map(|(r, c)| {
                let (x, y) = grid.cell_to_world(r, c);
                Waypoint { x, y }
            })
            .collect()
    }

    /// Run one planning step. `px`/`py`/`ph` is the current pose; `points`
    /// is the current scan used for reactive avoidance.
    pub fn step(
        &mut self,
        grid: &OccupancyGrid,
        px: f64,
        py: f64,
        ph: f64,
        points: &[ScanPoint],
    ) -> ExploreCommand {
        if self.complete {
            return complete_command();
        }

        if grid.stats().explored_pct >= self.config.complete_pct {
            self.complete = true;
            return complete_command();
        }

        if self.current_waypoint().is_none() {
            self.regenerate(grid, px, py);
        }
        let Some(target) = self.current_waypoint() else {
            self.complete = true;
            return complete_command();
        };

        let dist = ((target.x - px).powi(2) + (target.y - py).powi(2)).sqrt();
        if dist < WAYPOINT_REACHED_M {
            self.advance();
            return self.step(grid, px, py, ph, points);
        }

        let desired_heading = heading_to(px, py, target.x, target.y);
        let heading_error = normalize_angle(desired_heading - ph);

        let reactive_cmd = self.reactive.plan_step(points);
        match reactive_cmd.action {
            Action::Stop => {
                self.advance();
                return stop_command();
            }
            Action::TurnLeft => {
                return ExploreCommand {
                    action: ExploreAction::TurnLeft,
                    speed: reactive_cmd.speed,
                    steering: reactive_cmd.steering,
                    waypoint: Some(target),
                };
            }
            Action::TurnRight => {
                return ExploreCommand {
                    action: ExploreAction::TurnRight,
                    speed: reactive_cmd.speed,
                    steering: reactive_cmd.steering,
                    waypoint: Some(target),
                };
            }
            Action::Forward => {}
        }

        if heading_error.abs() > HEADING_TURN_THRESHOLD_RAD {
            let steering = (heading_error * 80.0).clamp(-100.0, 100.0) as i32;
            let action = if steering >= 0 {
                ExploreAction::TurnRight
            } else {
                ExploreAction::TurnLeft
            };
            return ExploreCommand {
                action,
                speed: self.config.speed,
                steering,
                waypoint: Some(target),
            };
        }

        ExploreCommand {
            action: ExploreAction::Forward,
            speed: self.config.speed,
            steering: 0,
            waypoint: Some(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ScanPoint;

    fn clear_scan() -> Vec<ScanPoint> {
        (-180..180)
            .step_by(5)
            .map(|a| {
                let angle_deg = a as f64;
                ScanPoint {
                    angle_deg,
                    distance_m: 3.0,
                    x_m: 3.0 * angle_deg.to_radians().cos(),
                    y_m: 3.0 * angle_deg.to_radians().sin(),
                }
            })
            .collect()
    }

    #[test]
    fn test_complete_when_explored_pct_reached() {
        let mut grid = OccupancyGrid::new(2.0, 1.0);
        grid.set_cell(0, 0, occupancy::FREE);
        grid.set_cell(0, 1, occupancy::FREE);
        grid.set_cell(1, 0, occupancy::OCCUPIED);
        grid.set_cell(1, 1, occupancy::OCCUPIED);
        let mut planner = ExplorePlanner::new(
            ExploreConfig::default(),
            ExploreMode::Explore,
            Waypoint { x: 0.0, y: 0.0 },
        );
        let cmd = planner.step(&grid, 0.0, 0.0, 0.0, &clear_scan());
        assert_eq!(cmd.action, ExploreAction::Complete);
        assert!(planner.is_complete());
    }

    #[test]
    fn test_no_frontiers_and_no_bounds_completes() {
        let grid = OccupancyGrid::new(2.0, 0.1);
        let mut planner = ExplorePlanner::new(
            ExploreConfig::default(),
            ExploreMode::Explore,
            Waypoint { x: 0.0, y: 0.0 },
        );
        let cmd = planner.step(&grid, 0.0, 0.0, 0.0, &clear_scan());
        assert_eq!(cmd.action, ExploreAction::Complete);
    }

    #[test]
    fn test_boundary_falls_back_to_explore_without_walls() {
        let grid = OccupancyGrid::new(4.0, 0.1);
        let mut planner = ExplorePlanner::new(
            ExploreConfig::default(),
            ExploreMode::Boundary,
            Waypoint { x: 0.0, y: 0.0 },
        );
        let targets = planner.boundary_targets(&grid, 0.0, 0.0);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_return_mode_targets_start_via_astar() {
        let grid = OccupancyGrid::new(4.0, 0.5);
        let mut planner = ExplorePlanner::new(
            ExploreConfig::default(),
            ExploreMode::Return,
            Waypoint { x: 0.0, y: 0.0 },
        );
        let targets = planner.return_targets(&grid, 1.0, 1.0);
        assert!(!targets.is_empty());
        let last = targets.last().unwrap();
        assert!((last.x - 0.0).abs() < 1.0);
        assert!((last.y - 0.0).abs() < 1.0);
    }

    #[test]
    fn test_coverage_sweep_alternates_direction() {
        let mut grid = OccupancyGrid::new(4.0, 0.5);
        grid.set_cell(0, 0, occupancy::OCCUPIED);
        grid.set_cell(7, 7, occupancy::OCCUPIED);
        let planner = ExplorePlanner::new(
            ExploreConfig::default(),
            ExploreMode::Coverage,
            Waypoint { x: 0.0, y: 0.0 },
        );
        let targets = planner.coverage_targets(&grid);
        assert!(targets.len() >= 4);
        assert_ne!(targets[0].y, targets[1].y);
    }

    #[test]
    fn test_reactive_stop_skips_waypoint() {
        let grid = OccupancyGrid::new(4.0, 0.1);
        let mut planner = ExplorePlanner::new(
            ExploreConfig::default(),
            ExploreMode::Explore,
            Waypoint { x: 0.0, y: 0.0 },
        );
        planner.waypoints = vec![Waypoint { x: 5.0, y: 5.0 }];
        planner.cursor = 0;
        let blocked: Vec<ScanPoint> = (-180..180)
            .step_by(5)
            .map(|a| {
                let angle_deg = a as f64;
                ScanPoint {
                    angle_deg,
                    distance_m: 0.05,
                    x_m: 0.0,
                    y_m: 0.0,
                }
            })
            .collect();
        let cmd = planner.step(&grid, 0.0, 0.0, 0.0, &blocked);
        assert_eq!(cmd.action, ExploreAction::Stop);
        assert_eq!(planner.cursor, 1);
    }
}
