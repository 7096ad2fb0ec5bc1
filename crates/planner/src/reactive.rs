//! Stateless sector-scan reactive planner: converts a single scan into
//! an immediate avoidance action, with no map.

use types::ScanPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReactiveCommand {
    pub action: Action,
    pub speed: i32,
    /// -100 (left) .. 100 (right)
    pub steering: i32,
    pub sector_distances: Vec<f64>,
    pub best_sector: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReactiveConfig {
    pub sector_count: usize,
    pub obstacle_threshold: f64,
    pub speed: i32,
    pub front_half: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            sector_count: 24,
            obstacle_threshold: 0.35,
            speed: 40,
            front_half: 2,
        }
    }
}

pub struct ReactivePlanner {
    config: ReactiveConfig,
}

impl ReactivePlanner {
    pub fn new(config: ReactiveConfig) -> Self {
        Self { config }
    }

    pub fn plan_step(&self, points: &[ScanPoint]) -> ReactiveCommand {
        if points.is_empty() {
            return ReactiveCommand {
                action: Action::Stop,
                speed: 0,
                steering: 0,
                sector_distances: Vec::new(),
                best_sector: None,
            };
        }

        let sectors = self.build_sectors(points);
        let best = self.best_sector(&sectors);
        let front_clear = self.front_is_clear(&sectors);

        if front_clear {
            return ReactiveCommand {
                action: Action::Forward,
                speed: self.config.speed,
                steering: 0,
                sector_distances: sectors,
                best_sector: best,
            };
        }

        let Some(best_idx) = best else {
            return ReactiveCommand {
                action: Action::Stop,
                speed: 0,
                steering: 0,
                sector_distances: sectors,
                best_sector: None,
            };
        };

        let centre = self.config.sector_count / 2;
        if best_idx < centre {
            let steering = (((centre - best_idx) as f64) * (100.0 / centre as f64))
                .clamp(20.0, 100.0) as i32;
            ReactiveCommand {
                action: Action::TurnRight,
                speed: self.config.speed,
                steering,
                sector_distances: sectors,
                best_sector: best,
            }
        } else {
            let steering = (((best_idx - centre) as f64) * (100.0 / centre as f64))
                .clamp(20.0, 100.0) as i32;
            ReactiveCommand {
                action: Action::TurnLeft,
                speed: self.config.speed,
                steering: -steering,
                sector_distances: sectors,
                best_sector: best,
            }
        }
    }

    fn build_sectors(&self, points: &[ScanPoint]) -> Vec<f64> {
        let n = self.config.sector_count;
        let width = 360.0 / n as f64;
        let mut sums = vec![0.0; n];
        let mut counts = vec![0usize; n];

        for pt in points {
            let norm = (pt.angle_deg + 180.0).rem_euclid(360.0);
            let idx = ((norm / width) as usize).min(n - 1);
            sums[idx] += pt.distance_m;
            counts[idx] += 1;
        }

        (0..n)
            .map(|i| {
                if counts[i] > 0 {
                    (sums[i] / counts[i] as f64 * 1000.0).round() / 1000.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn front_is_clear(&self, sectors: &[f64]) -> bool {
        let centre = self.config.sector_count as i64 / 2;
        let half = self.config.front_half as i64;
        let n = self.config.sector_count as i64;
        for i in (centre - half)..=(centre + half) {
            let idx = i.rem_euclid(n) as usize;
            if sectors[idx] < self.config.obstacle_threshold || sectors[idx] == 0.0 {
                return false;
            }
        }
        true
    }

    fn best_sector(&self, sectors: &[f64]) -> Option<usize> {
        let mut best_idx = None;
        let mut best_dist = 0.0;
        for (i, &d) in sectors.iter().enumerate() {
            if d > best_dist {
                best_dist = d;
                best_idx = Some(i);
            }
        }
        if best_dist < self.config.obstacle_threshold {
            None
        } else {
            best_idx
        }
    }
}

/// Convert a reactive command into joystick-style `(x, y)` for the
/// actuator mapper. `x` is steering, `y` is throttle.
pub fn command_to_joystick(cmd: &ReactiveCommand) -> (f64, f64) {
    match cmd.action {
        Action::Forward => (0.0, cmd.speed as f64),
        Action::TurnLeft | Action::TurnRight => (cmd.steering as f64, cmd.speed as f64 * 0.5),
        Action::Stop => (0.0, 0.0),
    }
}
