//! Dead-reckoning pose estimator with scan-match drift correction.

use tracing::trace;
use transforms::normalize_angle;
use types::{Direction, Pose, ScanFrame};

use occupancy::OccupancyGrid;

/// Non-rotational scan-match offsets tried around the current pose.
const SCAN_MATCH_OFFSETS: [f64; 3] = [-0.05, 0.0, 0.05];
/// A correction is only applied when the best offset's score beats this.
const SCAN_MATCH_MIN_SCORE: usize = 10;
/// Minimum number of scan points required to attempt a correction.
const SCAN_MATCH_MIN_POINTS: usize = 20;

/// Tunable kinematic parameters, normally sourced from the supervisor's
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct Kinematics {
    pub wheel_base_m: f64,
    pub max_speed_mps: f64,
    pub motor_max_pwm: f64,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            wheel_base_m: 0.3,
            max_speed_mps: 0.5,
            motor_max_pwm: 100.0,
        }
    }
}

/// Tracks `(x, y, heading)` from commanded motor state alone, with
/// opportunistic scan-match drift correction.
pub struct PoseEstimator {
    pose: Pose,
    start_pose: Pose,
    kinematics: Kinematics,
    last_update_secs: Option<f64>,
    total_distance: f64,
    history: Vec<Pose>,
}

impl PoseEstimator {
    pub fn new(kinematics: Kinematics) -> Self {
        Self {
            pose: Pose::default(),
            start_pose: Pose::default(),
            kinematics,
            last_update_secs: None,
            total_distance: 0.0,
            history: Vec::new(),
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn distance_to_start(&self) -> f64 {
        let dx = self.pose.x - self.start_pose.x;
        let dy = self.pose.y - self.start_pose.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn path(&self) -> &[Pose] {
        &self.history
    }

    pub fn reset(&mut self, pose: Pose) {
        self.pose = pose;
        self.start_pose = pose;
        self.last_update_secs = None;
        self.total_distance = 0.0;
        self.history.clear();
    }

    fn pwm_to_mps(&self, speed: u8, direction: Direction) -> f64 {
        if direction == Direction::Stop || speed <= 5 {
            return 0.0;
        }
        let v = (speed as f64 / self.kinematics.motor_max_pwm) * self.kinematics.max_speed_mps;
        match direction {
            Direction::Backward => -v,
            _ => v,
        }
    }

    /// Dead-reckoning update from commanded per-side motor state.
    ///
    /// `now_secs` is a monotonic clock reading; `dt` is derived from the
    /// previous call's reading unless this is the first update. A `dt`
    /// outside `(0, 2]` seconds is treated as a dropout and ignored, but
    /// the clock still advances so the next call computes a correct `dt`.
    pub fn update(
        &mut self,
        left_speed: u8,
        left_dir: Direction,
        right_speed: u8,
        right_dir: Direction,
        now_secs: f64,
    ) {
        let dt = match self.last_update_secs {
            Some(last) => now_secs - last,
            None => 0.0,
        };
        self.last_update_secs = Some(now_secs);

        if dt <= 0.0 || dt > 2.0 {
            return;
        }

        let vl = self.pwm_to_mps(left_speed, left_dir);
        let vr = self.pwm_to_mps(right_speed, right_dir);

        let v = (vl + vr) / 2.0;
        let omega = (vr - vl) / self.kinematics.wheel_base_m;

        let heading_offset = self.pose.theta + std::f64::consts::FRAC_PI_2;
        if omega.abs() < 1e-6 {
            self.pose.x += v * heading_offset.cos() * dt;
            self.pose.y += v * heading_offset.sin() * dt;
        } else {
            let radius = v / omega;
            let dh = omega * dt;
            self.pose.x += radius * ((heading_offset + dh).sin() - heading_offset.sin());
            self.pose.y -= radius * ((heading_offset + dh).cos() - heading_offset.cos());
            self.pose.theta += dh;
        }

        self.pose.theta = normalize_angle(self.pose.theta);
        self.total_distance += v.abs() * dt;

        self.history.push(self.pose);
        if self.history.len() > 500 {
            let drop = self.history.len() - 500;
            self.history.drain(0..drop);
        }

        trace!(x = self.pose.x, y = self.pose.y, theta = self.pose.theta, "dead-reckoning update");
    }

    /// Coarse translational scan-match correction. Returns whether a
    /// correction was applied.
    pub fn correct_from_scan(&mut self, grid: &OccupancyGrid, frame: &ScanFrame) -> bool {
        if frame.points.len() < SCAN_MATCH_MIN_POINTS {
            return false;
        }

        let mut best_score = 0usize;
        let mut best_dx = 0.0;
        let mut best_dy = 0.0;

        for dx in SCAN_MATCH_OFFSETS {
            for dy in SCAN_MATCH_OFFSETS {
                let test_x = self.pose.x + dx;
                let test_y = self.pose.y + dy;
                let score = grid.score_offset(
                    test_x,
                    test_y,
                    self.pose.theta,
                    &frame.points,
                    0.05,
                    8.0,
                );
                if score > best_score {
                    best_score = score;
                    best_dx = dx;
                    best_dy = dy;
                }
            }
        }

        if best_score > SCAN_MATCH_MIN_SCORE && (best_dx != 0.0 || best_dy != 0.0) {
            self.pose.x += best_dx;
            self.pose.y += best_dy;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_forward_advances_along_heading() {
        let mut est = PoseEstimator::new(Kinematics::default());
        est.update(100, Direction::Forward, 100, Direction::Forward, 0.0);
        est.update(100, Direction::Forward, 100, Direction::Forward, 1.0);
        let pose = est.pose();
        // heading 0 faces +y
        assert!(pose.y > 0.0);
        assert!(pose.x.abs() < 1e-6);
    }

    #[test]
    fn test_spin_in_place_changes_heading_not_position() {
        let mut est = PoseEstimator::new(Kinematics::default());
        est.update(50, Direction::Backward, 50, Direction::Forward, 0.0);
        est.update(50, Direction::Backward, 50, Direction::Forward, 1.0);
        let pose = est.pose();
        assert!(pose.theta.abs() > 0.0);
        assert!(pose.x.abs() < 1e-6);
        assert!(pose.y.abs() < 1e-6);
    }

    #[test]
    fn test_dropout_dt_ignored_but_clock_advances() {
        let mut est = PoseEstimator::new(Kinematics::default());
        est.update(100, Direction::Forward, 100, Direction::Forward, 0.0);
        // dt = 5.0s is a dropout, should be ignored
        est.update(100, Direction::Forward, 100, Direction::Forward, 5.0);
        let after_dropout = est.pose();
        // next call should use dt = 0.1 (5.1 - 5.0), not 5.1
        est.update(100, Direction::Forward, 100, Direction::Forward, 5.1);
        let after = est.pose();
        assert!(after.y > after_dropout.y);
        assert!(after.y - after_dropout.y < 0.2);
    }

    #[test]
    fn test_heading_stays_normalized() {
        let mut est = PoseEstimator::new(Kinematics::default());
        let mut t = 0.0;
        for _ in 0..20 {
            est.update(100, Direction::Backward, 100, Direction::Forward, t);
            t += 1.0;
            assert!(est.pose().theta >= -std::f64::consts::PI);
            assert!(est.pose().theta <= std::f64::consts::PI);
        }
    }

    #[test]
    fn test_low_speed_or_stop_yields_zero_velocity() {
        let mut est = PoseEstimator::new(Kinematics::default());
        est.update(3, Direction::Forward, 3, Direction::Forward, 0.0);
        est.update(3, Direction::Forward, 3, Direction::Forward, 1.0);
        let pose = est.pose();
        assert!(pose.x.abs() < 1e-9);
        assert!(pose.y.abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_start_after_reset() {
        let mut est = PoseEstimator::new(Kinematics::default());
        est.update(100, Direction::Forward, 100, Direction::Forward, 0.0);
        est.update(100, Direction::Forward, 100, Direction::Forward, 1.0);
        assert!(est.distance_to_start() > 0.0);
        est.reset(Pose::default());
        assert!(est.distance_to_start().abs() < 1e-9);
    }

    #[test]
    fn test_history_bounded_to_500() {
        let mut est = PoseEstimator::new(Kinematics::default());
        for i in 0..600 {
            est.update(50, Direction::Forward, 50, Direction::Forward, i as f64);
        }
        assert_eq!(est.path().len(), 500);
    }

    #[test]
    fn test_correct_from_scan_requires_minimum_points() {
        let mut est = PoseEstimator::new(Kinematics::default());
        let grid = OccupancyGrid::new(10.0, 0.05);
        let frame = ScanFrame {
            timestamp: 0.0,
            points: vec![],
        };
        assert!(!est.correct_from_scan(&grid, &frame));
    }
}
