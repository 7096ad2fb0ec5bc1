//! Actuator mapper: the only translation point between operator/planner
//! intent and the external motor driver.

use tracing::debug;
use types::{ActionType, Direction, MotorCommand, MotorState};

/// Magnitude below which a joystick axis is treated as zero.
const DEAD_ZONE: f64 = 5.0;
/// Fixed speed used by all named scripted actions.
const ACTION_SPIN_SPEED: u8 = 60;
/// Approximate in-place turn rate at `ACTION_SPIN_SPEED`, used to
/// calibrate the timed spin actions. Not measured against real hardware.
const SPIN_RATE_DEG_PER_SEC: f64 = 90.0;
const WIGGLE_HALF_PERIOD_SECS: f64 = 0.3;
const WIGGLE_CYCLES: u32 = 4;

fn apply_dead_zone(v: f64) -> f64 {
    if v.abs() < DEAD_ZONE {
        0.0
    } else {
        v
    }
}

fn motor_state(signed_value: f64) -> MotorState {
    let rounded = signed_value.round();
    MotorState {
        direction: Direction::from_signed(rounded as i32),
        speed: rounded.abs() as u8,
    }
}

fn spin_command(left_forward: bool, speed: u8) -> MotorCommand {
    let (left_dir, right_dir) = if left_forward {
        (Direction::Forward, Direction::Backward)
    } else {
        (Direction::Backward, Direction::Forward)
    };
    MotorCommand {
        left: MotorState {
            direction: left_dir,
            speed,
        },
        right: MotorState {
            direction: right_dir,
            speed,
        },
    }
}

struct ActiveAction {
    action: ActionType,
    started_at: f64,
}

/// Joystick-to-differential-drive mixer, plus the named-action state
/// machine. Only one motion source — joystick, named action, or a
/// planner — drives the actuator at a time; arbitrating between them is
/// the supervisor's job, not this struct's.
#[derive(Default)]
pub struct ActuatorMapper {
    active: Option<ActiveAction>,
}

impl ActuatorMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mix a joystick `(x, y) ∈ [-100, 100]²` into a left/right motor
    /// command.
    pub fn joystick_to_motors(x: f64, y: f64) -> MotorCommand {
        let x = apply_dead_zone(x);
        let y = apply_dead_zone(y);
        let left = (y + x).clamp(-100.0, 100.0);
        let right = (y - x).clamp(-100.0, 100.0);
        MotorCommand {
            left: motor_state(left),
            right: motor_state(right),
        }
    }

    pub fn is_action_active(&self) -> bool {
        self.active.is_some()
    }

    /// Begin a short scripted motion, bypassing the joystick mapping.
    pub fn start_action(&mut self, action: ActionType, now_secs: f64) {
        debug!(?action, "starting named action");
        self.active = Some(ActiveAction {
            action,
            started_at: now_secs,
        });
    }

    /// Cancel any in-flight named action and zero the actuator.
    pub fn stop_action(&mut self) -> MotorCommand {
        self.active = None;
        MotorCommand::default()
    }

    /// Advance the in-flight action. Returns `None` if no action is
    /// active, otherwise `(command, finished)`. A finished action is
    /// cleared automatically; the caller is responsible for zeroing the
    /// actuator on the tick after `finished` is true.
    pub fn step_action(&mut self, now_secs: f64) -> Option<(MotorCommand, bool)> {
        let active = self.active.as_ref()?;
        let elapsed = now_secs - active.started_at;

        let (command, finished) = match active.action {
            ActionType::SpinLeft => (spin_command(false, ACTION_SPIN_SPEED), false),
            ActionType::SpinRight => (spin_command(true, ACTION_SPIN_SPEED), false),
            ActionType::Wiggle => {
                let total = WIGGLE_HALF_PERIOD_SECS * WIGGLE_CYCLES as f64;
                let phase = (elapsed / WIGGLE_HALF_PERIOD_SECS) as u64;
                let left_forward = phase % 2 == 0;
                (spin_command(left_forward, ACTION_SPIN_SPEED), elapsed >= total)
            }
            ActionType::Spin360 => {
                let duration = 360.0 / SPIN_RATE_DEG_PER_SEC;
                (spin_command(true, ACTION_SPIN_SPEED), elapsed >= duration)
            }
            ActionType::Spin180 => {
                let duration = 180.0 / SPIN_RATE_DEG_PER_SEC;
                (spin_command(true, ACTION_SPIN_SPEED), elapsed >= duration)
            }
        };

        if finished {
            self.active = None;
        }
        Some((command, finished))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joystick_pure_forward() {
        let cmd = ActuatorMapper::joystick_to_motors(0.0, 50.0);
        assert_eq!(cmd.left.direction, Direction::Forward);
        assert_eq!(cmd.left.speed, 50);
        assert_eq!(cmd.right.direction, Direction::Forward);
        assert_eq!(cmd.right.speed, 50);
    }

    #[test]
    fn test_joystick_pure_turn_spins_in_place() {
        let cmd = ActuatorMapper::joystick_to_motors(100.0, 0.0);
        assert_eq!(cmd.left.direction, Direction::Forward);
        assert_eq!(cmd.left.speed, 100);
        assert_eq!(cmd.right.direction, Direction::Backward);
        assert_eq!(cmd.right.speed, 100);
    }

    #[test]
    fn test_joystick_dead_zone() {
        let cmd = ActuatorMapper::joystick_to_motors(3.0, 4.0);
        assert_eq!(cmd.left.direction, Direction::Stop);
        assert_eq!(cmd.right.direction, Direction::Stop);
    }

    #[test]
    fn test_joystick_output_bounded() {
        for &(x, y) in &[(100.0, 100.0), (-100.0, 100.0), (100.0, -100.0)] {
            let cmd = ActuatorMapper::joystick_to_motors(x, y);
            assert!(cmd.left.speed <= 100);
            assert!(cmd.right.speed <= 100);
        }
    }

    #[test]
    fn test_spin_left_and_right_are_opposite() {
        let mut mapper = ActuatorMapper::new();
        mapper.start_action(ActionType::SpinRight, 0.0);
        let (right_cmd, finished) = mapper.step_action(0.01).unwrap();
        assert!(!finished);
        assert_eq!(right_cmd.left.direction, Direction::Forward);
        assert_eq!(right_cmd.right.direction, Direction::Backward);

        let mut mapper = ActuatorMapper::new();
        mapper.start_action(ActionType::SpinLeft, 0.0);
        let (left_cmd, _) = mapper.step_action(0.01).unwrap();
        assert_eq!(left_cmd.left.direction, Direction::Backward);
        assert_eq!(left_cmd.right.direction, Direction::Forward);
    }

    #[test]
    fn test_spin_360_finishes_after_calibrated_duration() {
        let mut mapper = ActuatorMapper::new();
        mapper.start_action(ActionType::Spin360, 0.0);
        let (_, finished_early) = mapper.step_action(1.0).unwrap();
        assert!(!finished_early);
        let (_, finished_late) = mapper.step_action(10.0).unwrap();
        assert!(finished_late);
        assert!(!mapper.is_action_active());
    }

    #[test]
    fn test_stop_action_cancels_and_zeros() {
        let mut mapper = ActuatorMapper::new();
        mapper.start_action(ActionType::Wiggle, 0.0);
        let cmd = mapper.stop_action();
        assert_eq!(cmd, MotorCommand::default());
        assert!(!mapper.is_action_active());
        assert!(mapper.step_action(0.1).is_none());
    }

    #[test]
    fn test_wiggle_alternates_direction() {
        let mut mapper = ActuatorMapper::new();
        mapper.start_action(ActionType::Wiggle, 0.0);
        let (first, _) = mapper.step_action(0.0).unwrap();
        let (second, _) = mapper.step_action(WIGGLE_HALF_PERIOD_SECS + 0.01).unwrap();
        assert_ne!(first.left.direction, second.left.direction);
    }
}
