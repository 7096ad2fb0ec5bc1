//! End-to-end tests across the autonomy stack: pose estimation, occupancy
//! mapping, reactive planning, map persistence, and mode exclusivity.

use control::ActuatorMapper;
use localization::{Kinematics, PoseEstimator};
use occupancy::{MapStore, OccupancyGrid};
use planner::{command_to_joystick, ReactiveConfig, ReactivePlanner};
use state::{Event, StateMachine};
use types::{Direction, ScanFrame, ScanPoint};

mod common;
use common::generate_box_room_scan;

/// Driving forward via the actuator mapper should advance the pose estimator
/// along its heading, and a scan taken there should carve free space and an
/// occupied ring into the grid.
#[test]
fn test_drive_and_scan_builds_occupancy_map() {
    let mut pose = PoseEstimator::new(Kinematics::default());
    let forward = ActuatorMapper::joystick_to_motors(0.0, 80.0);
    assert_eq!(forward.left.direction, Direction::Forward);
    assert_eq!(forward.right.direction, Direction::Forward);

    let mut t = 0.0;
    for _ in 0..20 {
        pose.update(
            forward.left.speed,
            forward.left.direction,
            forward.right.speed,
            forward.right.direction,
            t,
        );
        t += 0.1;
    }
    let p = pose.pose();
    assert!(p.y > 0.0, "driving forward should advance along heading, got y={}", p.y);
    assert!(p.x.abs() < 1e-6);

    let mut grid = OccupancyGrid::new(10.0, 0.05);
    let scan = generate_box_room_scan(6.0, 6.0, 180);
    let frame = ScanFrame {
        timestamp: t,
        points: scan,
    };
    assert!(frame.is_usable());
    grid.update_from_scan(p.x, p.y, p.theta, &frame, 0.1, 8.0);

    let stats = grid.stats();
    assert!(stats.free_cells > 0);
    assert!(stats.occupied_cells > 0);

    grid.detect_walls_and_corners();
    assert!(!grid.walls.is_empty(), "a box room scan should yield detectable wall runs");
}

/// A scan with a nearby obstacle directly ahead should make the reactive
/// planner turn, and that command should mix into an asymmetric motor pair.
#[test]
fn test_reactive_planner_steers_around_close_obstacle() {
    let planner = ReactivePlanner::new(ReactiveConfig::default());

    let mut points = Vec::new();
    for angle in (-180..180).step_by(5) {
        points.push(ScanPoint {
            angle_deg: angle as f64,
            distance_m: 0.1,
            x_m: 0.1 * (angle as f64).to_radians().cos(),
            y_m: 0.1 * (angle as f64).to_radians().sin(),
        });
    }
    for angle in 80..100 {
        points.push(ScanPoint {
            angle_deg: angle as f64,
            distance_m: 3.0,
            x_m: 3.0 * (angle as f64).to_radians().cos(),
            y_m: 3.0 * (angle as f64).to_radians().sin(),
        });
    }

    let cmd = planner.plan_step(&points);
    let (x, y) = command_to_joystick(&cmd);
    let motor_cmd = ActuatorMapper::joystick_to_motors(x, y);

    assert_ne!(
        motor_cmd.left.speed, motor_cmd.right.speed,
        "steering away from a blocked front should produce asymmetric drive"
    );
}

/// A grid built from a scan, saved, listed and reloaded should come back
/// byte-for-byte identical in its cell buffer and scan count.
#[test]
fn test_map_persistence_roundtrip_after_scan_integration() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MapStore::new(tmp.path()).unwrap();

    let mut grid = OccupancyGrid::new(6.0, 0.1);
    let frame = ScanFrame {
        timestamp: 0.0,
        points: generate_box_room_scan(4.0, 4.0, 90),
    };
    grid.update_from_scan(0.0, 0.0, 0.0, &frame, 0.1, 8.0);

    store.save(&mut grid, "Living Room", "epoch:1").unwrap();

    let maps = store.list().unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].name, "Living Room");
    assert_eq!(maps[0].stats.occupied_cells, grid.stats().occupied_cells);

    let loaded = store.load("living_room").unwrap();
    assert_eq!(loaded.scan_count, grid.scan_count);
    assert_eq!(loaded.cells_raw(), grid.cells_raw());

    let frontiers_before = grid.get_frontiers();
    let frontiers_after = loaded.get_frontiers();
    assert_eq!(frontiers_before.len(), frontiers_after.len());
}

/// Mapping, navigation, and exploration are mutually exclusive; starting a
/// second one while one is active is a no-op, and emergency stop always
/// returns to idle regardless of which mode was active.
#[test]
fn test_mode_exclusivity_across_autonomy_modes() {
    let mut sm = StateMachine::new();
    sm.transition(Event::StartMapping);
    assert!(sm.is_mapping());
    assert_eq!(sm.active_exclusive_count(), 1);

    sm.transition(Event::StartNavigation);
    assert!(sm.is_mapping(), "navigation must not preempt an active mapping session");

    sm.transition(Event::StartExploration);
    assert!(sm.is_mapping(), "exploration must not preempt an active mapping session");

    sm.transition(Event::EmergencyStop);
    assert_eq!(sm.active_exclusive_count(), 0);

    sm.transition(Event::StartExploration);
    assert!(sm.is_exploring());
    sm.transition(Event::Stop);
    assert_eq!(sm.active_exclusive_count(), 0);
}

/// A named scripted action polled to completion should hand control back to
/// the joystick mapping cleanly: the last step reports finished and the
/// mapper no longer reports an active action afterward.
#[test]
fn test_named_action_then_resume_joystick_control() {
    use types::ActionType;

    let mut mapper = ActuatorMapper::new();
    mapper.start_action(ActionType::SpinLeft, 0.0);
    assert!(mapper.is_action_active());

    let (cmd, finished) = mapper.step_action(0.05).unwrap();
    assert!(!finished);
    assert_eq!(cmd.left.direction, Direction::Backward);
    assert_eq!(cmd.right.direction, Direction::Forward);

    mapper.stop_action();
    assert!(!mapper.is_action_active());

    let joystick_cmd = ActuatorMapper::joystick_to_motors(0.0, 60.0);
    assert_eq!(joystick_cmd.left.direction, Direction::Forward);
    assert_eq!(joystick_cmd.right.direction, Direction::Forward);
}
