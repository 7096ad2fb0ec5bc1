//! Reactive obstacle avoidance, grid A* search, and waypoint-driven
//! exploration planning.

pub mod astar;
pub mod explore;
pub mod reactive;

pub use astar::{astar as find_path, downsample};
pub use explore::{ExploreAction, ExploreCommand, ExploreConfig, ExplorePlanner};
pub use reactive::{command_to_joystick, Action, ReactiveCommand, ReactiveConfig, ReactivePlanner};
