//! Dead-reckoning pose estimation for the rover autonomy stack.

mod estimator;

pub use estimator::{Kinematics, PoseEstimator};
