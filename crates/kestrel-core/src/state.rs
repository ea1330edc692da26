//! Sampled kinematic states.

use serde::{Deserialize, Serialize};

use crate::Vec3;

/// Kinematic state of the vehicle at one sample time.
///
/// Produced by sampling a position spline (derivatives up to jerk) and,
/// when a yaw spline is present, a yaw channel up to its second derivative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Sample time [s]
    pub t: f64,
    /// Position [m]
    pub pos: Vec3,
    /// Velocity [m/s]
    pub vel: Vec3,
    /// Acceleration [m/s²]
    pub accel: Vec3,
    /// Jerk [m/s³]
    pub jerk: Vec3,
    /// Yaw channel, if the trajectory carries one
    pub yaw: Option<YawState>,
}

/// Yaw and its first two derivatives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct YawState {
    /// Yaw angle [rad]
    pub yaw: f64,
    /// Yaw rate [rad/s]
    pub rate: f64,
    /// Yaw acceleration [rad/s²]
    pub accel: f64,
}

impl State {
    /// State at rest at a given position.
    pub fn at_rest(t: f64, pos: Vec3) -> Self {
        Self {
            t,
            pos,
            vel: Vec3::zeros(),
            accel: Vec3::zeros(),
            jerk: Vec3::zeros(),
            yaw: None,
        }
    }
}
