//! # Kestrel Core
//!
//! Trajectory math for the Kestrel corridor planner.
//!
//! This library implements the spline machinery the planner is built on:
//! clamped uniform B-splines and their derivatives, the piecewise-polynomial
//! trajectory representation, the basis change between the two, and dense
//! kinematic-state sampling.
//!
//! ## Modules
//!
//! - [`spline`]: knot vectors, B-spline evaluation, piecewise polynomials
//! - [`state`]: sampled kinematic states (position through jerk, plus yaw)

pub mod spline;
pub mod state;

// Common type aliases
use nalgebra::{Matrix3, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

pub use spline::{BSpline, KnotVector, PiecewisePolynomial, ScalarBSpline, SplineError};
pub use state::{State, YawState};
