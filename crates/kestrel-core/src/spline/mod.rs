//! Clamped uniform B-splines and piecewise-polynomial trajectories.
//!
//! The planner works with degree-`p` clamped B-splines over a uniform knot
//! vector: `p+1`-fold boundary knots and equally spaced interior knots. For
//! the cubic case the curve is also convertible, segment by segment, into a
//! power-basis piecewise polynomial.

mod basis;
mod convert;
mod interp;
mod knots;
mod piecewise;

pub use basis::{BSpline, ScalarBSpline};
pub use convert::{cubic_bspline_to_piecewise, sample_states};
pub use interp::interpolating_bspline;
pub use knots::KnotVector;
pub use piecewise::PiecewisePolynomial;

use thiserror::Error;

/// Errors raised by spline construction and evaluation.
#[derive(Debug, Error)]
pub enum SplineError {
    /// Degree unusable for the requested operation.
    #[error("invalid spline degree {0}")]
    InvalidDegree(usize),
    /// The time horizon has no usable span.
    #[error("degenerate time horizon [{t_min}, {t_max}]")]
    DegenerateHorizon { t_min: f64, t_max: f64 },
    /// Knot count does not match the control-point count (M = N + p + 1).
    #[error("knot/control-point mismatch: {num_knots} knots, {num_control_points} control points, degree {degree}")]
    KnotMismatch {
        num_knots: usize,
        num_control_points: usize,
        degree: usize,
    },
    /// Paired input slices differ in length.
    #[error("length mismatch: {left} times vs {right} positions")]
    LengthMismatch { left: usize, right: usize },
    /// A time sequence that must be increasing is not.
    #[error("times must be increasing (violated at index {0})")]
    NonIncreasingTimes(usize),
    /// Too few points for the requested operation.
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    /// Sampling step must be positive.
    #[error("sampling step must be positive, got {0}")]
    InvalidSamplingStep(f64),
    /// The interpolation system could not be solved.
    #[error("interpolation system is singular")]
    SingularInterpolation,
}
