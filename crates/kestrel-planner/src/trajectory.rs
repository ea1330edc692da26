//! Trajectory reconstruction
//!
//! Turns a solved control polygon into the two output representations: the
//! piecewise-polynomial form (one cubic per 4-control-point window, via the
//! fixed basis-change matrix) and the densely sampled kinematic-state
//! sequence over `[t_min, t_max]`. A yaw channel can ride along as a
//! degree-2 spline over the position knots with the first and last knot
//! removed.

use serde::{Deserialize, Serialize};

use kestrel_core::spline::{cubic_bspline_to_piecewise, sample_states};
use kestrel_core::{BSpline, KnotVector, PiecewisePolynomial, ScalarBSpline, SplineError, State, Vec3};

/// A solved corridor trajectory in both output representations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorTrajectory {
    /// Piecewise-polynomial form with explicit breakpoints
    pub piecewise: PiecewisePolynomial,
    /// States sampled every `dc` from `t_min` to `t_max` inclusive
    pub samples: Vec<State>,
    /// Full solved control polygon, fixed boundary points included
    pub control_points: Vec<Vec3>,
    /// Separating-plane normals, one per (obstacle, segment) pair
    pub normals: Vec<Vec3>,
    /// Separating-plane offsets
    pub offsets: Vec<f64>,
    /// Objective value at the solution
    pub objective: f64,
}

impl CorridorTrajectory {
    /// Reconstruct both representations from a control polygon.
    ///
    /// Deterministic: identical inputs give identical coefficients.
    pub fn reconstruct(
        control_points: &[Vec3],
        knots: &KnotVector,
        dc: f64,
        yaw_control_points: Option<&[f64]>,
    ) -> Result<(PiecewisePolynomial, Vec<State>), SplineError> {
        let piecewise = cubic_bspline_to_piecewise(control_points, knots)?;
        let spline = BSpline::new(knots.clone(), control_points.to_vec())?;

        let yaw_spline = match yaw_control_points {
            Some(qy) => {
                let raw = knots.as_slice();
                let trimmed = raw[1..raw.len() - 1].to_vec();
                let yaw_knots = KnotVector::from_raw(2, trimmed)?;
                Some(ScalarBSpline::new(yaw_knots, qy.to_vec())?)
            }
            None => None,
        };

        let samples = sample_states(&spline, yaw_spline.as_ref(), dc)?;
        Ok((piecewise, samples))
    }

    pub fn t_min(&self) -> f64 {
        self.piecewise.t_min()
    }

    pub fn t_max(&self) -> f64 {
        self.piecewise.t_max()
    }
}
