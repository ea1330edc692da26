//! Basis change from uniform cubic B-splines to piecewise polynomials, and
//! dense kinematic-state sampling.

use crate::state::{State, YawState};
use crate::Vec3;

use super::basis::{BSpline, ScalarBSpline};
use super::knots::KnotVector;
use super::piecewise::PiecewisePolynomial;
use super::SplineError;

/// Basis-change matrix for one uniform cubic B-spline window, scaled by 1/6.
/// Row `k` holds the weights of the power-`k` coefficient (constant first).
const BSPLINE_TO_POWER: [[f64; 4]; 4] = [
    [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0, 0.0],
    [-3.0 / 6.0, 0.0, 3.0 / 6.0, 0.0],
    [3.0 / 6.0, -6.0 / 6.0, 3.0 / 6.0, 0.0],
    [-1.0 / 6.0, 3.0 / 6.0, -3.0 / 6.0, 1.0 / 6.0],
];

fn window_coeffs(w: [f64; 4]) -> [f64; 4] {
    let c: Vec<f64> = BSPLINE_TO_POWER
        .iter()
        .map(|row| row.iter().zip(w.iter()).map(|(m, q)| m * q).sum())
        .collect();
    // stored highest power first
    [c[3], c[2], c[1], c[0]]
}

/// Convert a clamped uniform cubic B-spline into its piecewise-polynomial
/// form: one cubic per 4-control-point window, breakpoints at
/// `knots[p ..= p + num_segments]`, coefficients in the normalized local
/// parameter of each interval.
///
/// Away from the boundary knots the result matches the spline exactly; on
/// the first and last windows it matches exactly when the three leading and
/// trailing control points each coincide (rest endpoints).
pub fn cubic_bspline_to_piecewise(
    control_points: &[Vec3],
    knots: &KnotVector,
) -> Result<PiecewisePolynomial, SplineError> {
    if knots.degree() != 3 {
        return Err(SplineError::InvalidDegree(knots.degree()));
    }
    if knots.len() != control_points.len() + 4 {
        return Err(SplineError::KnotMismatch {
            num_knots: knots.len(),
            num_control_points: control_points.len(),
            degree: 3,
        });
    }

    let num_segments = knots.num_segments();
    let times: Vec<f64> = (3..=3 + num_segments).map(|i| knots.knot(i)).collect();

    let mut cx = Vec::with_capacity(num_segments);
    let mut cy = Vec::with_capacity(num_segments);
    let mut cz = Vec::with_capacity(num_segments);
    for j in 0..num_segments {
        let w = &control_points[j..j + 4];
        cx.push(window_coeffs([w[0].x, w[1].x, w[2].x, w[3].x]));
        cy.push(window_coeffs([w[0].y, w[1].y, w[2].y, w[3].y]));
        cz.push(window_coeffs([w[0].z, w[1].z, w[2].z, w[3].z]));
    }

    PiecewisePolynomial::new(times, cx, cy, cz)
}

/// Sample kinematic states at a fixed step over the spline's full horizon,
/// endpoints included.
///
/// Position derivatives are taken up to jerk; the yaw spline, when present,
/// up to its second derivative.
pub fn sample_states(
    position: &BSpline,
    yaw: Option<&ScalarBSpline>,
    dc: f64,
) -> Result<Vec<State>, SplineError> {
    if !(dc > 0.0) {
        return Err(SplineError::InvalidSamplingStep(dc));
    }

    let t_min = position.t_min();
    let t_max = position.t_max();

    let d1 = position.derivative()?;
    let d2 = d1.derivative()?;
    let d3 = d2.derivative()?;

    let yaw_chain = match yaw {
        Some(y) => {
            let y1 = y.derivative()?;
            let y2 = y1.derivative()?;
            Some((y, y1, y2))
        }
        None => None,
    };

    let sample = |t: f64| -> State {
        let yaw = yaw_chain.as_ref().map(|(y0, y1, y2)| YawState {
            yaw: y0.evaluate(t),
            rate: y1.evaluate(t),
            accel: y2.evaluate(t),
        });
        State {
            t,
            pos: position.evaluate(t),
            vel: d1.evaluate(t),
            accel: d2.evaluate(t),
            jerk: d3.evaluate(t),
            yaw,
        }
    };

    let mut states = Vec::new();
    let mut k = 0usize;
    loop {
        let t = t_min + k as f64 * dc;
        if t > t_max {
            break;
        }
        states.push(sample(t));
        k += 1;
    }
    // make the horizon end inclusive even when dc does not divide it
    if states.last().map_or(true, |s| t_max - s.t > 1e-9) {
        states.push(sample(t_max));
    }

    Ok(states)
}
