//! Interpolating cubic B-spline fit through timed positions.

use nalgebra::DMatrix;

use crate::Vec3;

use super::basis::{basis_functions, BSpline};
use super::knots::KnotVector;
use super::SplineError;

/// Fit a cubic B-spline through `positions` at the normalized `times`.
///
/// Times are mapped onto `[0, 1]`; knots come from parameter averaging and
/// the control points from the global interpolation system, so the returned
/// spline passes through every input point. Inputs are validated up front:
/// mismatched lengths, non-increasing times and a vanishing time span are
/// all reported as errors rather than producing a garbage fit.
pub fn interpolating_bspline(
    times: &[f64],
    positions: &[Vec3],
) -> Result<BSpline, SplineError> {
    const DEGREE: usize = 3;

    if times.len() != positions.len() {
        return Err(SplineError::LengthMismatch {
            left: times.len(),
            right: positions.len(),
        });
    }
    if times.len() < DEGREE + 1 {
        return Err(SplineError::TooFewPoints {
            needed: DEGREE + 1,
            got: times.len(),
        });
    }
    for i in 0..times.len() - 1 {
        if times[i + 1] <= times[i] {
            return Err(SplineError::NonIncreasingTimes(i));
        }
    }
    let span = times[times.len() - 1] - times[0];
    if span < 1e-7 {
        return Err(SplineError::DegenerateHorizon {
            t_min: times[0],
            t_max: times[times.len() - 1],
        });
    }

    let n = times.len() - 1;
    let params: Vec<f64> = times.iter().map(|t| (t - times[0]) / span).collect();

    // Knot averaging keeps the interpolation system well conditioned.
    let mut knots = vec![0.0; n + DEGREE + 2];
    for j in 1..=(n - DEGREE) {
        let avg: f64 = params[j..j + DEGREE].iter().sum::<f64>() / DEGREE as f64;
        knots[j + DEGREE] = avg;
    }
    for k in knots.iter_mut().skip(n + 1) {
        *k = 1.0;
    }
    let knots = KnotVector::from_raw(DEGREE, knots)?;

    // Collocation matrix A[i][j] = N_{j,3}(params[i])
    let mut a = DMatrix::<f64>::zeros(n + 1, n + 1);
    for (i, &u) in params.iter().enumerate() {
        let s = knots.find_span(u);
        let b = basis_functions(knots.as_slice(), s, DEGREE, u);
        for (k, &bv) in b.iter().enumerate() {
            a[(i, s - DEGREE + k)] = bv;
        }
    }

    let mut rhs = DMatrix::<f64>::zeros(n + 1, 3);
    for (i, p) in positions.iter().enumerate() {
        rhs[(i, 0)] = p.x;
        rhs[(i, 1)] = p.y;
        rhs[(i, 2)] = p.z;
    }

    let solution = a
        .lu()
        .solve(&rhs)
        .ok_or(SplineError::SingularInterpolation)?;

    let control_points: Vec<Vec3> = (0..=n)
        .map(|i| Vec3::new(solution[(i, 0)], solution[(i, 1)], solution[(i, 2)]))
        .collect();

    BSpline::new(knots, control_points)
}
