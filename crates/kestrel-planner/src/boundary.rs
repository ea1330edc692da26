//! Boundary control points
//!
//! The first and last three control points of the clamped spline are not
//! decision variables: they are fixed by the initial and final kinematic
//! states through the clamped B-spline endpoint-derivative relations at
//! orders 0, 1 and 2. The relations are purely algebraic in the knot
//! spacing, no iteration involved, and must be recomputed whenever the
//! horizon (and with it the knot vector) changes.

use serde::{Deserialize, Serialize};

use kestrel_core::{KnotVector, Vec3};

use crate::config::ConfigError;

/// Position, velocity and acceleration at one end of the trajectory.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BoundaryState {
    pub pos: Vec3,
    pub vel: Vec3,
    pub accel: Vec3,
}

impl BoundaryState {
    /// A boundary at rest at `pos`.
    pub fn at_rest(pos: Vec3) -> Self {
        Self {
            pos,
            vel: Vec3::zeros(),
            accel: Vec3::zeros(),
        }
    }
}

/// The six fixed control points of the clamped spline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryControlPoints {
    /// `q0, q1, q2`
    pub leading: [Vec3; 3],
    /// `q[N-2], q[N-1], q[N]`
    pub trailing: [Vec3; 3],
}

impl BoundaryControlPoints {
    /// Derive the fixed control points from the boundary states and knots.
    ///
    /// The formulas divide by `p - 1`, so `p >= 2` is required; anything
    /// lower is a configuration error.
    pub fn solve(
        initial: &BoundaryState,
        final_: &BoundaryState,
        knots: &KnotVector,
    ) -> Result<Self, ConfigError> {
        let p = knots.degree();
        if p < 2 {
            return Err(ConfigError::DegreeTooLow(p));
        }
        let pf64 = p as f64;
        let n = knots.num_control_points() - 1;
        let k = knots.as_slice();

        let p0 = initial.pos;
        let v0 = initial.vel;
        let a0 = initial.accel;
        let pf = final_.pos;
        let vf = final_.vel;
        let af = final_.accel;

        let t1 = k[1];
        let t2 = k[2];
        let tp1 = k[p + 1];
        let t1p1 = k[p + 2];

        let tn = k[n];
        let tnm1 = k[n - 1];
        let tnp = k[n + p];
        let tnm1p = k[n - 1 + p];

        let q0 = p0;
        let q1 = p0 + (tp1 - t1) * v0 / pf64;
        let q2 = (pf64 * pf64 * q1
            - (t1p1 - t2) * (a0 * (t2 - tp1) + v0)
            - pf64 * (q1 + (t2 - t1p1) * v0))
            / ((pf64 - 1.0) * pf64);

        let qn = pf;
        let qnm1 = pf + (tn - tnp) * vf / pf64;
        let qnm2 = (pf64 * pf64 * qnm1
            - (tnm1 - tnm1p) * (af * (tnm1p - tn) + vf)
            - pf64 * (qnm1 + (tnm1p - tnm1) * vf))
            / ((pf64 - 1.0) * pf64);

        Ok(Self {
            leading: [q0, q1, q2],
            trailing: [qnm2, qnm1, qn],
        })
    }
}
