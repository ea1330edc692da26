//! Piecewise cubic polynomial trajectories.

use serde::{Deserialize, Serialize};

use crate::Vec3;

use super::SplineError;

/// A trajectory stored as one cubic per time interval, per axis.
///
/// Coefficients are highest power first, `[a, b, c, d]`, and are evaluated in
/// the normalized local parameter `u = (t - t_j) / (t_{j+1} - t_j)` of the
/// segment's validity interval `[t_j, t_{j+1})`. Derivatives with respect to
/// `t` therefore carry factors of `1 / Δt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiecewisePolynomial {
    times: Vec<f64>,
    coeffs_x: Vec<[f64; 4]>,
    coeffs_y: Vec<[f64; 4]>,
    coeffs_z: Vec<[f64; 4]>,
}

impl PiecewisePolynomial {
    /// Build from breakpoints and per-axis segment coefficients.
    pub fn new(
        times: Vec<f64>,
        coeffs_x: Vec<[f64; 4]>,
        coeffs_y: Vec<[f64; 4]>,
        coeffs_z: Vec<[f64; 4]>,
    ) -> Result<Self, SplineError> {
        if times.len() < 2 {
            return Err(SplineError::TooFewPoints {
                needed: 2,
                got: times.len(),
            });
        }
        let num_segments = times.len() - 1;
        if coeffs_x.len() != num_segments
            || coeffs_y.len() != num_segments
            || coeffs_z.len() != num_segments
        {
            return Err(SplineError::LengthMismatch {
                left: num_segments,
                right: coeffs_x.len(),
            });
        }
        for i in 0..num_segments {
            if times[i + 1] <= times[i] {
                return Err(SplineError::NonIncreasingTimes(i));
            }
        }
        Ok(Self {
            times,
            coeffs_x,
            coeffs_y,
            coeffs_z,
        })
    }

    pub fn num_segments(&self) -> usize {
        self.times.len() - 1
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn t_min(&self) -> f64 {
        self.times[0]
    }

    pub fn t_max(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Coefficients of segment `j` as `(x, y, z)` rows, highest power first.
    pub fn segment_coeffs(&self, j: usize) -> ([f64; 4], [f64; 4], [f64; 4]) {
        (self.coeffs_x[j], self.coeffs_y[j], self.coeffs_z[j])
    }

    /// Index of the segment whose interval contains `t`, clamped at the ends.
    pub fn segment_index(&self, t: f64) -> usize {
        let last = self.num_segments() - 1;
        if t <= self.t_min() {
            return 0;
        }
        if t >= self.times[last] {
            return last;
        }
        let mut j = 0;
        while j < last && self.times[j + 1] <= t {
            j += 1;
        }
        j
    }

    fn local(&self, t: f64) -> (usize, f64, f64) {
        let j = self.segment_index(t);
        let dt = self.times[j + 1] - self.times[j];
        let u = ((t - self.times[j]) / dt).clamp(0.0, 1.0);
        (j, u, dt)
    }

    pub fn position(&self, t: f64) -> Vec3 {
        let (j, u, _) = self.local(t);
        Vec3::new(
            eval_cubic(&self.coeffs_x[j], u),
            eval_cubic(&self.coeffs_y[j], u),
            eval_cubic(&self.coeffs_z[j], u),
        )
    }

    pub fn velocity(&self, t: f64) -> Vec3 {
        let (j, u, dt) = self.local(t);
        Vec3::new(
            eval_cubic_d1(&self.coeffs_x[j], u),
            eval_cubic_d1(&self.coeffs_y[j], u),
            eval_cubic_d1(&self.coeffs_z[j], u),
        ) / dt
    }

    pub fn acceleration(&self, t: f64) -> Vec3 {
        let (j, u, dt) = self.local(t);
        Vec3::new(
            eval_cubic_d2(&self.coeffs_x[j], u),
            eval_cubic_d2(&self.coeffs_y[j], u),
            eval_cubic_d2(&self.coeffs_z[j], u),
        ) / (dt * dt)
    }

    pub fn jerk(&self, t: f64) -> Vec3 {
        let (j, _, dt) = self.local(t);
        Vec3::new(
            6.0 * self.coeffs_x[j][0],
            6.0 * self.coeffs_y[j][0],
            6.0 * self.coeffs_z[j][0],
        ) / (dt * dt * dt)
    }
}

fn eval_cubic(c: &[f64; 4], u: f64) -> f64 {
    ((c[0] * u + c[1]) * u + c[2]) * u + c[3]
}

fn eval_cubic_d1(c: &[f64; 4], u: f64) -> f64 {
    (3.0 * c[0] * u + 2.0 * c[1]) * u + c[2]
}

fn eval_cubic_d2(c: &[f64; 4], u: f64) -> f64 {
    6.0 * c[0] * u + 2.0 * c[1]
}
