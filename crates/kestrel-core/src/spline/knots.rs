//! Clamped uniform knot vectors.

use serde::{Deserialize, Serialize};

use super::SplineError;

/// Knot vector of a clamped uniform B-spline.
///
/// For degree `p` and `S` polynomial segments the vector has `M + 1` entries
/// with `M = S + 2p`: the first and last knots are repeated `p + 1` times and
/// the interior knots are equally spaced. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnotVector {
    degree: usize,
    knots: Vec<f64>,
}

impl KnotVector {
    /// Build a clamped uniform knot vector over `[t_min, t_max]`.
    pub fn clamped_uniform(
        degree: usize,
        num_segments: usize,
        t_min: f64,
        t_max: f64,
    ) -> Result<Self, SplineError> {
        if degree == 0 {
            return Err(SplineError::InvalidDegree(degree));
        }
        if num_segments == 0 {
            return Err(SplineError::TooFewPoints {
                needed: 1,
                got: 0,
            });
        }
        if !(t_max - t_min).is_finite() || t_max - t_min <= 0.0 {
            return Err(SplineError::DegenerateHorizon { t_min, t_max });
        }

        let p = degree;
        let m = num_segments + 2 * p;
        let delta_t = (t_max - t_min) / num_segments as f64;

        let mut knots = vec![0.0; m + 1];
        for k in knots.iter_mut().take(p + 1) {
            *k = t_min;
        }
        for i in (p + 1)..=(m - p - 1) {
            knots[i] = knots[i - 1] + delta_t;
        }
        for k in knots.iter_mut().skip(m - p) {
            *k = t_max;
        }

        Ok(Self { degree, knots })
    }

    /// Wrap an existing non-decreasing knot sequence.
    ///
    /// Degree 0 is allowed here (derivative splines bottom out at piecewise
    /// constants), unlike [`Self::clamped_uniform`].
    pub fn from_raw(degree: usize, knots: Vec<f64>) -> Result<Self, SplineError> {
        if knots.len() < 2 * (degree + 1).max(1) {
            return Err(SplineError::InvalidDegree(degree));
        }
        for i in 0..knots.len() - 1 {
            if knots[i + 1] < knots[i] {
                return Err(SplineError::NonIncreasingTimes(i));
            }
        }
        Ok(Self { degree, knots })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of knots, `M + 1`.
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Index of the last knot, `M`.
    pub fn last_index(&self) -> usize {
        self.knots.len() - 1
    }

    /// Number of polynomial segments, `M - 2p`.
    pub fn num_segments(&self) -> usize {
        self.last_index() - 2 * self.degree
    }

    /// Number of control points of a compatible spline, `N + 1 = M - p`.
    pub fn num_control_points(&self) -> usize {
        self.last_index() - self.degree
    }

    pub fn t_min(&self) -> f64 {
        self.knots[0]
    }

    pub fn t_max(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    /// Interior knot spacing. Only meaningful for uniform vectors.
    pub fn delta_t(&self) -> f64 {
        (self.t_max() - self.t_min()) / self.num_segments() as f64
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.knots
    }

    /// Knot value at `index`.
    pub fn knot(&self, index: usize) -> f64 {
        self.knots[index]
    }

    /// Knot span containing `t`: the index `i` with `knots[i] <= t < knots[i+1]`,
    /// clamped into the valid range `[p, N]` so that `t = t_max` falls in the
    /// last nonempty span.
    pub fn find_span(&self, t: f64) -> usize {
        let p = self.degree;
        let n = self.num_control_points() - 1;
        if t >= self.knots[n + 1] {
            return n;
        }
        if t <= self.knots[p] {
            return p;
        }
        let mut span = p;
        while span < n && self.knots[span + 1] <= t {
            span += 1;
        }
        span
    }
}
