//! B-spline curves: Cox–de Boor evaluation and derivative splines.

use crate::Vec3;

use super::{KnotVector, SplineError};

/// Nonzero basis functions `N_{span-p..=span, p}(t)`, Cox–de Boor recursion.
///
/// Returns `p + 1` values. `span` must come from [`KnotVector::find_span`].
pub(crate) fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let p = degree;
    let mut values = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];

    values[0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom != 0.0 { values[r] / denom } else { 0.0 };
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}

/// A 3D B-spline curve: degree, knot vector, control polygon.
#[derive(Debug, Clone)]
pub struct BSpline {
    knots: KnotVector,
    control_points: Vec<Vec3>,
}

impl BSpline {
    /// Build a curve, checking `M = N + p + 1`.
    pub fn new(knots: KnotVector, control_points: Vec<Vec3>) -> Result<Self, SplineError> {
        if knots.len() != control_points.len() + knots.degree() + 1 {
            return Err(SplineError::KnotMismatch {
                num_knots: knots.len(),
                num_control_points: control_points.len(),
                degree: knots.degree(),
            });
        }
        Ok(Self {
            knots,
            control_points,
        })
    }

    pub fn degree(&self) -> usize {
        self.knots.degree()
    }

    pub fn knots(&self) -> &KnotVector {
        &self.knots
    }

    pub fn control_points(&self) -> &[Vec3] {
        &self.control_points
    }

    pub fn t_min(&self) -> f64 {
        self.knots.t_min()
    }

    pub fn t_max(&self) -> f64 {
        self.knots.t_max()
    }

    /// Curve position at `t` (clamped into the knot span range).
    pub fn evaluate(&self, t: f64) -> Vec3 {
        let p = self.degree();
        let span = self.knots.find_span(t);
        let basis = basis_functions(self.knots.as_slice(), span, p, t);
        let mut point = Vec3::zeros();
        for (j, b) in basis.iter().enumerate() {
            point += *b * self.control_points[span - p + j];
        }
        point
    }

    /// The derivative curve: degree `p - 1`, control points
    /// `p (q[i+1] - q[i]) / (u[i+p+1] - u[i+1])`, knots with the first and
    /// last entry dropped.
    pub fn derivative(&self) -> Result<BSpline, SplineError> {
        let p = self.degree();
        if p < 1 {
            return Err(SplineError::InvalidDegree(p));
        }
        let u = self.knots.as_slice();
        let n = self.control_points.len() - 1;

        let mut dcp = Vec::with_capacity(n);
        for i in 0..n {
            let denom = u[i + p + 1] - u[i + 1];
            let cp = if denom > 0.0 {
                (p as f64 / denom) * (self.control_points[i + 1] - self.control_points[i])
            } else {
                Vec3::zeros()
            };
            dcp.push(cp);
        }

        let dknots = KnotVector::from_raw(p - 1, u[1..u.len() - 1].to_vec())?;
        BSpline::new(dknots, dcp)
    }

    /// Evaluate the curve and its derivatives up to `order` at `t`.
    ///
    /// Returns `order + 1` vectors; derivatives beyond the spline degree are
    /// zero.
    pub fn derivatives(&self, t: f64, order: usize) -> Result<Vec<Vec3>, SplineError> {
        let mut out = Vec::with_capacity(order + 1);
        out.push(self.evaluate(t));
        let mut current = self.clone();
        for _ in 0..order {
            if current.degree() == 0 {
                out.push(Vec3::zeros());
                continue;
            }
            current = current.derivative()?;
            out.push(current.evaluate(t));
        }
        Ok(out)
    }
}

/// A scalar-valued B-spline (used for the yaw channel).
#[derive(Debug, Clone)]
pub struct ScalarBSpline {
    knots: KnotVector,
    control_points: Vec<f64>,
}

impl ScalarBSpline {
    pub fn new(knots: KnotVector, control_points: Vec<f64>) -> Result<Self, SplineError> {
        if knots.len() != control_points.len() + knots.degree() + 1 {
            return Err(SplineError::KnotMismatch {
                num_knots: knots.len(),
                num_control_points: control_points.len(),
                degree: knots.degree(),
            });
        }
        Ok(Self {
            knots,
            control_points,
        })
    }

    pub fn degree(&self) -> usize {
        self.knots.degree()
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let p = self.degree();
        let span = self.knots.find_span(t);
        let basis = basis_functions(self.knots.as_slice(), span, p, t);
        basis
            .iter()
            .enumerate()
            .map(|(j, b)| b * self.control_points[span - p + j])
            .sum()
    }

    pub fn derivative(&self) -> Result<ScalarBSpline, SplineError> {
        let p = self.degree();
        if p < 1 {
            return Err(SplineError::InvalidDegree(p));
        }
        let u = self.knots.as_slice();
        let n = self.control_points.len() - 1;

        let mut dcp = Vec::with_capacity(n);
        for i in 0..n {
            let denom = u[i + p + 1] - u[i + 1];
            let cp = if denom > 0.0 {
                (p as f64 / denom) * (self.control_points[i + 1] - self.control_points[i])
            } else {
                0.0
            };
            dcp.push(cp);
        }

        let dknots = KnotVector::from_raw(p - 1, u[1..u.len() - 1].to_vec())?;
        ScalarBSpline::new(dknots, dcp)
    }

    pub fn derivatives(&self, t: f64, order: usize) -> Result<Vec<f64>, SplineError> {
        let mut out = Vec::with_capacity(order + 1);
        out.push(self.evaluate(t));
        let mut current = self.clone();
        for _ in 0..order {
            if current.degree() == 0 {
                out.push(0.0);
                continue;
            }
            current = current.derivative()?;
            out.push(current.evaluate(t));
        }
        Ok(out)
    }
}
