//! Smoothness objective
//!
//! Cost over the control polygon: the summed squared norm of the discrete
//! second difference `q[i+1] - 2q[i] + q[i-1]`, a jerk proxy for the uniform
//! B-spline. The sum runs over every interior control point, fixed boundary
//! points included; they contribute curvature penalty even though they are
//! not optimized. The gradient is only assembled for control points that own
//! decision coordinates; normal and offset entries stay zero.

use kestrel_core::Vec3;

use crate::boundary::BoundaryControlPoints;
use crate::layout::{LayoutError, VariableLayout};

/// Objective and analytic-gradient evaluator.
pub struct SmoothnessObjective {
    layout: VariableLayout,
    boundary: BoundaryControlPoints,
    /// (control point, first global coordinate) for every free control point.
    gradient_slots: Vec<(usize, usize)>,
}

impl SmoothnessObjective {
    pub fn new(
        layout: VariableLayout,
        boundary: BoundaryControlPoints,
    ) -> Result<Self, LayoutError> {
        let mut gradient_slots = Vec::with_capacity(layout.num_free_control_points());
        for i in layout.free_control_points() {
            gradient_slots.push((i, layout.control_point_index(i)?));
        }
        Ok(Self {
            layout,
            boundary,
            gradient_slots,
        })
    }

    /// Evaluate the cost; when a gradient buffer is supplied it is fully
    /// zeroed before the sparse control-point entries are written.
    pub fn evaluate(&self, x: &[f64], gradient: Option<&mut [f64]>) -> f64 {
        let vars = self.layout.decode(x, &self.boundary);
        let q = &vars.control_points;
        let n = self.layout.last_control_point();

        let mut cost = 0.0;
        for i in 1..n {
            cost += (q[i + 1] - 2.0 * q[i] + q[i - 1]).norm_squared();
        }

        if let Some(grad) = gradient {
            grad.fill(0.0);
            for &(i, slot) in &self.gradient_slots {
                let g: Vec3 = 2.0 * (q[i] - 2.0 * q[i - 1] + q[i - 2])
                    - 4.0 * (q[i + 1] - 2.0 * q[i] + q[i - 1])
                    + 2.0 * (q[i + 2] - 2.0 * q[i + 1] + q[i]);
                grad[slot] = g.x;
                grad[slot + 1] = g.y;
                grad[slot + 2] = g.z;
            }
        }

        cost
    }
}
