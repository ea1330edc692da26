//! Separating-plane constraints
//!
//! Per (obstacle, segment) pair the problem carries one plane `(n, d)`. The
//! obstacle's hull vertices must lie on the non-negative side and the
//! segment's four control points on the non-positive side:
//!
//! ```text
//! -(n·v + d) ≤ 0        for every hull vertex v
//!  n·q[s+u] + d ≤ 0     for u = 0..=3
//!  ε - n·n ≤ 0          (normal non-degeneracy)
//! ```
//!
//! The Jacobian is accumulated as (row, col, value) triplets and only
//! scattered into a dense row-major buffer at the solver boundary, so a
//! forgotten zero-fill cannot leak stale entries. Hulls with zero or one
//! vertex are valid degenerate constraint sets, not errors.
//!
//! Velocity/acceleration bounds are deliberately absent from this set; the
//! configured limits only shape the seeded search.

use kestrel_core::Vec3;

use crate::boundary::BoundaryControlPoints;
use crate::config::ConfigError;
use crate::layout::VariableLayout;

/// Convex hull of one obstacle over one trajectory segment.
pub type SegmentHull = Vec<Vec3>;

/// Hulls of one obstacle, one per trajectory segment.
pub type ObstacleCorridor = Vec<SegmentHull>;

/// Sparse (row, col, value) accumulation for the constraint Jacobian.
#[derive(Debug, Clone, Default)]
pub struct JacobianTriplets {
    entries: Vec<(usize, usize, f64)>,
}

impl JacobianTriplets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.entries.push((row, col, value));
    }

    fn push_vec(&mut self, row: usize, first_col: usize, v: Vec3) {
        self.push(row, first_col, v.x);
        self.push(row, first_col + 1, v.y);
        self.push(row, first_col + 2, v.z);
    }

    pub fn entries(&self) -> &[(usize, usize, f64)] {
        &self.entries
    }

    /// Scatter into a dense row-major buffer (`row * num_variables + col`),
    /// zero-filling first.
    pub fn scatter_dense(&self, num_variables: usize, out: &mut [f64]) {
        out.fill(0.0);
        for &(r, c, v) in &self.entries {
            out[r * num_variables + c] += v;
        }
    }

    /// Accumulate `Σ_r weights[r] · ∇g_r` into `out` (not zeroed here).
    pub fn accumulate_weighted(&self, weights: &[f64], out: &mut [f64]) {
        for &(r, c, v) in &self.entries {
            let w = weights[r];
            if w != 0.0 {
                out[c] += w * v;
            }
        }
    }
}

/// Constraint and Jacobian evaluator for the separating-plane set.
pub struct SeparationConstraints {
    layout: VariableLayout,
    boundary: BoundaryControlPoints,
    /// corridors[obstacle][segment] = hull vertices
    corridors: Vec<ObstacleCorridor>,
    normal_epsilon: f64,
    /// First global coordinate of each plane normal / offset.
    normal_slots: Vec<usize>,
    offset_slots: Vec<usize>,
    /// First global coordinate of each control point's decision block, or
    /// `None` where the point contributes no Jacobian columns.
    cp_slots: Vec<Option<usize>>,
}

impl SeparationConstraints {
    pub fn new(
        layout: VariableLayout,
        boundary: BoundaryControlPoints,
        corridors: Vec<ObstacleCorridor>,
        normal_epsilon: f64,
    ) -> Result<Self, ConfigError> {
        if corridors.len() != layout.num_obstacles() {
            return Err(ConfigError::CorridorShape {
                expected: layout.num_obstacles(),
                got: corridors.len(),
                what: "obstacle corridors",
            });
        }
        for corridor in &corridors {
            if corridor.len() != layout.num_segments() {
                return Err(ConfigError::CorridorShape {
                    expected: layout.num_segments(),
                    got: corridor.len(),
                    what: "segment hulls",
                });
            }
        }

        let mut normal_slots = Vec::with_capacity(layout.num_planes());
        let mut offset_slots = Vec::with_capacity(layout.num_planes());
        for i in 0..layout.num_planes() {
            normal_slots.push(layout.normal_index(i)?);
            offset_slots.push(layout.offset_index(i)?);
        }

        let cp_slots = (0..layout.num_control_points())
            .map(|i| {
                if layout.is_decision_control_point(i) {
                    layout.control_point_index(i).ok()
                } else {
                    None
                }
            })
            .collect();

        Ok(Self {
            layout,
            boundary,
            corridors,
            normal_epsilon,
            normal_slots,
            offset_slots,
            cp_slots,
        })
    }

    /// Exact number of constraint rows: one per hull vertex, four per
    /// (obstacle, segment) pair, one non-degeneracy per plane. With zero
    /// obstacles this is zero: no planes, no rows.
    pub fn num_constraints(&self) -> usize {
        let vertex_rows: usize = self
            .corridors
            .iter()
            .flat_map(|c| c.iter().map(|hull| hull.len()))
            .sum();
        vertex_rows + 4 * self.layout.num_planes() + self.layout.num_planes()
    }

    /// Evaluate all rows at `x` into `values`, optionally accumulating the
    /// Jacobian. Returns the number of rows written; the caller checks it
    /// against the declared count.
    pub fn evaluate(
        &self,
        x: &[f64],
        values: &mut [f64],
        mut jacobian: Option<&mut JacobianTriplets>,
    ) -> usize {
        let vars = self.layout.decode(x, &self.boundary);
        let q = &vars.control_points;
        let normals = &vars.normals;
        let offsets = &vars.offsets;

        if let Some(jac) = jacobian.as_deref_mut() {
            jac.clear();
        }

        let mut r = 0;
        for (obst, corridor) in self.corridors.iter().enumerate() {
            for (seg, hull) in corridor.iter().enumerate() {
                let ip = obst * self.layout.num_segments() + seg;
                let n = normals[ip];
                let d = offsets[ip];
                let n_slot = self.normal_slots[ip];
                let d_slot = self.offset_slots[ip];

                // obstacle vertices on the non-negative side
                for vertex in hull {
                    values[r] = -(n.dot(vertex) + d);
                    if let Some(jac) = jacobian.as_deref_mut() {
                        jac.push_vec(r, n_slot, -vertex);
                        jac.push(r, d_slot, -1.0);
                    }
                    r += 1;
                }

                // and the segment's control points on the other
                for u in 0..=3 {
                    let qi = seg + u;
                    values[r] = n.dot(&q[qi]) + d;
                    if let Some(jac) = jacobian.as_deref_mut() {
                        jac.push_vec(r, n_slot, q[qi]);
                        if let Some(cp_slot) = self.cp_slots[qi] {
                            jac.push_vec(r, cp_slot, n);
                        }
                        jac.push(r, d_slot, 1.0);
                    }
                    r += 1;
                }
            }
        }

        // normals must keep at least squared norm epsilon
        for (ip, n) in normals.iter().enumerate() {
            values[r] = self.normal_epsilon - n.dot(n);
            if let Some(jac) = jacobian.as_deref_mut() {
                jac.push_vec(r, self.normal_slots[ip], -2.0 * *n);
            }
            r += 1;
        }

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryState;
    use crate::config::SplineConfig;
    use approx::assert_relative_eq;
    use kestrel_core::KnotVector;

    fn box_hull(center: Vec3, half: f64) -> SegmentHull {
        let mut verts = Vec::new();
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    verts.push(center + half * Vec3::new(sx, sy, sz));
                }
            }
        }
        verts
    }

    fn setup(
        segments: usize,
        corridors: Vec<ObstacleCorridor>,
    ) -> (VariableLayout, SeparationConstraints) {
        let spline = SplineConfig {
            degree: 3,
            num_segments: segments,
        };
        let layout = VariableLayout::new(&spline, corridors.len()).unwrap();
        let knots = KnotVector::clamped_uniform(3, segments, 0.0, segments as f64).unwrap();
        let boundary = BoundaryControlPoints::solve(
            &BoundaryState::at_rest(Vec3::new(0.0, 0.0, 0.0)),
            &BoundaryState::at_rest(Vec3::new(2.0, 0.0, 0.0)),
            &knots,
        )
        .unwrap();
        let constraints = SeparationConstraints::new(layout, boundary, corridors, 1.0).unwrap();
        (layout, constraints)
    }

    #[test]
    fn zero_obstacles_means_zero_rows() {
        let (_, constraints) = setup(5, Vec::new());
        assert_eq!(constraints.num_constraints(), 0);
    }

    #[test]
    fn count_matches_hull_sizes() {
        let segments = 5;
        let corridor: ObstacleCorridor = (0..segments)
            .map(|_| box_hull(Vec3::new(5.0, 5.0, 5.0), 0.5))
            .collect();
        let (layout, constraints) = setup(segments, vec![corridor]);
        // 8 vertices + 4 control points per segment, plus one
        // non-degeneracy row per plane
        assert_eq!(
            constraints.num_constraints(),
            segments * (8 + 4) + layout.num_planes()
        );
    }

    #[test]
    fn dry_run_row_count_matches_declared() {
        let segments = 6;
        let corridor: ObstacleCorridor = (0..segments)
            .map(|i| box_hull(Vec3::new(i as f64, 4.0, 1.0), 0.3))
            .collect();
        let (layout, constraints) = setup(segments, vec![corridor]);

        let x = vec![0.0; layout.num_variables()];
        let mut values = vec![f64::NAN; constraints.num_constraints()];
        let written = constraints.evaluate(&x, &mut values, None);
        assert_eq!(written, constraints.num_constraints());
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn known_separating_plane_satisfies_all_segment_rows() {
        // Hull entirely at x >= 6, control points at x <= 2, plane
        // n = (1,0,0), d = -5: vertices have n·v + d > 0, control points
        // n·q + d < 0, so every separation row is <= 0.
        let segments = 4;
        let corridor: ObstacleCorridor = (0..segments)
            .map(|_| box_hull(Vec3::new(7.0, 0.0, 0.0), 1.0))
            .collect();
        let (layout, constraints) = setup(segments, vec![corridor]);

        let n_free = layout.num_free_control_points();
        let mut x = vec![0.0; layout.num_variables()];
        // free control points strung along x in [0, 2]
        for (k, i) in layout.free_control_points().enumerate() {
            let slot = layout.control_point_index(i).unwrap();
            x[slot] = 2.0 * (k + 1) as f64 / (n_free + 1) as f64;
        }
        for ip in 0..layout.num_planes() {
            x[layout.normal_index(ip).unwrap()] = 1.0;
            x[layout.offset_index(ip).unwrap()] = -5.0;
        }

        let mut values = vec![f64::NAN; constraints.num_constraints()];
        let written = constraints.evaluate(&x, &mut values, None);
        assert_eq!(written, values.len());
        for (r, v) in values.iter().enumerate() {
            assert!(*v <= 0.0, "row {r} violated: {v}");
        }
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let segments = 4;
        let corridor: ObstacleCorridor = (0..segments)
            .map(|i| {
                // uneven hull sizes, including a degenerate single vertex
                if i == 2 {
                    vec![Vec3::new(3.0, 3.0, 3.0)]
                } else {
                    box_hull(Vec3::new(4.0, 2.0, 1.0), 0.4)
                }
            })
            .collect();
        let (layout, constraints) = setup(segments, vec![corridor]);

        let nv = layout.num_variables();
        let m = constraints.num_constraints();
        let x: Vec<f64> = (0..nv)
            .map(|i| 0.17 * (i as f64) - 0.8 + ((i * 3) % 7) as f64 * 0.13)
            .collect();

        let mut values = vec![0.0; m];
        let mut triplets = JacobianTriplets::new();
        constraints.evaluate(&x, &mut values, Some(&mut triplets));
        let mut dense = vec![f64::NAN; m * nv];
        triplets.scatter_dense(nv, &mut dense);

        let h = 1e-6;
        let mut plus = vec![0.0; m];
        let mut minus = vec![0.0; m];
        for k in 0..nv {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[k] += h;
            xm[k] -= h;
            constraints.evaluate(&xp, &mut plus, None);
            constraints.evaluate(&xm, &mut minus, None);
            for r in 0..m {
                let fd = (plus[r] - minus[r]) / (2.0 * h);
                assert_relative_eq!(
                    dense[r * nv + k],
                    fd,
                    epsilon = 1e-6,
                    max_relative = 1e-5
                );
            }
        }
    }

    #[test]
    fn corridor_shape_is_validated() {
        let spline = SplineConfig {
            degree: 3,
            num_segments: 5,
        };
        let layout = VariableLayout::new(&spline, 1).unwrap();
        let knots = KnotVector::clamped_uniform(3, 5, 0.0, 5.0).unwrap();
        let boundary = BoundaryControlPoints::solve(
            &BoundaryState::at_rest(Vec3::zeros()),
            &BoundaryState::at_rest(Vec3::new(1.0, 0.0, 0.0)),
            &knots,
        )
        .unwrap();
        // only 3 segment hulls for a 5-segment layout
        let corridor: ObstacleCorridor = vec![Vec::new(); 3];
        assert!(matches!(
            SeparationConstraints::new(layout, boundary, vec![corridor], 1.0),
            Err(ConfigError::CorridorShape { .. })
        ));
    }
}
