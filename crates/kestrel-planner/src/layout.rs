//! Decision-vector layout
//!
//! The flat parameter vector handed to the solver is partitioned into three
//! contiguous groups: free control-point coordinates, separating-plane
//! normals, and plane offsets. For degree `p` and `S` segments the spline
//! has `M + 1` knots (`M = S + 2p`) and `N + 1` control points
//! (`N = M - p - 1`); control points `0..=2` and `N-2..=N` are fixed by the
//! boundary conditions and own no coordinates in the vector.
//!
//! All index arithmetic lives here and is a pure function of `(p, S, O)`.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kestrel_core::Vec3;

use crate::boundary::BoundaryControlPoints;
use crate::config::{ConfigError, SplineConfig};

/// Index-arithmetic failures. Callers must never query gradient slots for
/// fixed control points; doing so is a bug, reported rather than silently
/// mapped to a wrong index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("control point {index} owns no decision coordinates (free range is 3..={max})")]
    NotAFreeControlPoint { index: usize, max: usize },
    #[error("plane {index} out of range ({count} planes)")]
    PlaneOutOfRange { index: usize, count: usize },
    #[error("expected {expected} {what}, got {got}")]
    WrongCount {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Layout of the flat decision vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VariableLayout {
    degree: usize,
    num_segments: usize,
    num_obstacles: usize,
    /// Index of the last control point, `N`.
    n: usize,
}

impl VariableLayout {
    pub fn new(spline: &SplineConfig, num_obstacles: usize) -> Result<Self, ConfigError> {
        let p = spline.degree;
        if p < 2 {
            return Err(ConfigError::DegreeTooLow(p));
        }
        let m = spline.num_segments + 2 * p;
        let n = m - p - 1;
        if n < 6 {
            return Err(ConfigError::TooFewSegments(spline.num_segments));
        }
        Ok(Self {
            degree: p,
            num_segments: spline.num_segments,
            num_obstacles,
            n,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    pub fn num_obstacles(&self) -> usize {
        self.num_obstacles
    }

    /// Index of the last control point, `N`.
    pub fn last_control_point(&self) -> usize {
        self.n
    }

    /// Total control points, fixed ones included.
    pub fn num_control_points(&self) -> usize {
        self.n + 1
    }

    /// Control points that own coordinates in the decision vector.
    pub fn num_free_control_points(&self) -> usize {
        self.n - 5
    }

    /// One separating plane per (obstacle, segment) pair.
    pub fn num_planes(&self) -> usize {
        self.num_segments * self.num_obstacles
    }

    pub fn num_variables(&self) -> usize {
        3 * self.num_free_control_points() + 4 * self.num_planes()
    }

    pub fn control_point_range(&self) -> Range<usize> {
        0..3 * self.num_free_control_points()
    }

    pub fn normal_range(&self) -> Range<usize> {
        let start = self.control_point_range().end;
        start..start + 3 * self.num_planes()
    }

    pub fn offset_range(&self) -> Range<usize> {
        let start = self.normal_range().end;
        start..start + self.num_planes()
    }

    /// Global index of the first coordinate of free control point `i`.
    pub fn control_point_index(&self, i: usize) -> Result<usize, LayoutError> {
        if !(3..=self.n - 3).contains(&i) {
            return Err(LayoutError::NotAFreeControlPoint {
                index: i,
                max: self.n - 3,
            });
        }
        Ok(3 * i - 9)
    }

    /// Global index of the first coordinate of plane normal `i`.
    pub fn normal_index(&self, i: usize) -> Result<usize, LayoutError> {
        if i >= self.num_planes() {
            return Err(LayoutError::PlaneOutOfRange {
                index: i,
                count: self.num_planes(),
            });
        }
        Ok(self.normal_range().start + 3 * i)
    }

    /// Global index of plane offset `i`.
    pub fn offset_index(&self, i: usize) -> Result<usize, LayoutError> {
        if i >= self.num_planes() {
            return Err(LayoutError::PlaneOutOfRange {
                index: i,
                count: self.num_planes(),
            });
        }
        Ok(self.offset_range().start + i)
    }

    /// Plane index of an (obstacle, segment) pair.
    pub fn plane_index(&self, obstacle: usize, segment: usize) -> Result<usize, LayoutError> {
        if obstacle >= self.num_obstacles || segment >= self.num_segments {
            return Err(LayoutError::PlaneOutOfRange {
                index: obstacle * self.num_segments + segment,
                count: self.num_planes(),
            });
        }
        Ok(obstacle * self.num_segments + segment)
    }

    /// Whether control point `i` is treated as an independent column of the
    /// constraint Jacobian.
    ///
    /// Note the asymmetry against [`Self::control_point_index`]: `q[3]` owns
    /// decision coordinates (the objective gradient writes them) but is
    /// boundary-coupled and contributes no constraint-Jacobian columns.
    pub fn is_decision_control_point(&self, i: usize) -> bool {
        (4..=self.n - 3).contains(&i)
    }

    /// Indices of control points with coordinates in the decision vector.
    pub fn free_control_points(&self) -> impl Iterator<Item = usize> {
        3..=self.n - 3
    }

    /// Expand a flat vector into control points, normals and offsets.
    ///
    /// The six fixed control points are spliced in from `boundary`; the
    /// result always holds the full `N + 1` control polygon.
    pub fn decode(&self, x: &[f64], boundary: &BoundaryControlPoints) -> DecisionVariables {
        debug_assert_eq!(x.len(), self.num_variables());

        let mut control_points = Vec::with_capacity(self.num_control_points());
        control_points.extend_from_slice(&boundary.leading);
        for i in self.control_point_range().step_by(3) {
            control_points.push(Vec3::new(x[i], x[i + 1], x[i + 2]));
        }
        control_points.extend_from_slice(&boundary.trailing);

        let mut normals = Vec::with_capacity(self.num_planes());
        for j in self.normal_range().step_by(3) {
            normals.push(Vec3::new(x[j], x[j + 1], x[j + 2]));
        }

        let offsets: Vec<f64> = self.offset_range().map(|k| x[k]).collect();

        DecisionVariables {
            control_points,
            normals,
            offsets,
        }
    }

    /// Flatten control points, normals and offsets into a decision vector.
    ///
    /// `control_points` must be the full polygon (`N + 1` entries); the six
    /// fixed boundary points are skipped.
    pub fn encode(
        &self,
        control_points: &[Vec3],
        normals: &[Vec3],
        offsets: &[f64],
    ) -> Result<Vec<f64>, LayoutError> {
        if control_points.len() != self.num_control_points() {
            return Err(LayoutError::WrongCount {
                what: "control points",
                expected: self.num_control_points(),
                got: control_points.len(),
            });
        }
        if normals.len() != self.num_planes() {
            return Err(LayoutError::WrongCount {
                what: "normals",
                expected: self.num_planes(),
                got: normals.len(),
            });
        }
        if offsets.len() != self.num_planes() {
            return Err(LayoutError::WrongCount {
                what: "offsets",
                expected: self.num_planes(),
                got: offsets.len(),
            });
        }

        let mut x = Vec::with_capacity(self.num_variables());
        for q in &control_points[3..=self.n - 3] {
            x.extend_from_slice(&[q.x, q.y, q.z]);
        }
        for n in normals {
            x.extend_from_slice(&[n.x, n.y, n.z]);
        }
        x.extend_from_slice(offsets);
        Ok(x)
    }
}

/// Decision vector expanded into semantic groups.
#[derive(Debug, Clone)]
pub struct DecisionVariables {
    /// Full control polygon, fixed boundary points included.
    pub control_points: Vec<Vec3>,
    /// One separating-plane normal per (obstacle, segment) pair.
    pub normals: Vec<Vec3>,
    /// One separating-plane offset per (obstacle, segment) pair.
    pub offsets: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(segments: usize, obstacles: usize) -> VariableLayout {
        VariableLayout::new(
            &SplineConfig {
                degree: 3,
                num_segments: segments,
            },
            obstacles,
        )
        .unwrap()
    }

    #[test]
    fn ranges_are_disjoint_and_cover_everything() {
        for (s, o) in [(5, 0), (5, 1), (7, 2), (10, 3)] {
            let l = layout(s, o);
            let cp = l.control_point_range();
            let nr = l.normal_range();
            let of = l.offset_range();
            assert_eq!(cp.end, nr.start);
            assert_eq!(nr.end, of.start);
            assert_eq!(of.end, l.num_variables());
            assert_eq!(
                cp.len() + nr.len() + of.len(),
                l.num_variables(),
                "segments={s} obstacles={o}"
            );
        }
    }

    #[test]
    fn counts_match_the_spline_arithmetic() {
        // p=3, S=5: M=11, N=7, 8 control points, 2 free
        let l = layout(5, 1);
        assert_eq!(l.num_control_points(), 8);
        assert_eq!(l.num_free_control_points(), 2);
        assert_eq!(l.num_planes(), 5);
        assert_eq!(l.num_variables(), 3 * 2 + 3 * 5 + 5);
    }

    #[test]
    fn decision_predicate_is_exactly_4_to_n_minus_3() {
        let l = layout(7, 1);
        let n = l.last_control_point();
        for i in 0..=n {
            let expected = i >= 4 && i <= n - 3;
            assert_eq!(l.is_decision_control_point(i), expected, "i={i}");
        }
    }

    #[test]
    fn first_free_control_point_maps_to_zero() {
        let l = layout(7, 1);
        assert_eq!(l.control_point_index(3).unwrap(), 0);
        let n = l.last_control_point();
        assert_eq!(
            l.control_point_index(n - 3).unwrap(),
            l.control_point_range().end - 3
        );
    }

    #[test]
    fn fixed_control_points_are_rejected() {
        let l = layout(7, 1);
        let n = l.last_control_point();
        for i in [0, 1, 2, n - 2, n - 1, n] {
            assert!(matches!(
                l.control_point_index(i),
                Err(LayoutError::NotAFreeControlPoint { .. })
            ));
        }
    }

    #[test]
    fn plane_indices_follow_obstacle_major_order() {
        let l = layout(5, 2);
        assert_eq!(l.plane_index(0, 0).unwrap(), 0);
        assert_eq!(l.plane_index(0, 4).unwrap(), 4);
        assert_eq!(l.plane_index(1, 0).unwrap(), 5);
        assert!(l.plane_index(2, 0).is_err());
        assert!(l.plane_index(0, 5).is_err());
    }

    #[test]
    fn decode_then_encode_round_trips() {
        let l = layout(6, 1);
        let boundary = BoundaryControlPoints {
            leading: [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.1, 0.0, 0.0),
                Vec3::new(0.2, 0.0, 0.0),
            ],
            trailing: [
                Vec3::new(9.8, 0.0, 0.0),
                Vec3::new(9.9, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
            ],
        };
        let x: Vec<f64> = (0..l.num_variables()).map(|i| i as f64).collect();
        let vars = l.decode(&x, &boundary);

        assert_eq!(vars.control_points.len(), l.num_control_points());
        assert_eq!(vars.normals.len(), l.num_planes());
        assert_eq!(vars.offsets.len(), l.num_planes());
        assert_eq!(vars.control_points[0], boundary.leading[0]);
        assert_eq!(
            *vars.control_points.last().unwrap(),
            boundary.trailing[2]
        );

        let x2 = l
            .encode(&vars.control_points, &vars.normals, &vars.offsets)
            .unwrap();
        assert_eq!(x, x2);
    }

    #[test]
    fn encode_rejects_wrong_lengths() {
        let l = layout(6, 1);
        let cps = vec![Vec3::zeros(); l.num_control_points() - 1];
        let normals = vec![Vec3::zeros(); l.num_planes()];
        let offsets = vec![0.0; l.num_planes()];
        assert!(matches!(
            l.encode(&cps, &normals, &offsets),
            Err(LayoutError::WrongCount { .. })
        ));
    }
}
