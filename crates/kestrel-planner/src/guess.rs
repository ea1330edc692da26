//! Initial-guess strategies
//!
//! Three interchangeable ways of producing a seed decision vector: a
//! straight-line interpolation with per-segment plane fits, a uniform-random
//! draw, and delegation to an external discrete search. Strategies signal
//! failure by returning `None`; the caller falls back to the next one.

use std::time::Duration;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kestrel_core::Vec3;

use crate::boundary::BoundaryControlPoints;
use crate::config::{KinematicLimits, SearchConfig, WorkspaceBounds};
use crate::constraints::ObstacleCorridor;
use crate::layout::VariableLayout;

/// Problem data shared by all guess strategies.
pub struct GuessContext<'a> {
    pub layout: VariableLayout,
    pub boundary: &'a BoundaryControlPoints,
    /// Final position of the trajectory.
    pub goal: Vec3,
    pub corridors: &'a [ObstacleCorridor],
    pub workspace: &'a WorkspaceBounds,
    pub limits: &'a KinematicLimits,
    pub search: &'a SearchConfig,
}

/// An interchangeable seed-vector generator.
pub trait GuessStrategy {
    fn name(&self) -> &'static str;
    /// Produce a full decision vector, or `None` when this strategy cannot.
    fn generate(&mut self, ctx: &GuessContext) -> Option<Vec<f64>>;
}

/// Transform one B-spline window into the Bézier points of the same cubic
/// segment. The Bézier polygon hugs the curve tighter than the B-spline
/// one, which makes the plane fit less conservative.
pub fn window_to_bezier(w: &[Vec3; 4]) -> [Vec3; 4] {
    [
        (w[0] + 4.0 * w[1] + w[2]) / 6.0,
        (4.0 * w[1] + 2.0 * w[2]) / 6.0,
        (2.0 * w[1] + 4.0 * w[2]) / 6.0,
        (w[1] + 4.0 * w[2] + w[3]) / 6.0,
    ]
}

/// Linear separation fit: find `(n, d)` with `n·v + d >= 1` on the hull and
/// `n·q + d <= -1` on the segment points. Returns `None` when the centroid
/// direction does not separate the two sets.
pub fn fit_separating_plane(hull: &[Vec3], points: &[Vec3]) -> Option<(Vec3, f64)> {
    let point_centroid = centroid(points);

    if hull.is_empty() {
        // nothing to separate from; any plane below the points works
        let n = Vec3::new(0.0, 0.0, 1.0);
        let b = points.iter().map(|q| n.dot(q)).fold(f64::NEG_INFINITY, f64::max);
        return Some((n, -b - 2.0));
    }

    let hull_centroid = centroid(hull);
    let w = hull_centroid - point_centroid;
    if w.norm() < 1e-9 {
        return None;
    }

    let a = hull.iter().map(|v| w.dot(v)).fold(f64::INFINITY, f64::min);
    let b = points.iter().map(|q| w.dot(q)).fold(f64::NEG_INFINITY, f64::max);
    let half_gap = (a - b) / 2.0;
    if half_gap <= 1e-9 {
        return None;
    }

    let mid = (a + b) / 2.0;
    let scale = 1.0 / half_gap;
    Some((scale * w, -scale * mid))
}

fn centroid(points: &[Vec3]) -> Vec3 {
    points.iter().fold(Vec3::zeros(), |acc, p| acc + p) / points.len() as f64
}

/// Best-effort plane when the fit fails: the centroid-midpoint plane,
/// separating or not.
fn midpoint_plane(hull: &[Vec3], points: &[Vec3]) -> (Vec3, f64) {
    let point_centroid = centroid(points);
    let hull_centroid = if hull.is_empty() {
        point_centroid + Vec3::new(0.0, 0.0, 1.0)
    } else {
        centroid(hull)
    };
    let mut w = hull_centroid - point_centroid;
    if w.norm() < 1e-9 {
        w = Vec3::new(0.0, 0.0, 1.0);
    }
    let mid = w.dot(&((hull_centroid + point_centroid) / 2.0));
    (w, -mid)
}

/// Fit the per-(obstacle, segment) planes for a given control polygon.
fn fit_corridor_planes(
    ctx: &GuessContext,
    control_points: &[Vec3],
) -> (Vec<Vec3>, Vec<f64>) {
    let planes = ctx.layout.num_planes();
    let mut normals = Vec::with_capacity(planes);
    let mut offsets = Vec::with_capacity(planes);

    for (obst, corridor) in ctx.corridors.iter().enumerate() {
        for (seg, hull) in corridor.iter().enumerate() {
            let window = [
                control_points[seg],
                control_points[seg + 1],
                control_points[seg + 2],
                control_points[seg + 3],
            ];
            let bezier = window_to_bezier(&window);
            let (n, d) = match fit_separating_plane(hull, &bezier) {
                Some(plane) => plane,
                None => {
                    // keep going with a best-effort plane; the solver can
                    // still recover from an unseparated seed
                    debug!("plane fit failed for obstacle {obst}, segment {seg}");
                    midpoint_plane(hull, &bezier)
                }
            };
            normals.push(n);
            offsets.push(d);
        }
    }

    (normals, offsets)
}

/// Free control points linearly interpolated from the third boundary point
/// to the goal, planes fitted per segment.
pub struct StraightLineGuess;

impl GuessStrategy for StraightLineGuess {
    fn name(&self) -> &'static str {
        "straight-line"
    }

    fn generate(&mut self, ctx: &GuessContext) -> Option<Vec<f64>> {
        let n = ctx.layout.last_control_point();
        let interior = n - 5;
        let q2 = ctx.boundary.leading[2];

        let mut q = Vec::with_capacity(n + 1);
        q.extend_from_slice(&ctx.boundary.leading);
        for i in 1..=interior {
            let point = q2 + i as f64 * (ctx.goal - q2) / (interior + 1) as f64;
            q.push(ctx.workspace.saturate(point));
        }
        q.extend_from_slice(&ctx.boundary.trailing);

        let (normals, offsets) = fit_corridor_planes(ctx, &q);
        ctx.layout.encode(&q, &normals, &offsets).ok()
    }
}

/// Uniform-random control points inside the workspace, uniform-random
/// normals and offsets in `[0, 1)`.
pub struct RandomGuess {
    rng: StdRng,
}

impl RandomGuess {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for repeatable runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomGuess {
    fn default() -> Self {
        Self::new()
    }
}

impl GuessStrategy for RandomGuess {
    fn name(&self) -> &'static str {
        "random"
    }

    fn generate(&mut self, ctx: &GuessContext) -> Option<Vec<f64>> {
        let ws = ctx.workspace;
        let n_cp = ctx.layout.num_control_points();

        let q: Vec<Vec3> = (0..n_cp)
            .map(|_| {
                ws.saturate(Vec3::new(
                    self.rng.gen_range(ws.x_min..ws.x_max),
                    self.rng.gen_range(ws.y_min..ws.y_max),
                    self.rng.gen_range(ws.z_min..ws.z_max),
                ))
            })
            .collect();

        let planes = ctx.layout.num_planes();
        let normals: Vec<Vec3> = (0..planes)
            .map(|_| {
                Vec3::new(
                    self.rng.gen_range(0.0..1.0),
                    self.rng.gen_range(0.0..1.0),
                    self.rng.gen_range(0.0..1.0),
                )
            })
            .collect();
        let offsets: Vec<f64> = (0..planes).map(|_| self.rng.gen_range(0.0..1.0)).collect();

        ctx.layout.encode(&q, &normals, &offsets).ok()
    }
}

/// Seed produced by an external discrete search.
#[derive(Debug, Clone)]
pub struct SearchSeed {
    /// Full control polygon, fixed boundary points included.
    pub control_points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub offsets: Vec<f64>,
}

/// Everything the external search needs to run.
pub struct SearchRequest<'a> {
    /// The three fixed leading control points `q0, q1, q2`.
    pub start: [Vec3; 3],
    pub goal: Vec3,
    pub corridors: &'a [ObstacleCorridor],
    pub workspace: &'a WorkspaceBounds,
    pub limits: &'a KinematicLimits,
    pub samples_per_axis: [usize; 3],
    pub max_runtime: Duration,
    pub goal_tolerance: f64,
}

/// External discrete search (e.g. A* over a motion lattice). Returning
/// `None` (failure or budget exhaustion) is a normal outcome.
pub trait CorridorSearch {
    fn search(&mut self, request: &SearchRequest) -> Option<SearchSeed>;
}

/// Delegates seed generation to an external search.
pub struct SearchSeededGuess<S: CorridorSearch> {
    search: S,
}

impl<S: CorridorSearch> SearchSeededGuess<S> {
    pub fn new(search: S) -> Self {
        Self { search }
    }
}

impl<S: CorridorSearch> GuessStrategy for SearchSeededGuess<S> {
    fn name(&self) -> &'static str {
        "search-seeded"
    }

    fn generate(&mut self, ctx: &GuessContext) -> Option<Vec<f64>> {
        let request = SearchRequest {
            start: ctx.boundary.leading,
            goal: ctx.goal,
            corridors: ctx.corridors,
            workspace: ctx.workspace,
            limits: ctx.limits,
            samples_per_axis: ctx.search.samples_per_axis,
            max_runtime: Duration::from_secs_f64(ctx.search.max_runtime),
            goal_tolerance: ctx.search.goal_tolerance,
        };

        let seed = match self.search.search(&request) {
            Some(seed) => seed,
            None => {
                debug!("seeded search found no solution within budget");
                return None;
            }
        };

        match ctx
            .layout
            .encode(&seed.control_points, &seed.normals, &seed.offsets)
        {
            Ok(x) => Some(x),
            Err(err) => {
                debug!("search seed has wrong shape: {err}");
                None
            }
        }
    }
}
