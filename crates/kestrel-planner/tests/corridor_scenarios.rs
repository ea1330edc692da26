//! End-to-end solve scenarios for the corridor planner.

use approx::assert_relative_eq;
use kestrel_core::Vec3;
use kestrel_planner::boundary::BoundaryState;
use kestrel_planner::config::PlannerConfig;
use kestrel_planner::guess::{GuessContext, GuessStrategy, RandomGuess, StraightLineGuess};
use kestrel_planner::planner::{CorridorPlanner, SessionState};

fn box_hull(center: Vec3, half: f64) -> Vec<Vec3> {
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

fn test_config(num_segments: usize) -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.spline.num_segments = num_segments;
    // generous budget so debug builds converge deterministically
    config.solver.max_solve_time = 5.0;
    config.sampling_step = 0.05;
    config
}

#[test]
fn rest_to_rest_without_obstacles_converges() {
    let mut planner = CorridorPlanner::new(test_config(5)).unwrap();

    let start = BoundaryState::at_rest(Vec3::new(0.0, 0.0, 0.0));
    let goal = BoundaryState::at_rest(Vec3::new(10.0, 10.0, 10.0));
    planner.configure_horizon(0.0, 4.0, &start, &goal).unwrap();

    // zero obstacles: no planes, no constraints
    let count = planner.size_constraints().unwrap();
    assert_eq!(count, 0);

    let seed = {
        let ctx = planner.guess_context().unwrap();
        StraightLineGuess.generate(&ctx).unwrap()
    };
    let trajectory = planner.solve(&seed).unwrap();
    assert_eq!(planner.state(), SessionState::Converged);

    let first = trajectory.samples.first().unwrap();
    assert_relative_eq!((first.pos - start.pos).norm(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(first.vel.norm(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(first.accel.norm(), 0.0, epsilon = 1e-6);

    let last = trajectory.samples.last().unwrap();
    assert_relative_eq!((last.pos - goal.pos).norm(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(last.vel.norm(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(last.accel.norm(), 0.0, epsilon = 1e-6);

    // the two output representations describe the same trajectory
    for state in &trajectory.samples {
        assert_relative_eq!(
            (trajectory.piecewise.position(state.t) - state.pos).norm(),
            0.0,
            epsilon = 1e-8
        );
    }
}

#[test]
fn corridor_with_one_obstacle_stays_separated() {
    let num_segments = 6;
    let mut planner = CorridorPlanner::new(test_config(num_segments)).unwrap();

    let start = BoundaryState::at_rest(Vec3::new(0.0, 0.0, 1.0));
    let goal = BoundaryState::at_rest(Vec3::new(6.0, 0.0, 1.0));
    planner.configure_horizon(0.0, 3.0, &start, &goal).unwrap();

    // an obstacle beside the path, same hull for every segment
    let corridor: Vec<Vec<Vec3>> = (0..num_segments)
        .map(|_| box_hull(Vec3::new(3.0, 4.0, 1.0), 0.5))
        .collect();
    planner.set_corridors(vec![corridor.clone()]);

    let count = planner.size_constraints().unwrap();
    assert_eq!(count, num_segments * (8 + 4) + num_segments);

    let seed = {
        let ctx = planner.guess_context().unwrap();
        StraightLineGuess.generate(&ctx).unwrap()
    };
    let trajectory = planner.solve(&seed).unwrap();

    // every solved plane separates the hull from its segment's control
    // points, within the solver's constraint tolerance
    let tol = planner.config().solver.constraint_tol + 1e-6;
    for seg in 0..num_segments {
        let n = trajectory.normals[seg];
        let d = trajectory.offsets[seg];
        for v in &corridor[seg] {
            assert!(n.dot(v) + d >= -tol, "segment {seg}: vertex on wrong side");
        }
        for u in 0..=3 {
            let q = trajectory.control_points[seg + u];
            assert!(n.dot(&q) + d <= tol, "segment {seg}: control point on wrong side");
        }
    }
}

#[test]
fn failed_solve_reports_failure_and_allows_retry() {
    let num_segments = 6;
    let mut config = test_config(num_segments);
    // starve the solver so the first attempt cannot reach feasibility
    config.solver.max_evaluations = 2;

    let mut planner = CorridorPlanner::new(config).unwrap();
    let start = BoundaryState::at_rest(Vec3::new(0.0, 0.0, 1.0));
    let goal = BoundaryState::at_rest(Vec3::new(6.0, 0.0, 1.0));
    planner.configure_horizon(0.0, 3.0, &start, &goal).unwrap();

    // obstacle sitting on the straight path: the straight-line seed starts
    // infeasible, and two evaluations cannot fix that
    let corridor: Vec<Vec<Vec3>> = (0..num_segments)
        .map(|_| box_hull(Vec3::new(3.0, 0.0, 1.0), 0.4))
        .collect();
    planner.set_corridors(vec![corridor]);
    planner.size_constraints().unwrap();

    let seed = {
        let ctx = planner.guess_context().unwrap();
        StraightLineGuess.generate(&ctx).unwrap()
    };
    let result = planner.solve(&seed);
    assert!(result.is_err());
    assert_eq!(planner.state(), SessionState::Failed);

    // the caller may retry with a different guess on the same session
    let seed2 = {
        let ctx = planner.guess_context().unwrap();
        RandomGuess::with_seed(3).generate(&ctx).unwrap()
    };
    let retry = planner.solve(&seed2);
    // still starved, still an error, but the session handled it cleanly
    assert!(retry.is_err());
}

#[test]
fn strategy_fallback_skips_failing_generators() {
    struct NeverGuess;
    impl GuessStrategy for NeverGuess {
        fn name(&self) -> &'static str {
            "never"
        }
        fn generate(&mut self, _ctx: &GuessContext) -> Option<Vec<f64>> {
            None
        }
    }

    let mut planner = CorridorPlanner::new(test_config(5)).unwrap();
    let start = BoundaryState::at_rest(Vec3::new(0.0, 0.0, 0.0));
    let goal = BoundaryState::at_rest(Vec3::new(5.0, 0.0, 2.0));
    planner.configure_horizon(0.0, 2.5, &start, &goal).unwrap();
    planner.size_constraints().unwrap();

    let mut never = NeverGuess;
    let mut line = StraightLineGuess;
    let trajectory = planner
        .solve_with_strategies(&mut [&mut never, &mut line])
        .unwrap();
    assert!(!trajectory.samples.is_empty());
    assert_eq!(planner.state(), SessionState::Converged);
}
