//! Solve-session driver
//!
//! Owns a decision vector's worth of problem definition and walks the
//! session through its states:
//!
//! ```text
//! Unconfigured → BoundarySet → ConstraintsSized → Solving → {Converged, Failed}
//! ```
//!
//! The horizon fixes the knot vector and the six boundary control points.
//! A dry-run constraint evaluation with a zero decision vector then
//! determines the exact constraint count (it depends on the corridor hull
//! vertex counts), which must match the declared count exactly. Each solve
//! owns a freshly built solver; solver state never survives a session,
//! and the problem-definition fields are read-only while one is running.

use log::{info, warn};
use thiserror::Error;

use kestrel_core::{KnotVector, SplineError, Vec3};

use crate::boundary::{BoundaryControlPoints, BoundaryState};
use crate::config::{ConfigError, PlannerConfig};
use crate::constraints::{JacobianTriplets, ObstacleCorridor, SeparationConstraints};
use crate::guess::{GuessContext, GuessStrategy};
use crate::layout::{LayoutError, VariableLayout};
use crate::objective::SmoothnessObjective;
use crate::solver::{AugLagSolver, NlpProblem, SolveStats, SolveStatus, SolverOptions};
use crate::trajectory::CorridorTrajectory;

/// Planner-level errors. Solver non-convergence is recoverable (retry with
/// another guess or a bigger budget); configuration failures are not.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Spline(#[from] SplineError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("session is {actual:?}, expected at least {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error("solver stopped without an acceptable point: {status:?}")]
    Unconverged { status: SolveStatus },
    #[error("no initial-guess strategy produced a usable seed")]
    NoGuess,
}

/// Session state machine of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    BoundarySet,
    ConstraintsSized,
    Solving,
    Converged,
    Failed,
}

/// Horizon-dependent problem data, rebuilt whenever the horizon changes.
struct Horizon {
    knots: KnotVector,
    boundary: BoundaryControlPoints,
    goal: Vec3,
}

/// Evaluators and sizing produced by the dry run.
struct SizedProblem {
    layout: VariableLayout,
    objective: SmoothnessObjective,
    constraints: SeparationConstraints,
    num_constraints: usize,
}

struct CorridorProblem<'a> {
    sized: &'a SizedProblem,
}

impl NlpProblem for CorridorProblem<'_> {
    fn num_variables(&self) -> usize {
        self.sized.layout.num_variables()
    }

    fn num_constraints(&self) -> usize {
        self.sized.num_constraints
    }

    fn objective(&self, x: &[f64], gradient: Option<&mut [f64]>) -> f64 {
        self.sized.objective.evaluate(x, gradient)
    }

    fn constraints(
        &self,
        x: &[f64],
        values: &mut [f64],
        jacobian: Option<&mut JacobianTriplets>,
    ) -> usize {
        self.sized.constraints.evaluate(x, values, jacobian)
    }
}

/// The corridor trajectory optimizer.
///
/// Not re-entrant: one solve at a time per instance. Callers needing
/// parallel solves use independent instances.
pub struct CorridorPlanner {
    config: PlannerConfig,
    corridors: Vec<ObstacleCorridor>,
    state: SessionState,
    horizon: Option<Horizon>,
    sized: Option<SizedProblem>,
    last_stats: Option<SolveStats>,
}

impl CorridorPlanner {
    /// Validate the configuration and create an unconfigured session.
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        Ok(Self {
            config,
            corridors: Vec::new(),
            state: SessionState::Unconfigured,
            horizon: None,
            sized: None,
            last_stats: None,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stats of the most recent solve, if any.
    pub fn last_stats(&self) -> Option<&SolveStats> {
        self.last_stats.as_ref()
    }

    /// Supply the obstacle corridors (one hull per segment, per obstacle).
    /// Invalidates any previous constraint sizing.
    pub fn set_corridors(&mut self, corridors: Vec<ObstacleCorridor>) {
        self.corridors = corridors;
        self.sized = None;
        if self.state != SessionState::Unconfigured {
            self.state = SessionState::BoundarySet;
        }
    }

    /// Fix the time horizon and boundary conditions; computes the knot
    /// vector and the six fixed control points.
    pub fn configure_horizon(
        &mut self,
        t_min: f64,
        t_max: f64,
        initial: &BoundaryState,
        final_: &BoundaryState,
    ) -> Result<(), PlannerError> {
        let knots = KnotVector::clamped_uniform(
            self.config.spline.degree,
            self.config.spline.num_segments,
            t_min,
            t_max,
        )?;
        let boundary = BoundaryControlPoints::solve(initial, final_, &knots)?;
        self.horizon = Some(Horizon {
            knots,
            boundary,
            goal: final_.pos,
        });
        self.sized = None;
        self.state = SessionState::BoundarySet;
        Ok(())
    }

    /// Dry-run the constraint evaluation with a zero decision vector to pin
    /// down the exact constraint count. Declared-vs-computed mismatch is a
    /// fatal configuration error.
    pub fn size_constraints(&mut self) -> Result<usize, PlannerError> {
        let horizon = self.horizon.as_ref().ok_or(PlannerError::InvalidState {
            expected: SessionState::BoundarySet,
            actual: self.state,
        })?;

        let layout = VariableLayout::new(&self.config.spline, self.corridors.len())?;
        let objective = SmoothnessObjective::new(layout, horizon.boundary.clone())?;
        let constraints = SeparationConstraints::new(
            layout,
            horizon.boundary.clone(),
            self.corridors.clone(),
            self.config.solver.normal_epsilon,
        )?;

        let declared = constraints.num_constraints();
        let zero = vec![0.0; layout.num_variables()];
        let mut values = vec![0.0; declared];
        let computed = constraints.evaluate(&zero, &mut values, None);
        if computed != declared {
            return Err(ConfigError::ConstraintCountMismatch { declared, computed }.into());
        }

        info!(
            "problem sized: {} variables, {} constraints, {} planes",
            layout.num_variables(),
            declared,
            layout.num_planes()
        );

        self.sized = Some(SizedProblem {
            layout,
            objective,
            constraints,
            num_constraints: declared,
        });
        self.state = SessionState::ConstraintsSized;
        Ok(declared)
    }

    /// Layout of the decision vector; available once constraints are sized.
    pub fn layout(&self) -> Result<VariableLayout, PlannerError> {
        self.sized
            .as_ref()
            .map(|s| s.layout)
            .ok_or(PlannerError::InvalidState {
                expected: SessionState::ConstraintsSized,
                actual: self.state,
            })
    }

    /// Everything the guess strategies need to build a seed vector.
    pub fn guess_context(&self) -> Result<GuessContext<'_>, PlannerError> {
        let horizon = self.horizon.as_ref().ok_or(PlannerError::InvalidState {
            expected: SessionState::BoundarySet,
            actual: self.state,
        })?;
        let sized = self.sized.as_ref().ok_or(PlannerError::InvalidState {
            expected: SessionState::ConstraintsSized,
            actual: self.state,
        })?;
        Ok(GuessContext {
            layout: sized.layout,
            boundary: &horizon.boundary,
            goal: horizon.goal,
            corridors: &self.corridors,
            workspace: &self.config.workspace,
            limits: &self.config.limits,
            search: &self.config.search,
        })
    }

    /// Run one solve from the given seed vector.
    ///
    /// A fresh solver is instantiated for this call and dropped with it. On
    /// failure the prior decision vector is discarded and no trajectory is
    /// produced.
    pub fn solve(&mut self, x0: &[f64]) -> Result<CorridorTrajectory, PlannerError> {
        {
            let sized = self.sized.as_ref().ok_or(PlannerError::InvalidState {
                expected: SessionState::ConstraintsSized,
                actual: self.state,
            })?;
            if x0.len() != sized.layout.num_variables() {
                return Err(LayoutError::WrongCount {
                    what: "decision variables",
                    expected: sized.layout.num_variables(),
                    got: x0.len(),
                }
                .into());
            }
        }

        self.state = SessionState::Solving;
        let outcome = {
            let sized = self.sized.as_ref().ok_or(PlannerError::InvalidState {
                expected: SessionState::ConstraintsSized,
                actual: self.state,
            })?;
            let problem = CorridorProblem { sized };
            let solver = AugLagSolver::new(SolverOptions::from_config(&self.config.solver));
            solver.minimize(&problem, x0)
        };
        self.last_stats = Some(outcome.stats.clone());

        if !outcome.status.is_success() {
            warn!("solve failed with status {:?}", outcome.status);
            self.state = SessionState::Failed;
            return Err(PlannerError::Unconverged {
                status: outcome.status,
            });
        }

        let built = (|| -> Result<CorridorTrajectory, PlannerError> {
            let sized = self.sized.as_ref().ok_or(PlannerError::InvalidState {
                expected: SessionState::ConstraintsSized,
                actual: self.state,
            })?;
            let horizon = self.horizon.as_ref().ok_or(PlannerError::InvalidState {
                expected: SessionState::BoundarySet,
                actual: self.state,
            })?;
            let vars = sized.layout.decode(&outcome.x, &horizon.boundary);
            let (piecewise, samples) = CorridorTrajectory::reconstruct(
                &vars.control_points,
                &horizon.knots,
                self.config.sampling_step,
                None,
            )?;
            Ok(CorridorTrajectory {
                piecewise,
                samples,
                control_points: vars.control_points,
                normals: vars.normals,
                offsets: vars.offsets,
                objective: outcome.objective,
            })
        })();
        let trajectory = match built {
            Ok(trajectory) => trajectory,
            Err(err) => {
                self.state = SessionState::Failed;
                return Err(err);
            }
        };

        info!(
            "solve converged: objective {:.6}, {} samples",
            trajectory.objective,
            trajectory.samples.len()
        );
        self.state = SessionState::Converged;
        Ok(trajectory)
    }

    /// Try guess strategies in order until one yields a seed whose solve
    /// succeeds. Strategy failure (no seed) is a normal outcome and falls
    /// through to the next one.
    pub fn solve_with_strategies(
        &mut self,
        strategies: &mut [&mut dyn GuessStrategy],
    ) -> Result<CorridorTrajectory, PlannerError> {
        let mut last_err = PlannerError::NoGuess;
        for strategy in strategies.iter_mut() {
            let seed = {
                let ctx = self.guess_context()?;
                strategy.generate(&ctx)
            };
            let Some(x0) = seed else {
                info!("guess strategy {} produced no seed", strategy.name());
                continue;
            };
            match self.solve(&x0) {
                Ok(trajectory) => return Ok(trajectory),
                Err(err @ PlannerError::Unconverged { .. }) => {
                    warn!("solve from {} seed failed: {err}", strategy.name());
                    last_err = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_enforces_ordering() {
        let mut planner = CorridorPlanner::new(PlannerConfig::default()).unwrap();
        assert_eq!(planner.state(), SessionState::Unconfigured);

        // sizing before the horizon is a state error
        assert!(matches!(
            planner.size_constraints(),
            Err(PlannerError::InvalidState { .. })
        ));

        let a = BoundaryState::at_rest(Vec3::zeros());
        let b = BoundaryState::at_rest(Vec3::new(1.0, 1.0, 1.0));
        planner.configure_horizon(0.0, 2.0, &a, &b).unwrap();
        assert_eq!(planner.state(), SessionState::BoundarySet);

        planner.size_constraints().unwrap();
        assert_eq!(planner.state(), SessionState::ConstraintsSized);
    }

    #[test]
    fn zero_obstacles_size_to_zero_constraints() {
        let mut planner = CorridorPlanner::new(PlannerConfig::default()).unwrap();
        let a = BoundaryState::at_rest(Vec3::zeros());
        let b = BoundaryState::at_rest(Vec3::new(1.0, 0.0, 0.0));
        planner.configure_horizon(0.0, 2.0, &a, &b).unwrap();
        let count = planner.size_constraints().unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn wrong_seed_length_is_rejected() {
        let mut planner = CorridorPlanner::new(PlannerConfig::default()).unwrap();
        let a = BoundaryState::at_rest(Vec3::zeros());
        let b = BoundaryState::at_rest(Vec3::new(1.0, 0.0, 0.0));
        planner.configure_horizon(0.0, 2.0, &a, &b).unwrap();
        planner.size_constraints().unwrap();
        assert!(matches!(
            planner.solve(&[0.0; 3]),
            Err(PlannerError::Layout(LayoutError::WrongCount { .. }))
        ));
    }

    #[test]
    fn degenerate_horizon_is_fatal() {
        let mut planner = CorridorPlanner::new(PlannerConfig::default()).unwrap();
        let a = BoundaryState::at_rest(Vec3::zeros());
        let b = BoundaryState::at_rest(Vec3::new(1.0, 0.0, 0.0));
        assert!(matches!(
            planner.configure_horizon(2.0, 2.0, &a, &b),
            Err(PlannerError::Spline(SplineError::DegenerateHorizon { .. }))
        ));
    }
}
