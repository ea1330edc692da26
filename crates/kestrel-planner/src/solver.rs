//! Two-level nonlinear solver
//!
//! The separation NLP is non-convex (bilinear normal/control-point products
//! in the constraints), and a bare gradient method fails on the raw
//! constraint set. The solver therefore runs two levels: an outer
//! augmented-Lagrangian wrapper that folds the inequality constraints into a
//! penalized subproblem, and an inner spectral-projected-gradient method
//! (Barzilai–Borwein step with a nonmonotone Armijo line search) for the
//! subproblems. Both levels stop on a relative-step tolerance; the wrapper
//! additionally enforces hard caps on evaluation count and wall-clock time,
//! so control returns to the caller even when the inner method stalls.
//!
//! Timeout is a normal status outcome, not an error: a run that found a
//! feasible point before the budget ran out still counts as success.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::constraints::JacobianTriplets;

const ARMIJO: f64 = 1e-4;
const NONMONOTONE_MEMORY: usize = 10;
const GRAD_TOL: f64 = 1e-9;
const STEP_MIN: f64 = 1e-14;
const ALPHA_MIN: f64 = 1e-12;
const ALPHA_MAX: f64 = 1e12;

/// A gradient-annotated nonlinear program.
///
/// This is the whole contract between the problem formulation and the
/// solver: an objective, a block of inequality constraints (`g(x) ≤ 0`),
/// and their derivatives. The solver never looks inside.
pub trait NlpProblem {
    fn num_variables(&self) -> usize;
    fn num_constraints(&self) -> usize;
    /// Objective value at `x`; a supplied gradient buffer is fully written.
    fn objective(&self, x: &[f64], gradient: Option<&mut [f64]>) -> f64;
    /// Write every constraint row into `values` and, when requested, the
    /// Jacobian triplets. Returns the number of rows written.
    fn constraints(
        &self,
        x: &[f64],
        values: &mut [f64],
        jacobian: Option<&mut JacobianTriplets>,
    ) -> usize;
}

/// Terminal solver status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Converged to a feasible point within tolerances.
    Converged,
    /// A budget ran out, but a feasible point had already been found.
    FeasibleStopped,
    /// Evaluation or iteration budget exhausted without any feasible point.
    Infeasible,
    /// Wall-clock budget exhausted without any feasible point.
    Timeout,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Converged | SolveStatus::FeasibleStopped)
    }
}

/// Counters and timings from one solve.
#[derive(Debug, Clone, Default)]
pub struct SolveStats {
    /// Outer (multiplier-update) iterations
    pub outer_iterations: usize,
    /// Inner gradient iterations across all subproblems
    pub inner_iterations: usize,
    /// Combined objective/constraint evaluations
    pub evaluations: usize,
    /// Line-search trial points
    pub line_search_trials: usize,
    /// Total wall-clock time
    pub solve_time: Duration,
    /// Objective at the returned point
    pub objective: f64,
    /// Largest constraint violation at the returned point
    pub max_violation: f64,
}

/// Result of one solve: status, refined point, objective, counters.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub x: Vec<f64>,
    pub objective: f64,
    pub stats: SolveStats,
}

/// Tolerances and budgets of both solver levels.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Relative-step stopping tolerance (both levels)
    pub xtol_rel: f64,
    /// Per-constraint satisfaction tolerance
    pub constraint_tol: f64,
    /// Hard cap on combined evaluations
    pub max_evaluations: usize,
    /// Hard cap on wall-clock time
    pub max_time: Duration,
    /// Outer multiplier-update iterations
    pub max_outer_iterations: usize,
    /// Inner gradient iterations per subproblem
    pub max_inner_iterations: usize,
    /// Initial quadratic penalty weight
    pub penalty_initial: f64,
    /// Multiplicative penalty growth when violation stagnates
    pub penalty_growth: f64,
    /// Penalty ceiling
    pub penalty_max: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

impl SolverOptions {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            xtol_rel: config.xtol_rel,
            constraint_tol: config.constraint_tol,
            max_evaluations: config.max_evaluations,
            max_time: Duration::from_secs_f64(config.max_solve_time),
            max_outer_iterations: 25,
            max_inner_iterations: 2_000,
            penalty_initial: 10.0,
            penalty_growth: 10.0,
            penalty_max: 1e8,
        }
    }
}

/// Scratch buffers shared by the evaluation helpers.
struct Workspace {
    g: Vec<f64>,
    weights: Vec<f64>,
    fgrad: Vec<f64>,
    jacobian: JacobianTriplets,
}

impl Workspace {
    fn new(num_variables: usize, num_constraints: usize) -> Self {
        Self {
            g: vec![0.0; num_constraints],
            weights: vec![0.0; num_constraints],
            fgrad: vec![0.0; num_variables],
            jacobian: JacobianTriplets::new(),
        }
    }
}

/// Augmented-Lagrangian value `f + (1/2ρ) Σ (max(0, λ + ρg)² − λ²)`.
fn augmented_value<P: NlpProblem>(
    problem: &P,
    x: &[f64],
    lambda: &[f64],
    rho: f64,
    ws: &mut Workspace,
) -> f64 {
    let f = problem.objective(x, None);
    if lambda.is_empty() {
        return f;
    }
    problem.constraints(x, &mut ws.g, None);
    let mut penalty = 0.0;
    for (gi, li) in ws.g.iter().zip(lambda.iter()) {
        let t = (li + rho * gi).max(0.0);
        penalty += t * t - li * li;
    }
    f + penalty / (2.0 * rho)
}

/// Value and gradient of the augmented Lagrangian.
fn augmented_value_grad<P: NlpProblem>(
    problem: &P,
    x: &[f64],
    lambda: &[f64],
    rho: f64,
    ws: &mut Workspace,
    grad: &mut [f64],
) -> f64 {
    let f = problem.objective(x, Some(&mut ws.fgrad));
    grad.copy_from_slice(&ws.fgrad);
    if lambda.is_empty() {
        return f;
    }
    problem.constraints(x, &mut ws.g, Some(&mut ws.jacobian));
    let mut penalty = 0.0;
    for i in 0..lambda.len() {
        let t = (lambda[i] + rho * ws.g[i]).max(0.0);
        penalty += t * t - lambda[i] * lambda[i];
        ws.weights[i] = t;
    }
    ws.jacobian.accumulate_weighted(&ws.weights, grad);
    f + penalty / (2.0 * rho)
}

/// The two-level solver. One instance serves one solve; the driver creates
/// a fresh one per session so no iteration state leaks between solves.
pub struct AugLagSolver {
    options: SolverOptions,
}

impl AugLagSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// Minimize `problem` starting from `x0`.
    pub fn minimize<P: NlpProblem>(&self, problem: &P, x0: &[f64]) -> SolveOutcome {
        let opts = &self.options;
        let start = Instant::now();
        let nv = problem.num_variables();
        let m = problem.num_constraints();
        debug_assert_eq!(x0.len(), nv);

        let mut ws = Workspace::new(nv, m);
        let mut stats = SolveStats::default();
        let mut x = x0.to_vec();
        let mut lambda = vec![0.0; m];
        let mut rho = opts.penalty_initial;
        let mut best_feasible: Option<(Vec<f64>, f64)> = None;
        let mut prev_violation = f64::INFINITY;
        let mut status = SolveStatus::Infeasible;

        'outer: for _ in 0..opts.max_outer_iterations {
            stats.outer_iterations += 1;
            let inner_converged =
                self.inner_minimize(problem, &mut x, &lambda, rho, start, &mut ws, &mut stats);

            // feasibility bookkeeping at the subproblem solution
            let f = problem.objective(&x, None);
            let violation = if m > 0 {
                let written = problem.constraints(&x, &mut ws.g, None);
                debug_assert_eq!(written, m);
                ws.g.iter().fold(0.0f64, |acc, &gi| acc.max(gi))
            } else {
                0.0
            };
            stats.evaluations += 1;
            stats.objective = f;
            stats.max_violation = violation;

            let feasible = violation <= opts.constraint_tol;
            if feasible {
                if best_feasible.as_ref().map_or(true, |(_, bf)| f < *bf) {
                    best_feasible = Some((x.clone(), f));
                }
                if inner_converged {
                    status = SolveStatus::Converged;
                    break 'outer;
                }
            }

            let timed_out = start.elapsed() >= opts.max_time;
            let out_of_evals = stats.evaluations >= opts.max_evaluations;
            if timed_out || out_of_evals {
                status = if best_feasible.is_some() {
                    SolveStatus::FeasibleStopped
                } else if timed_out {
                    SolveStatus::Timeout
                } else {
                    SolveStatus::Infeasible
                };
                break 'outer;
            }

            // PHR multiplier update, then penalty growth while the
            // violation is not shrinking
            for (li, &gi) in lambda.iter_mut().zip(ws.g.iter()) {
                *li = (*li + rho * gi).max(0.0);
            }
            if violation > 0.5 * prev_violation {
                rho = (rho * opts.penalty_growth).min(opts.penalty_max);
            }
            prev_violation = violation;

            status = if best_feasible.is_some() {
                SolveStatus::FeasibleStopped
            } else {
                SolveStatus::Infeasible
            };
        }

        let (x_out, f_out) = match (&status, best_feasible) {
            (SolveStatus::Converged, _) => {
                let f = stats.objective;
                (x, f)
            }
            (SolveStatus::FeasibleStopped, Some((bx, bf))) => (bx, bf),
            (_, _) => {
                let f = stats.objective;
                (x, f)
            }
        };

        stats.solve_time = start.elapsed();
        stats.objective = f_out;
        debug!(
            "auglag: status={:?} f={:.6} viol={:.3e} evals={} outer={} in {:?}",
            status, f_out, stats.max_violation, stats.evaluations, stats.outer_iterations,
            stats.solve_time
        );

        SolveOutcome {
            status,
            x: x_out,
            objective: f_out,
            stats,
        }
    }

    /// Spectral projected gradient on the current subproblem. Returns true
    /// when the relative-step or gradient tolerance was reached.
    #[allow(clippy::too_many_arguments)]
    fn inner_minimize<P: NlpProblem>(
        &self,
        problem: &P,
        x: &mut [f64],
        lambda: &[f64],
        rho: f64,
        start: Instant,
        ws: &mut Workspace,
        stats: &mut SolveStats,
    ) -> bool {
        let opts = &self.options;
        let nv = x.len();
        let mut grad = vec![0.0; nv];
        let mut grad_new = vec![0.0; nv];
        let mut trial = vec![0.0; nv];

        let mut value = augmented_value_grad(problem, x, lambda, rho, ws, &mut grad);
        stats.evaluations += 1;

        let gmax = grad.iter().fold(0.0f64, |a, g| a.max(g.abs()));
        if gmax == 0.0 {
            return true;
        }
        let mut alpha = (1.0 / gmax).clamp(ALPHA_MIN, ALPHA_MAX);

        let mut history: VecDeque<f64> = VecDeque::with_capacity(NONMONOTONE_MEMORY);
        history.push_back(value);

        for _ in 0..opts.max_inner_iterations {
            if start.elapsed() >= opts.max_time || stats.evaluations >= opts.max_evaluations {
                return false;
            }
            stats.inner_iterations += 1;

            let gnorm2: f64 = grad.iter().map(|g| g * g).sum();
            if gnorm2.sqrt() <= GRAD_TOL * (1.0 + value.abs()) {
                return true;
            }

            let reference = history.iter().fold(f64::NEG_INFINITY, |a, &v| a.max(v));
            let mut step = alpha;
            let mut accepted = false;
            while step >= STEP_MIN {
                for i in 0..nv {
                    trial[i] = x[i] - step * grad[i];
                }
                let trial_value = augmented_value(problem, &trial, lambda, rho, ws);
                stats.evaluations += 1;
                stats.line_search_trials += 1;
                if trial_value <= reference - ARMIJO * step * gnorm2 {
                    accepted = true;
                    break;
                }
                if stats.evaluations >= opts.max_evaluations {
                    break;
                }
                step *= 0.5;
            }
            if !accepted {
                // line search dried up; hand control back to the wrapper
                return false;
            }

            let new_value = augmented_value_grad(problem, &trial, lambda, rho, ws, &mut grad_new);
            stats.evaluations += 1;

            let mut ss = 0.0;
            let mut sy = 0.0;
            let mut xnorm2 = 0.0;
            for i in 0..nv {
                let s = trial[i] - x[i];
                let y = grad_new[i] - grad[i];
                ss += s * s;
                sy += s * y;
                xnorm2 += x[i] * x[i];
            }

            x.copy_from_slice(&trial);
            std::mem::swap(&mut grad, &mut grad_new);
            value = new_value;
            if history.len() == NONMONOTONE_MEMORY {
                history.pop_front();
            }
            history.push_back(value);

            if ss.sqrt() <= opts.xtol_rel * (1.0 + xnorm2.sqrt()) {
                return true;
            }

            // Barzilai–Borwein step for the next iteration
            alpha = if sy > 1e-18 {
                (ss / sy).clamp(ALPHA_MIN, ALPHA_MAX)
            } else {
                (alpha * 10.0).min(ALPHA_MAX)
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// min Σ (x_i - c_i)², unconstrained
    struct Quadratic {
        center: Vec<f64>,
    }

    impl NlpProblem for Quadratic {
        fn num_variables(&self) -> usize {
            self.center.len()
        }
        fn num_constraints(&self) -> usize {
            0
        }
        fn objective(&self, x: &[f64], gradient: Option<&mut [f64]>) -> f64 {
            if let Some(grad) = gradient {
                for i in 0..x.len() {
                    grad[i] = 2.0 * (x[i] - self.center[i]);
                }
            }
            x.iter()
                .zip(self.center.iter())
                .map(|(xi, ci)| (xi - ci) * (xi - ci))
                .sum()
        }
        fn constraints(
            &self,
            _x: &[f64],
            _values: &mut [f64],
            _jacobian: Option<&mut JacobianTriplets>,
        ) -> usize {
            0
        }
    }

    /// min (x - 2)² subject to x - 1 ≤ 0
    struct BoundedScalar;

    impl NlpProblem for BoundedScalar {
        fn num_variables(&self) -> usize {
            1
        }
        fn num_constraints(&self) -> usize {
            1
        }
        fn objective(&self, x: &[f64], gradient: Option<&mut [f64]>) -> f64 {
            if let Some(grad) = gradient {
                grad[0] = 2.0 * (x[0] - 2.0);
            }
            (x[0] - 2.0) * (x[0] - 2.0)
        }
        fn constraints(
            &self,
            x: &[f64],
            values: &mut [f64],
            jacobian: Option<&mut JacobianTriplets>,
        ) -> usize {
            values[0] = x[0] - 1.0;
            if let Some(jac) = jacobian {
                jac.clear();
                jac.push(0, 0, 1.0);
            }
            1
        }
    }

    #[test]
    fn unconstrained_quadratic_converges() {
        let problem = Quadratic {
            center: vec![1.0, -2.0, 3.0, 0.5],
        };
        let solver = AugLagSolver::new(SolverOptions::default());
        let outcome = solver.minimize(&problem, &[0.0; 4]);

        assert_eq!(outcome.status, SolveStatus::Converged);
        for (xi, ci) in outcome.x.iter().zip(problem.center.iter()) {
            assert_relative_eq!(xi, ci, epsilon = 1e-3);
        }
        assert!(outcome.objective < 1e-5);
    }

    #[test]
    fn active_constraint_is_respected() {
        let solver = AugLagSolver::new(SolverOptions::default());
        let outcome = solver.minimize(&BoundedScalar, &[0.0]);

        assert!(outcome.status.is_success());
        // the optimum sits on the boundary x = 1, within constraint tolerance
        assert!((outcome.x[0] - 1.0).abs() < 0.15, "x = {}", outcome.x[0]);
        assert!(outcome.stats.max_violation <= 0.1 + 1e-9);
    }

    #[test]
    fn tiny_evaluation_budget_fails_cleanly() {
        let options = SolverOptions {
            max_evaluations: 2,
            ..SolverOptions::default()
        };
        let solver = AugLagSolver::new(options);
        let outcome = solver.minimize(&BoundedScalar, &[50.0]);

        assert!(!outcome.status.is_success());
    }

    #[test]
    fn zero_time_budget_returns_immediately() {
        let options = SolverOptions {
            max_time: Duration::ZERO,
            ..SolverOptions::default()
        };
        let solver = AugLagSolver::new(options);
        // unconstrained: the start point is trivially feasible, so the
        // outcome is a feasible stop rather than a hard failure
        let outcome = solver.minimize(
            &Quadratic {
                center: vec![1.0],
            },
            &[0.0],
        );
        assert!(matches!(
            outcome.status,
            SolveStatus::FeasibleStopped | SolveStatus::Converged
        ));
    }
}
